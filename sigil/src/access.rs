//! Access transforms: declarative visibility/finality changes for classes
//! and members.
//!
//! The text format has one entry per line:
//!
//! ```text
//! public net.example.Foo
//! public+f net.example.Foo health
//! protected-f net.example.Foo tick()V
//! ```
//!
//! The first token is the target visibility, optionally suffixed with `+f`
//! (make final) or `-f` (strip final). The owner is a binary class name. A
//! missing member targets the class itself; a member containing `(` targets
//! a method (name followed by its full descriptor), anything else a field
//! name.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use crate::name::ClassName;

/// A target visibility.
///
/// The variants are ordered from narrowest to widest, so "widen to at least"
/// is [`Ord::max`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessChange {
	Private,
	Default,
	Protected,
	Public,
}

impl AccessChange {
	fn parse(s: &str) -> Result<AccessChange> {
		Ok(match s {
			"private" => AccessChange::Private,
			"default" => AccessChange::Default,
			"protected" => AccessChange::Protected,
			"public" => AccessChange::Public,
			s => bail!("unknown access level {s:?}"),
		})
	}

	fn as_str(self) -> &'static str {
		match self {
			AccessChange::Private => "private",
			AccessChange::Default => "default",
			AccessChange::Protected => "protected",
			AccessChange::Public => "public",
		}
	}
}

/// What to do to the `final` modifier of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalChange {
	#[default]
	Keep,
	/// `+f`
	Set,
	/// `-f`
	Strip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessTransform {
	pub access: AccessChange,
	pub final_change: FinalChange,
}

impl AccessTransform {
	pub fn widen(access: AccessChange) -> AccessTransform {
		AccessTransform { access, final_change: FinalChange::Keep }
	}

	/// Combines two transforms for the same target.
	///
	/// Access takes the wider of the two; an explicit final change wins over
	/// [`FinalChange::Keep`], and [`FinalChange::Strip`] wins over
	/// [`FinalChange::Set`].
	fn merge(self, other: AccessTransform) -> AccessTransform {
		AccessTransform {
			access: self.access.max(other.access),
			final_change: match (self.final_change, other.final_change) {
				(f, FinalChange::Keep) => f,
				(FinalChange::Keep, f) => f,
				(FinalChange::Strip, _) | (_, FinalChange::Strip) => FinalChange::Strip,
				(FinalChange::Set, FinalChange::Set) => FinalChange::Set,
			},
		}
	}
}

impl Display for AccessTransform {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.access.as_str())?;
		match self.final_change {
			FinalChange::Keep => Ok(()),
			FinalChange::Set => write!(f, "+f"),
			FinalChange::Strip => write!(f, "-f"),
		}
	}
}

/// The member part of an entry: nothing (the class itself), a field name, or
/// a method name plus descriptor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetMember {
	Class,
	Field(String),
	Method {
		name: String,
		desc: String,
	},
}

impl TargetMember {
	fn parse(s: &str) -> Result<TargetMember> {
		if let Some(paren) = s.find('(') {
			let (name, desc) = s.split_at(paren);
			if name.is_empty() {
				bail!("method entry {s:?} has no name");
			}
			Ok(TargetMember::Method { name: name.to_owned(), desc: desc.to_owned() })
		} else {
			Ok(TargetMember::Field(s.to_owned()))
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct AccessTransformSet {
	entries: IndexMap<ClassName, IndexMap<TargetMember, AccessTransform>>,
}

impl AccessTransformSet {
	pub fn new() -> AccessTransformSet {
		AccessTransformSet::default()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.values().map(IndexMap::len).sum()
	}

	/// Adds a transform, merging with any existing one for the same target.
	pub fn add(&mut self, class: ClassName, member: TargetMember, transform: AccessTransform) {
		self.entries.entry(class).or_default().entry(member)
			.and_modify(|existing| *existing = existing.merge(transform))
			.or_insert(transform);
	}

	/// Merges all entries of `other` into `self`.
	pub fn merge(&mut self, other: AccessTransformSet) {
		for (class, members) in other.entries {
			for (member, transform) in members {
				self.add(class.clone(), member, transform);
			}
		}
	}

	pub fn get(&self, class: &ClassName, member: &TargetMember) -> Option<AccessTransform> {
		self.entries.get(class)?.get(member).copied()
	}

	pub fn classes(&self) -> impl Iterator<Item=&ClassName> {
		self.entries.keys()
	}

	/// Rewrites every owner and descriptor into the target namespace of the
	/// given table.
	///
	/// Used when the consumed transforms were written against the old
	/// namespace and the updated file must match the remapped tree.
	pub fn remap(&self, table: &crate::mappings::MappingTable) -> AccessTransformSet {
		let mut result = AccessTransformSet::new();
		for (class, members) in &self.entries {
			let new_class = table.map_class(class).clone();
			for (member, transform) in members {
				let member = match member {
					TargetMember::Class => TargetMember::Class,
					TargetMember::Field(name) => {
						// field descriptors aren't part of AT entries, so the
						// rename can only go by name when it is unambiguous
						let renamed = table.classes.get(class)
							.and_then(|c| {
								let mut matching = c.fields.iter()
									.filter(|(key, _)| key.name == *name)
									.map(|(_, new)| new);
								match (matching.next(), matching.next()) {
									(Some(new), None) => Some(new.clone()),
									_ => None,
								}
							});
						TargetMember::Field(renamed.unwrap_or_else(|| name.clone()))
					},
					TargetMember::Method { name, desc } => {
						let key = crate::name::MemberKey::new(name.clone(), desc.clone());
						TargetMember::Method {
							name: table.map_method(class, &key).to_owned(),
							desc: table.map_desc(desc),
						}
					},
				};
				result.add(new_class.clone(), member, *transform);
			}
		}
		result
	}
}

/// Reads an access transform file.
pub fn read_file(path: impl AsRef<Path>) -> Result<AccessTransformSet> {
	let mut input = String::new();
	File::open(&path)?.read_to_string(&mut input)
		.with_context(|| anyhow!("failed to read access transform file {:?}", path.as_ref()))?;
	read(&input)
		.with_context(|| anyhow!("failed to parse access transform file {:?}", path.as_ref()))
}

pub fn read(input: &str) -> Result<AccessTransformSet> {
	let mut set = AccessTransformSet::new();

	for (i, line) in input.lines().enumerate() {
		let line = line.split('#').next().unwrap_or(line).trim();
		if line.is_empty() {
			continue;
		}

		(|| -> Result<()> {
			let mut tokens = line.split_whitespace();
			let access = tokens.next()
				.context("missing access token")?;
			let owner = tokens.next()
				.context("missing owner class")?;
			let member = tokens.next();
			if let Some(extra) = tokens.next() {
				bail!("unexpected trailing token {extra:?}");
			}

			let (access, final_change) = if let Some(access) = access.strip_suffix("+f") {
				(access, FinalChange::Set)
			} else if let Some(access) = access.strip_suffix("-f") {
				(access, FinalChange::Strip)
			} else {
				(access, FinalChange::Keep)
			};

			let transform = AccessTransform {
				access: AccessChange::parse(access)?,
				final_change,
			};
			let member = match member {
				None => TargetMember::Class,
				Some(member) => TargetMember::parse(member)?,
			};

			set.add(ClassName::from_binary(owner), member, transform);
			Ok(())
		})().with_context(|| anyhow!("in line {}", i + 1))?;
	}

	Ok(set)
}

/// Writes an access transform file, classes and members sorted.
pub fn write_file(set: &AccessTransformSet, path: impl AsRef<Path>) -> Result<()> {
	let file = File::create(&path)
		.with_context(|| anyhow!("failed to create access transform file {:?}", path.as_ref()))?;
	write(set, &mut BufWriter::new(file))
		.with_context(|| anyhow!("failed to write access transform file {:?}", path.as_ref()))
}

pub fn write(set: &AccessTransformSet, w: &mut impl Write) -> Result<()> {
	let mut classes: Vec<_> = set.entries.iter().collect();
	classes.sort_by(|a, b| a.0.cmp(b.0));

	for (class, members) in classes {
		let mut members: Vec<_> = members.iter().collect();
		members.sort_by(|a, b| a.0.cmp(b.0));

		for (member, transform) in members {
			match member {
				TargetMember::Class => writeln!(w, "{transform} {}", class.as_binary())?,
				TargetMember::Field(name) => writeln!(w, "{transform} {} {name}", class.as_binary())?,
				TargetMember::Method { name, desc } => writeln!(w, "{transform} {} {name}{desc}", class.as_binary())?,
			}
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use anyhow::Result;
	use crate::name::ClassName;
	use super::{read, write, AccessChange, AccessTransform, FinalChange, TargetMember};

	#[test]
	fn parse_and_rewrite() -> Result<()> {
		let input = "\
public net.example.Foo
public+f net.example.Foo health
protected-f net.example.Foo tick()V # widen for subclass hooks
";

		let set = read(input)?;
		assert_eq!(set.len(), 3);

		let foo = ClassName::new("net/example/Foo");
		assert_eq!(
			set.get(&foo, &TargetMember::Class),
			Some(AccessTransform { access: AccessChange::Public, final_change: FinalChange::Keep }),
		);
		assert_eq!(
			set.get(&foo, &TargetMember::Method { name: "tick".to_owned(), desc: "()V".to_owned() }),
			Some(AccessTransform { access: AccessChange::Protected, final_change: FinalChange::Strip }),
		);

		let mut out = Vec::new();
		write(&set, &mut out)?;
		let out = String::from_utf8(out)?;
		assert_eq!(out, "\
public net.example.Foo
public+f net.example.Foo health
protected-f net.example.Foo tick()V
");

		Ok(())
	}

	#[test]
	fn merge_widens() -> Result<()> {
		let mut set = read("protected net.example.Foo health\n")?;
		set.merge(read("public net.example.Foo health\nprivate net.example.Foo health\n")?);

		let foo = ClassName::new("net/example/Foo");
		assert_eq!(
			set.get(&foo, &TargetMember::Field("health".to_owned())),
			Some(AccessTransform { access: AccessChange::Public, final_change: FinalChange::Keep }),
		);

		Ok(())
	}
}
