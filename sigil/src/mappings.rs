//! The mapping table of one namespace hop.
//!
//! A [`MappingTable`] renames classes, fields and methods from one namespace
//! to another. Namespaces chain (e.g. obfuscated → intermediate →
//! deobfuscated), but a single table always describes exactly one hop; use
//! [`MappingTable::check_namespaces`] to verify you got the hop you expect
//! after reading a file.

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use indexmap::map::Entry;
use crate::name::{ClassName, MemberKey};

#[derive(Debug, Clone)]
pub struct MappingTable {
	pub from: String,
	pub to: String,
	pub classes: IndexMap<ClassName, ClassMapping>,
}

#[derive(Debug, Clone)]
pub struct ClassMapping {
	pub name: ClassName,
	pub fields: IndexMap<MemberKey, String>,
	pub methods: IndexMap<MemberKey, String>,
}

impl ClassMapping {
	pub fn new(name: ClassName) -> ClassMapping {
		ClassMapping {
			name,
			fields: IndexMap::new(),
			methods: IndexMap::new(),
		}
	}

	pub(crate) fn add_field(&mut self, key: MemberKey, name: String) -> Result<()> {
		match self.fields.entry(key) {
			Entry::Occupied(e) => {
				bail!("cannot add field mapping {name:?} for key {:?}, as there's already one: {:?}", e.key(), e.get());
			},
			Entry::Vacant(e) => {
				e.insert(name);
			},
		}

		Ok(())
	}

	pub(crate) fn add_method(&mut self, key: MemberKey, name: String) -> Result<()> {
		match self.methods.entry(key) {
			Entry::Occupied(e) => {
				bail!("cannot add method mapping {name:?} for key {:?}, as there's already one: {:?}", e.key(), e.get());
			},
			Entry::Vacant(e) => {
				e.insert(name);
			},
		}

		Ok(())
	}
}

impl MappingTable {
	pub fn new(from: impl Into<String>, to: impl Into<String>) -> MappingTable {
		MappingTable {
			from: from.into(),
			to: to.into(),
			classes: IndexMap::new(),
		}
	}

	/// Returns an error if the namespaces of `self` aren't the given ones.
	///
	/// This can be used to check that after reading a mapping file, you have
	/// the namespace hop you expect.
	pub fn check_namespaces(&self, from: &str, to: &str) -> Result<()> {
		if self.from != from || self.to != to {
			bail!("expected namespaces {from:?} -> {to:?}, got {:?} -> {:?}", self.from, self.to);
		}
		Ok(())
	}

	pub fn add_class(&mut self, from: ClassName, mapping: ClassMapping) -> Result<()> {
		match self.classes.entry(from) {
			Entry::Occupied(e) => {
				bail!("cannot add class mapping for key {:?}, as there's already one: {:?}", e.key(), e.get());
			},
			Entry::Vacant(e) => {
				e.insert(mapping);
			},
		}

		Ok(())
	}

	/// Maps a class name, returning the old one when no mapping exists.
	pub fn map_class<'a>(&'a self, class: &'a ClassName) -> &'a ClassName {
		self.classes.get(class)
			.map(|mapping| &mapping.name)
			.unwrap_or(class)
	}

	/// Maps a class name, failing when no mapping exists.
	pub fn map_class_fail(&self, class: &ClassName) -> Result<&ClassName> {
		self.classes.get(class)
			.map(|mapping| &mapping.name)
			.with_context(|| anyhow!("no mapping for class {class:?}"))
	}

	/// Maps a field name, returning the old one when no mapping exists.
	pub fn map_field<'a>(&'a self, class: &ClassName, key: &'a MemberKey) -> &'a str {
		self.classes.get(class)
			.and_then(|mapping| mapping.fields.get(key))
			.map(String::as_str)
			.unwrap_or(&key.name)
	}

	/// Maps a method name, returning the old one when no mapping exists.
	pub fn map_method<'a>(&'a self, class: &ClassName, key: &'a MemberKey) -> &'a str {
		self.classes.get(class)
			.and_then(|mapping| mapping.methods.get(key))
			.map(String::as_str)
			.unwrap_or(&key.name)
	}

	/// Looks up a method rename without falling back to the old name.
	pub fn map_method_fail(&self, class: &ClassName, key: &MemberKey) -> Option<&str> {
		self.classes.get(class)
			.and_then(|mapping| mapping.methods.get(key))
			.map(String::as_str)
	}

	/// Maps every `L...;` class name inside a field or method descriptor.
	///
	/// Class names without a mapping are copied over unchanged.
	pub fn map_desc(&self, desc: &str) -> String {
		let mut s = String::new();

		let mut iter = desc.chars();
		while let Some(ch) = iter.next() {
			s.push(ch);

			if ch == 'L' {
				let mut class_name = String::new();
				for ch in iter.by_ref() {
					if ch == ';' {
						break;
					}
					class_name.push(ch);
				}

				let class_name = ClassName::new(class_name);
				s.push_str(self.map_class(&class_name).as_str());
				s.push(';');
			}
		}

		s
	}
}
