//! The constructor identity table.
//!
//! Constructors have no stable name to key parameter data on, so every
//! constructor ever seen gets a numeric id. The table file has one
//! `<id> <owner> <descriptor>` entry per line and is append-only: when a
//! constructor's signature reappears in a newer generation it gets a fresh,
//! larger id while the old entry stays behind. Lookup therefore prefers the
//! largest id among entries with the same descriptor.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use crate::name::ClassName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorEntry {
	pub id: u32,
	pub desc: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConstructorIndex {
	/// Per class, entries with the largest id first.
	classes: IndexMap<ClassName, Vec<ConstructorEntry>>,
}

impl ConstructorIndex {
	pub fn new() -> ConstructorIndex {
		ConstructorIndex::default()
	}

	pub fn add(&mut self, owner: ClassName, entry: ConstructorEntry) {
		let list = self.classes.entry(owner).or_default();
		let at = list.partition_point(|e| e.id > entry.id);
		list.insert(at, entry);
	}

	/// Finds the constructor with the given descriptor in the given class.
	///
	/// When several entries share the descriptor, the one with the largest id
	/// wins; older entries are stale duplicates.
	pub fn find(&self, owner: &ClassName, desc: &str) -> Option<&ConstructorEntry> {
		self.classes.get(owner)?
			.iter()
			.find(|entry| entry.desc == desc)
	}
}

/// Reads a constructor table from the file given by the path.
pub fn read_file(path: impl AsRef<Path>) -> Result<ConstructorIndex> {
	let mut input = String::new();
	File::open(&path)?.read_to_string(&mut input)
		.with_context(|| anyhow!("failed to read constructor table {:?}", path.as_ref()))?;
	read(&input)
		.with_context(|| anyhow!("failed to parse constructor table {:?}", path.as_ref()))
}

pub fn read(input: &str) -> Result<ConstructorIndex> {
	let mut index = ConstructorIndex::new();

	for (i, line) in input.lines().enumerate() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		(|| -> Result<()> {
			let mut tokens = line.split_whitespace();
			let id = tokens.next().context("missing id")?;
			let owner = tokens.next().context("missing owner class")?;
			let desc = tokens.next().context("missing descriptor")?;
			if let Some(extra) = tokens.next() {
				bail!("unexpected trailing token {extra:?}");
			}

			let id = id.parse()
				.with_context(|| anyhow!("constructor id {id:?} is not a number"))?;

			index.add(ClassName::from_binary(owner), ConstructorEntry { id, desc: desc.to_owned() });
			Ok(())
		})().with_context(|| anyhow!("in line {}", i + 1))?;
	}

	Ok(index)
}

#[cfg(test)]
mod tests {
	use anyhow::Result;
	use crate::name::ClassName;
	use super::read;

	#[test]
	fn newest_id_wins() -> Result<()> {
		let index = read("\
100 net.example.Foo (I)V
320 net.example.Foo (Ljava/lang/String;)V
517 net.example.Foo (I)V
")?;

		let foo = ClassName::new("net/example/Foo");
		assert_eq!(index.find(&foo, "(I)V").map(|e| e.id), Some(517));
		assert_eq!(index.find(&foo, "(Ljava/lang/String;)V").map(|e| e.id), Some(320));
		assert_eq!(index.find(&foo, "()V"), None);
		assert_eq!(index.find(&ClassName::new("net/example/Bar"), "(I)V"), None);

		Ok(())
	}
}
