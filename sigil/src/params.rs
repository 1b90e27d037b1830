//! The parameter name side table.
//!
//! Maps a method key (the synthetic method name, or `const_<id>` for
//! constructors) to the names chosen for its parameters. The file format is
//! one method per line: `<key> <index> <name> <index> <name> ...`. Indices
//! can be sparse while names are being collected, hence `Option` slots.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamNames {
	methods: IndexMap<String, Vec<Option<String>>>,
}

impl ParamNames {
	pub fn new() -> ParamNames {
		ParamNames::default()
	}

	pub fn is_empty(&self) -> bool {
		self.methods.is_empty()
	}

	pub fn get(&self, key: &str) -> Option<&[Option<String>]> {
		self.methods.get(key).map(Vec::as_slice)
	}

	/// Records a parameter name, growing the slot list to `param_count` when
	/// the method key is first seen.
	pub fn record(&mut self, key: &str, param_count: usize, index: usize, name: &str) -> Result<()> {
		let slots = self.methods.entry(key.to_owned())
			.or_insert_with(|| vec![None; param_count]);

		if index >= slots.len() {
			bail!("parameter index {index} out of range for {key:?} with {} parameters", slots.len());
		}

		slots[index] = Some(name.to_owned());
		Ok(())
	}
}

/// Reads a parameter name table from the file given by the path.
pub fn read_file(path: impl AsRef<Path>) -> Result<ParamNames> {
	let mut input = String::new();
	File::open(&path)?.read_to_string(&mut input)
		.with_context(|| anyhow!("failed to read parameter name table {:?}", path.as_ref()))?;
	read(&input)
		.with_context(|| anyhow!("failed to parse parameter name table {:?}", path.as_ref()))
}

pub fn read(input: &str) -> Result<ParamNames> {
	let mut names = ParamNames::new();

	for (i, line) in input.lines().enumerate() {
		let line = line.trim_end();
		if line.is_empty() {
			continue;
		}

		(|| -> Result<()> {
			let mut tokens = line.split(' ');
			let key = tokens.next().context("missing method key")?;

			let mut slots: IndexMap<usize, String> = IndexMap::new();
			loop {
				let Some(index) = tokens.next() else { break };
				let name = tokens.next()
					.with_context(|| anyhow!("index {index:?} has no name token"))?;
				let index = index.parse()
					.with_context(|| anyhow!("parameter index {index:?} is not a number"))?;
				if slots.insert(index, name.to_owned()).is_some() {
					bail!("duplicate parameter index {index}");
				}
			}

			let len = slots.keys().max().map(|max| max + 1).unwrap_or(0);
			let mut vec = vec![None; len];
			for (index, name) in slots {
				vec[index] = Some(name);
			}

			if names.methods.insert(key.to_owned(), vec).is_some() {
				bail!("duplicate method key {key:?}");
			}
			Ok(())
		})().with_context(|| anyhow!("in line {}", i + 1))?;
	}

	Ok(names)
}

/// Writes a parameter name table to the file given by the path.
pub fn write_file(names: &ParamNames, path: impl AsRef<Path>) -> Result<()> {
	let file = File::create(&path)
		.with_context(|| anyhow!("failed to create parameter name table {:?}", path.as_ref()))?;
	write(names, &mut BufWriter::new(file))
		.with_context(|| anyhow!("failed to write parameter name table {:?}", path.as_ref()))
}

pub fn write(names: &ParamNames, w: &mut impl Write) -> Result<()> {
	for (key, slots) in &names.methods {
		write!(w, "{key}")?;
		for (index, name) in slots.iter().enumerate() {
			if let Some(name) = name {
				write!(w, " {index} {name}")?;
			}
		}
		writeln!(w)?;
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use super::{read, write, ParamNames};

	#[test]
	fn read_write_read() -> Result<()> {
		let input = "\
func_1234_a 0 x 1 y
const_77 0 world 2 seed
";

		let names = read(input)?;
		assert_eq!(names.get("func_1234_a"), Some(&[Some("x".to_owned()), Some("y".to_owned())][..]));
		assert_eq!(names.get("const_77"), Some(&[Some("world".to_owned()), None, Some("seed".to_owned())][..]));

		let mut out = Vec::new();
		write(&names, &mut out)?;
		assert_eq!(read(std::str::from_utf8(&out)?)?, names);

		Ok(())
	}

	#[test]
	fn record_rejects_out_of_range() -> Result<()> {
		let mut names = ParamNames::new();
		names.record("func_1_a", 2, 1, "depth")?;
		assert!(names.record("func_1_a", 2, 2, "oops").is_err());
		assert_eq!(names.get("func_1_a"), Some(&[None, Some("depth".to_owned())][..]));

		Ok(())
	}
}
