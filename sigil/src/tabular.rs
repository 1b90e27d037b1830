//! Functions to read and write mapping tables in the tab-separated "remap"
//! format.
//!
//! The format is namespace-tagged: the header line names the namespace hop,
//! so readers can verify they got the hop they expect (see
//! [`MappingTable::check_namespaces`]).
//!
//! ```text
//! remap	1	spigot	mojang
//! c	net/example/EntityFoo	net/example/FooEntity
//! 	f	I	a	health
//! 	m	()V	b	tick
//! ```
//!
//! Class lines carry the old and new class name. Member lines are indented
//! by one tab and carry the descriptor, the old and the new member name, all
//! relative to the enclosing class line. Writing sorts classes and members.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use crate::lines::table_lines;
use crate::mappings::{ClassMapping, MappingTable};
use crate::name::{ClassName, MemberKey};

const HEADER: &str = "remap";
const VERSION: &str = "1";

/// Reads a mapping file in the "remap" format, by opening the file given by
/// the path.
pub fn read_file(path: impl AsRef<Path>) -> Result<MappingTable> {
	read(File::open(&path)?)
		.with_context(|| anyhow!("failed to read mapping file {:?}", path.as_ref()))
}

/// Reads the "remap" format, from the given reader.
pub fn read(mut reader: impl Read) -> Result<MappingTable> {
	let mut input = String::new();
	reader.read_to_string(&mut input)?;

	let mut lines = table_lines(&input);

	let mut header = lines.next()
		.context("mapping file is empty")??;
	if header.first_field != HEADER {
		bail!("header must start with {HEADER:?}, got {:?}", header.first_field);
	}
	let version = header.next()?;
	if version != VERSION {
		bail!("unsupported mapping format version {version:?}, expected {VERSION:?}");
	}
	let from = header.next()?;
	let to = header.end()?;

	let mut table = MappingTable::new(from, to);
	let mut current: Option<(ClassName, ClassMapping)> = None;

	for line in lines {
		let mut line = line?;
		let line_number = line.line_number();
		let kind = line.first_field.clone();

		(|| -> Result<()> {
			match (line.idents(), kind.as_str()) {
				(0, "c") => {
					if let Some((from, mapping)) = current.take() {
						table.add_class(from, mapping)?;
					}

					let old = ClassName::new(line.next()?);
					let new = ClassName::new(line.end()?);
					current = Some((old, ClassMapping::new(new)));
				},
				(1, kind @ ("f" | "m")) => {
					let Some((_, ref mut mapping)) = current else {
						bail!("member line without an enclosing class line");
					};

					let desc = line.next()?;
					let old = line.next()?;
					let new = line.end()?;

					let key = MemberKey::new(old, desc);
					if kind == "f" {
						mapping.add_field(key, new)?;
					} else {
						mapping.add_method(key, new)?;
					}
				},
				(idents, first) => {
					bail!("unexpected line kind {first:?} at indentation {idents}");
				},
			}
			Ok(())
		})().with_context(|| anyhow!("in line {line_number}"))?;
	}

	if let Some((from, mapping)) = current.take() {
		table.add_class(from, mapping)?;
	}

	Ok(table)
}

/// Writes a mapping table in the "remap" format to the file given by the
/// path.
pub fn write_file(table: &MappingTable, path: impl AsRef<Path>) -> Result<()> {
	let file = File::create(&path)
		.with_context(|| anyhow!("failed to create mapping file {:?}", path.as_ref()))?;
	write(table, &mut BufWriter::new(file))
		.with_context(|| anyhow!("failed to write mapping file {:?}", path.as_ref()))
}

/// Writes a mapping table in the "remap" format.
///
/// Classes and members are written sorted, so equal tables produce equal
/// files.
pub fn write(table: &MappingTable, w: &mut impl Write) -> Result<()> {
	writeln!(w, "{HEADER}\t{VERSION}\t{}\t{}", table.from, table.to)?;

	let mut classes: Vec<_> = table.classes.iter().collect();
	classes.sort_by(|a, b| a.0.cmp(b.0));

	for (from, mapping) in classes {
		writeln!(w, "c\t{from}\t{}", mapping.name)?;

		let mut fields: Vec<_> = mapping.fields.iter().collect();
		fields.sort_by(|a, b| a.0.cmp(b.0));
		for (key, new) in fields {
			writeln!(w, "\tf\t{}\t{}\t{new}", key.desc, key.name)?;
		}

		let mut methods: Vec<_> = mapping.methods.iter().collect();
		methods.sort_by(|a, b| a.0.cmp(b.0));
		for (key, new) in methods {
			writeln!(w, "\tm\t{}\t{}\t{new}", key.desc, key.name)?;
		}
	}

	Ok(())
}

/// Writes a mapping table into a string, see [`write`][fn@write].
pub fn write_string(table: &MappingTable) -> Result<String> {
	let mut vec = Vec::new();
	write(table, &mut vec)?;
	String::from_utf8(vec).context("mapping table wrote invalid utf8")
}
