use anyhow::{anyhow, bail, Context, Result};

/// One line of a tab-separated table file, with the line number kept around
/// for error messages.
#[derive(Debug)]
pub(crate) struct TableLine {
	line_number: usize,
	idents: usize,
	pub(crate) first_field: String,
	fields: std::vec::IntoIter<String>,
}

impl TableLine {
	pub(crate) fn new(line_number: usize, line: &str) -> Result<TableLine> {
		let idents = line.chars().take_while(|x| *x == '\t').count();
		let line = &line[idents..];

		let mut fields = line.split('\t').map(|x| x.to_owned());

		let first_field = fields.next()
			.with_context(|| anyhow!("no first field in line {line_number}"))?;

		let vec: Vec<String> = fields.collect();

		Ok(TableLine {
			line_number,
			idents,
			first_field,
			fields: vec.into_iter(),
		})
	}

	pub(crate) fn line_number(&self) -> usize {
		self.line_number
	}

	pub(crate) fn idents(&self) -> usize {
		self.idents
	}

	pub(crate) fn next(&mut self) -> Result<String> {
		self.fields.next()
			.with_context(|| anyhow!("expected another field in line {}: {self:?}", self.line_number))
	}

	/// Takes the next field, checking that it is the last one.
	pub(crate) fn end(mut self) -> Result<String> {
		let next = self.next()?;

		if !self.fields.as_slice().is_empty() {
			bail!("line {} contained more fields than expected: {self:?}", self.line_number);
		}

		Ok(next)
	}
}

/// Splits input into [`TableLine`]s, skipping empty lines.
pub(crate) fn table_lines(input: &str) -> impl Iterator<Item=Result<TableLine>> + '_ {
	input.lines()
		.enumerate()
		.filter(|(_, line)| !line.trim().is_empty())
		.map(|(i, line)| TableLine::new(i + 1, line))
}
