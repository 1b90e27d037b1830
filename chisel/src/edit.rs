//! Span edits over unit text.

use anyhow::{bail, Result};
use crate::tree::Span;

/// Replaces the text of `span` with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
	pub span: Span,
	pub replacement: String,
}

impl Edit {
	pub fn replace(span: Span, replacement: impl Into<String>) -> Edit {
		Edit { span, replacement: replacement.into() }
	}

	pub fn insert(at: usize, text: impl Into<String>) -> Edit {
		Edit { span: Span::new(at, at), replacement: text.into() }
	}

	pub fn delete(span: Span) -> Edit {
		Edit { span, replacement: String::new() }
	}
}

/// Applies all edits to `text`.
///
/// Edits may touch (an insertion at the end of another edit's span is fine)
/// but must not overlap; overlapping edits mean two processors fought over
/// the same tokens, which is an internal error.
pub fn apply(text: &str, mut edits: Vec<Edit>) -> Result<String> {
	edits.sort_by_key(|edit| (edit.span.start, edit.span.end));

	let mut last_end = None;
	for edit in &edits {
		if edit.span.end > text.len() {
			bail!("edit {edit:?} is out of bounds, text has {} bytes", text.len());
		}
		if let Some(last_end) = last_end {
			if edit.span.start < last_end {
				bail!("overlapping edits at byte {}: {edits:?}", edit.span.start);
			}
		}
		last_end = Some(edit.span.end);
	}

	let mut result = String::with_capacity(text.len());
	let mut cursor = 0;
	for edit in &edits {
		result.push_str(&text[cursor..edit.span.start]);
		result.push_str(&edit.replacement);
		cursor = edit.span.end;
	}
	result.push_str(&text[cursor..]);

	Ok(result)
}

#[cfg(test)]
mod tests {
	use anyhow::Result;
	use crate::tree::Span;
	use super::{apply, Edit};

	#[test]
	fn replaces_back_to_front_safely() -> Result<()> {
		let text = "ab cd ef";
		let edits = vec![
			Edit::replace(Span::new(6, 8), "EF"),
			Edit::replace(Span::new(0, 2), "AB"),
			Edit::insert(3, "X"),
		];

		assert_eq!(apply(text, edits)?, "AB Xcd EF");
		Ok(())
	}

	#[test]
	fn rejects_overlap() {
		let edits = vec![
			Edit::replace(Span::new(0, 4), "x"),
			Edit::replace(Span::new(2, 6), "y"),
		];
		assert!(apply("abcdef", edits).is_err());
	}

	#[test]
	fn insert_touching_a_replacement_is_fine() -> Result<()> {
		let edits = vec![
			Edit::replace(Span::new(0, 2), "X"),
			Edit::insert(2, "Y"),
		];
		assert_eq!(apply("abc", edits)?, "XYc");
		Ok(())
	}
}
