//! Driving edit-producing processors over a parsed source tree.

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use crate::edit::{self, Edit};
use crate::tree::BoundUnit;

/// The edits one processor wants to make to one unit.
#[derive(Debug, Default)]
pub struct UnitEdits {
	pub edits: Vec<Edit>,
	/// New path relative to the source root, when the unit's file has to
	/// move (its main class was renamed).
	pub relocate: Option<PathBuf>,
}

/// Something that inspects a bound unit and produces edits for it.
///
/// Processors are combined by a [`Rewriter`]; their edits are applied
/// together, so two processors must never claim the same tokens.
pub trait UnitProcessor {
	fn process(&mut self, unit: &BoundUnit) -> Result<UnitEdits>;
}

/// Runs a list of [`UnitProcessor`]s over parsed units and materializes the
/// rewritten files under a source root, in place.
///
/// All outputs are computed before the first file is touched, so a processor
/// failure leaves the tree as it was.
#[derive(Default)]
pub struct Rewriter<'a> {
	processors: Vec<Box<dyn UnitProcessor + 'a>>,
}

impl<'a> Rewriter<'a> {
	pub fn new() -> Rewriter<'a> {
		Rewriter::default()
	}

	pub fn add(&mut self, processor: Box<dyn UnitProcessor + 'a>) {
		self.processors.push(processor);
	}

	pub fn rewrite_units(&mut self, root: &Path, units: &[BoundUnit]) -> Result<()> {
		struct Output {
			old_path: PathBuf,
			new_path: PathBuf,
			text: String,
		}

		let mut outputs = Vec::with_capacity(units.len());

		for unit in units {
			let mut edits = Vec::new();
			let mut relocate = None;

			for processor in &mut self.processors {
				let unit_edits = processor.process(unit)
					.with_context(|| anyhow!("failed to process {:?}", unit.rel_path))?;

				edits.extend(unit_edits.edits);

				if let Some(new_path) = unit_edits.relocate {
					if let Some(ref old) = relocate {
						if *old != new_path {
							bail!("two processors want to move {:?}, to {old:?} and to {new_path:?}", unit.rel_path);
						}
					}
					relocate = Some(new_path);
				}
			}

			let text = edit::apply(&unit.text, edits)
				.with_context(|| anyhow!("failed to rewrite {:?}", unit.rel_path))?;

			outputs.push(Output {
				old_path: unit.rel_path.clone(),
				new_path: relocate.unwrap_or_else(|| unit.rel_path.clone()),
				text,
			});
		}

		// nothing below may fail on malformed input anymore, only on IO
		let mut moved = 0;
		for output in &outputs {
			if output.old_path != output.new_path {
				debug!("moving {:?} to {:?}", output.old_path, output.new_path);
				fs::remove_file(root.join(&output.old_path))
					.with_context(|| anyhow!("failed to remove moved file {:?}", output.old_path))?;
				moved += 1;
			}
		}

		for output in &outputs {
			let path = root.join(&output.new_path);
			if let Some(parent) = path.parent() {
				fs::create_dir_all(parent)
					.with_context(|| anyhow!("failed to create directory {parent:?}"))?;
			}
			fs::write(&path, &output.text)
				.with_context(|| anyhow!("failed to write rewritten file {path:?}"))?;
		}

		info!("rewrote {} files ({moved} moved)", outputs.len());

		Ok(())
	}
}
