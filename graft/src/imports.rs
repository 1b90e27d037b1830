//! Pre-populating source files that patches touch but the decompiled base
//! tree doesn't ship.
//!
//! Without this, a patch creating its first hunk in such a file would fail
//! to apply, and the symbol rewriter would chase unresolvable references.
//! Where the file contents come from (a decompiler output directory, an
//! extracted sources jar) is the caller's business, behind [`ImportSource`].

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use crate::patch::{self, PatchSet};

pub trait ImportSource {
	/// The contents for `rel_path`, or `None` if this source doesn't have
	/// that file either.
	fn fetch(&self, rel_path: &Path) -> Result<Option<Vec<u8>>>;
}

/// Serves files straight out of a directory tree.
#[derive(Debug)]
pub struct DirImportSource {
	root: PathBuf,
}

impl DirImportSource {
	pub fn new(root: impl Into<PathBuf>) -> DirImportSource {
		DirImportSource { root: root.into() }
	}
}

impl ImportSource for DirImportSource {
	fn fetch(&self, rel_path: &Path) -> Result<Option<Vec<u8>>> {
		let path = self.root.join(rel_path);
		if !path.is_file() {
			return Ok(None);
		}
		fs::read(&path)
			.map(Some)
			.with_context(|| anyhow!("failed to read import {path:?}"))
	}
}

/// An import source with nothing to give.
#[derive(Debug, Default)]
pub struct NoImports;

impl ImportSource for NoImports {
	fn fetch(&self, _rel_path: &Path) -> Result<Option<Vec<u8>>> {
		Ok(None)
	}
}

/// Copies every file the patch sets touch that is missing under `tree_root`
/// from the import source into the tree. Returns how many were imported.
pub fn import_missing(tree_root: &Path, sets: &[PatchSet], source: &dyn ImportSource) -> Result<usize> {
	let mut imported = 0;

	for rel_path in patch::touched_paths(sets)? {
		let target = tree_root.join(&rel_path);
		if target.exists() {
			continue;
		}

		let Some(content) = source.fetch(&rel_path)? else {
			// the patch may well create the file itself
			debug!("no import available for {rel_path:?}");
			continue;
		};

		if let Some(parent) = target.parent() {
			fs::create_dir_all(parent)
				.with_context(|| anyhow!("failed to create directory {parent:?}"))?;
		}
		fs::write(&target, content)
			.with_context(|| anyhow!("failed to write import {target:?}"))?;

		debug!("imported {rel_path:?}");
		imported += 1;
	}

	if imported > 0 {
		info!("imported {imported} missing files into the base tree");
	}

	Ok(imported)
}
