//! Patch sets: ordered directories of `*.patch` unified-diff files.

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexSet;

pub const PATCH_EXTENSION: &str = "patch";

/// One patch-set directory, patches sorted lexicographically by file name.
///
/// Directory-listing order is never trusted; the sort is what makes patch
/// numbering (`0001-...`, `0002-...`) define the application order.
#[derive(Debug, Clone)]
pub struct PatchSet {
	pub name: String,
	pub dir: PathBuf,
	pub patches: Vec<PathBuf>,
}

impl PatchSet {
	pub fn load(dir: impl Into<PathBuf>) -> Result<PatchSet> {
		let dir = dir.into();

		let name = dir.file_name()
			.and_then(|name| name.to_str())
			.with_context(|| anyhow!("patch set directory {dir:?} has no usable name"))?
			.to_owned();

		let mut patches = Vec::new();
		for entry in fs::read_dir(&dir)
			.with_context(|| anyhow!("cannot read patch set directory {dir:?}"))?
		{
			let path = entry?.path();
			if path.extension().is_some_and(|ext| ext == PATCH_EXTENSION) {
				patches.push(path);
			}
		}

		patches.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

		Ok(PatchSet { name, dir, patches })
	}

	pub fn is_empty(&self) -> bool {
		self.patches.is_empty()
	}

	/// The position of the given patch file name, for resuming.
	pub fn position(&self, file_name: &str) -> Option<usize> {
		self.patches.iter().position(|p| p.file_name().is_some_and(|name| name == file_name))
	}
}

/// Loads every subdirectory of `root` as a patch set, sorted by name.
///
/// All but the last are the already-accepted sets of a fork chain; the last
/// is the set being actively worked on.
pub fn load_sets(root: impl AsRef<Path>) -> Result<Vec<PatchSet>> {
	let root = root.as_ref();

	let mut dirs = Vec::new();
	for entry in fs::read_dir(root)
		.with_context(|| anyhow!("cannot read patch root {root:?}"))?
	{
		let path = entry?.path();
		if path.is_dir() {
			dirs.push(path);
		}
	}

	dirs.sort();

	let sets = dirs.into_iter()
		.map(PatchSet::load)
		.collect::<Result<Vec<_>>>()?;

	if sets.is_empty() {
		bail!("patch root {root:?} contains no patch set directories");
	}

	Ok(sets)
}

/// The file name of a patch, as a `&str`.
pub fn file_name(patch: &Path) -> Result<&str> {
	patch.file_name()
		.and_then(|name| name.to_str())
		.with_context(|| anyhow!("patch {patch:?} has no usable file name"))
}

/// Every path the given patch sets create or modify, from their `+++ b/`
/// lines.
///
/// Used to find source files a patch touches that the decompiled base tree
/// doesn't have, so they can be imported before the initial commit.
pub fn touched_paths(sets: &[PatchSet]) -> Result<IndexSet<PathBuf>> {
	const PREFIX: &str = "+++ b/";

	let mut paths = IndexSet::new();

	for set in sets {
		for patch in &set.patches {
			let content = fs::read_to_string(patch)
				.with_context(|| anyhow!("cannot read patch {patch:?}"))?;

			for line in content.lines() {
				if let Some(path) = line.strip_prefix(PREFIX) {
					paths.insert(PathBuf::from(path.trim_end()));
				}
			}
		}
	}

	Ok(paths)
}

/// The subject of a patch, i.e. the commit title it was generated from,
/// without the `[PATCH]` marker.
pub fn subject(patch: &Path) -> Result<String> {
	const PREFIX: &str = "Subject: ";

	let content = fs::read_to_string(patch)
		.with_context(|| anyhow!("cannot read patch {patch:?}"))?;

	for line in content.lines() {
		if let Some(subject) = line.strip_prefix(PREFIX) {
			let subject = subject.strip_prefix("[PATCH] ").unwrap_or(subject);
			return Ok(subject.trim_end().to_owned());
		}
	}

	bail!("patch {patch:?} has no subject line");
}

#[cfg(test)]
mod tests {
	use std::fs;
	use anyhow::Result;
	use super::PatchSet;

	#[test]
	fn patches_sort_by_file_name() -> Result<()> {
		let dir = tempfile::tempdir()?;
		// created out of order on purpose
		fs::write(dir.path().join("0002-second.patch"), "")?;
		fs::write(dir.path().join("0010-tenth.patch"), "")?;
		fs::write(dir.path().join("0001-first.patch"), "")?;
		fs::write(dir.path().join("notes.txt"), "")?;

		let set = PatchSet::load(dir.path())?;
		let names: Vec<_> = set.patches.iter()
			.map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
			.collect();
		assert_eq!(names, ["0001-first.patch", "0002-second.patch", "0010-tenth.patch"]);
		assert_eq!(set.position("0002-second.patch"), Some(1));

		Ok(())
	}
}
