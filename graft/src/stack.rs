//! Applying a patch stack onto a base tree, and rebuilding one from a
//! modified tree.

use std::fs;
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use walkdir::WalkDir;
use crate::patch::PatchSet;
use crate::repo::WorkTree;

pub const BASE_TAG: &str = "base";

/// Copies a source tree into `dst`, skipping any `.git` of the source.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
	for entry in WalkDir::new(src).min_depth(1).into_iter()
		.filter_entry(|e| e.file_name() != ".git")
	{
		let entry = entry?;
		let rel = entry.path().strip_prefix(src)
			.with_context(|| anyhow!("walked outside of {src:?}"))?;
		let target = dst.join(rel);

		if entry.file_type().is_dir() {
			fs::create_dir_all(&target)
				.with_context(|| anyhow!("failed to create directory {target:?}"))?;
		} else {
			if let Some(parent) = target.parent() {
				fs::create_dir_all(parent)
					.with_context(|| anyhow!("failed to create directory {parent:?}"))?;
			}
			fs::copy(entry.path(), &target)
				.with_context(|| anyhow!("failed to copy {:?} to {target:?}", entry.path()))?;
		}
	}

	Ok(())
}

/// Copies `base_dir` into a fresh `work_dir` and initializes a repository
/// there, without committing anything yet.
pub fn materialize(base_dir: &Path, work_dir: &Path) -> Result<WorkTree> {
	if work_dir.exists() {
		fs::remove_dir_all(work_dir)
			.with_context(|| anyhow!("failed to clear work directory {work_dir:?}"))?;
	}
	fs::create_dir_all(work_dir)
		.with_context(|| anyhow!("failed to create work directory {work_dir:?}"))?;

	copy_tree(base_dir, work_dir)
		.with_context(|| anyhow!("failed to copy base tree {base_dir:?} into {work_dir:?}"))?;

	WorkTree::init(work_dir)
}

/// Applies a whole patch set onto a copy of `base_dir` in `work_dir`.
///
/// The base is committed as "Initial" and tagged [`BASE_TAG`], then every
/// patch is applied in order, each becoming one commit. Any patch failing
/// to apply aborts the whole operation, naming the file; the half-patched
/// work directory is left behind for inspection only.
pub fn apply_patches(base_dir: &Path, set: &PatchSet, work_dir: &Path) -> Result<WorkTree> {
	let tree = materialize(base_dir, work_dir)?;

	tree.commit_all("Initial")?;
	tree.tag(BASE_TAG)?;

	info!("applying {} patches from {:?}", set.patches.len(), set.name);
	for patch in &set.patches {
		tree.apply_patch(patch)?;
	}

	Ok(tree)
}

/// Rebuilds the patch files for every commit from `base_ref` (exclusive) to
/// the tip of the current branch, one file per commit, into `out_dir`.
///
/// The target directory is cleared first. Commit message, author and date
/// are preserved in the patch headers; hashes and stats are suppressed so
/// that rebuilding the same commits twice produces byte-identical files.
pub fn rebuild_patches(tree: &WorkTree, base_ref: &str, out_dir: &Path) -> Result<usize> {
	if out_dir.exists() {
		fs::remove_dir_all(out_dir)
			.with_context(|| anyhow!("failed to clear patch output directory {out_dir:?}"))?;
	}
	fs::create_dir_all(out_dir)
		.with_context(|| anyhow!("failed to create patch output directory {out_dir:?}"))?;

	let out = out_dir.to_str()
		.with_context(|| anyhow!("patch output directory {out_dir:?} is not utf8"))?;

	let listing = tree.git().output(&[
		"format-patch", "--zero-commit", "--full-index", "--no-signature",
		"--no-stat", "-N", "-o", out, base_ref,
	])?;

	let count = listing.lines().filter(|line| !line.trim().is_empty()).count();
	if count == 0 {
		bail!("no patches generated from {base_ref} to HEAD");
	}

	debug!("rebuilt {count} patches into {out_dir:?}");

	Ok(count)
}
