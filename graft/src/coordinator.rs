//! Transplanting a patch chain onto a new mapping namespace.
//!
//! Given a chain of patch sets where all but the last are already accepted
//! ("skip" sets) and the last is the one being actively remapped, the
//! coordinator produces an equivalent last set expressed against the new
//! namespace. It replays patches onto the `old` branch, and mirrors each of
//! them on the `remapped` branch by retargeting HEAD there *without a
//! checkout*, running the tree remapper over the working files, and
//! committing with the original patch's author, message and date.
//!
//! Every completed step is checkpointed through the [`Session`], so a
//! killed run resumes where it left off: steps are redone, never skipped,
//! and a patch is never applied twice.

use std::fs;
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use crate::imports::{self, ImportSource};
use crate::patch::{self, PatchSet};
use crate::repo::WorkTree;
use crate::session::{Checkpoint, Session, Stage};
use crate::stack;

pub const UNMAPPED_BRANCH: &str = "old";
pub const REMAPPED_BRANCH: &str = "remapped";
pub const REMAPPED_BASE_TAG: &str = "remapped-base";

/// Rewrites the symbols of a whole source tree, in place.
///
/// The coordinator calls this exactly once between a retarget to the
/// `remapped` branch and the commit there; it must not touch git state.
pub trait TreeRemapper {
	fn remap(&mut self, root: &Path) -> Result<()>;
}

impl<F: FnMut(&Path) -> Result<()>> TreeRemapper for F {
	fn remap(&mut self, root: &Path) -> Result<()> {
		self(root)
	}
}

#[derive(Debug, Clone, Default)]
pub struct RemapOptions {
	/// Resume from the persisted checkpoint instead of starting fresh.
	pub resume: bool,
	/// Stop the remap loop after this many target patches, for iterative
	/// testing. Replaying skip sets is never limited.
	pub limit: Option<usize>,
	/// Keep the work tree around after successful completion.
	pub keep_work_dir: bool,
}

/// What a coordinator run ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapOutcome {
	/// Every patch processed, output rebuilt, checkpoint cleared.
	Complete {
		rebuilt: usize,
	},
	/// Stopped early by the patch limit; checkpoint and work tree stay for
	/// a later `resume` run, and the output directory is untouched.
	Truncated {
		processed: usize,
	},
}

pub struct RemapCoordinator<'a> {
	session: &'a Session,
	remapper: &'a mut dyn TreeRemapper,
	imports: &'a dyn ImportSource,
	options: RemapOptions,
}

impl<'a> RemapCoordinator<'a> {
	pub fn new(
		session: &'a Session,
		remapper: &'a mut dyn TreeRemapper,
		imports: &'a dyn ImportSource,
		options: RemapOptions,
	) -> RemapCoordinator<'a> {
		RemapCoordinator { session, remapper, imports, options }
	}

	/// Runs the whole remap: replay the skip sets, build the remapped base,
	/// remap the target set patch by patch, rebuild the target set's files
	/// into `out_dir`.
	pub fn run(&mut self, base_dir: &Path, sets: &[PatchSet], out_dir: &Path) -> Result<RemapOutcome> {
		let Some((target, skips)) = sets.split_last() else {
			bail!("no patch sets given");
		};
		if target.is_empty() {
			bail!("target patch set {:?} has no patches", target.name);
		}

		let checkpoint = self.session.checkpoint()?;

		let (tree, resume_from) = if self.options.resume {
			let checkpoint = checkpoint
				.context("asked to continue, but there is no checkpoint to resume from")?;
			validate_checkpoint(&checkpoint, skips, target)?;

			info!("resuming from {checkpoint:?}");

			let tree = WorkTree::open(self.session.work_dir())?;
			// a run killed inside `git am` leaves an am session behind that
			// would block every later apply; rolling it back also restores
			// the pre-am working files
			let _ = tree.git().check(&["am", "--abort"])?;

			(tree, Some(checkpoint))
		} else {
			if checkpoint.is_some() {
				bail!("a checkpoint exists in {:?}; continue the interrupted run, \
					or clear the cache directory to start over", self.session.cache_dir());
			}

			(self.setup_tree(base_dir, sets, skips, target)?, None)
		};

		// PRE_REMAP: replay the accepted patch sets verbatim
		match &resume_from {
			None => {
				self.run_pre_remap(&tree, skips, (0, 0))?;
				self.build_remapped_base(&tree, target)?;
			},
			Some(Checkpoint { stage: Stage::PreRemap, patch_set, patch_file }) => {
				let start = pre_remap_start(skips, patch_set, patch_file.as_deref());
				self.run_pre_remap(&tree, skips, start)?;
				self.build_remapped_base(&tree, target)?;
			},
			Some(Checkpoint { stage: Stage::Remap, .. }) => {},
		}

		// REMAP: the per-patch apply/remap/commit loop
		let skip_total: usize = skips.iter().map(|set| set.patches.len()).sum();
		let start = match self.session.checkpoint()? {
			Some(Checkpoint { stage: Stage::Remap, ref patch_file, .. }) => {
				let resumed_mid_loop = matches!(resume_from, Some(Checkpoint { stage: Stage::Remap, .. }));
				let next = match patch_file.as_deref() {
					None => 0,
					Some(file) => target.position(file)
						.with_context(|| anyhow!("checkpoint names unknown patch {file:?}"))? + 1,
				};
				if resumed_mid_loop {
					self.settle_in_flight(&tree, target, skip_total, next)?
				} else {
					next
				}
			},
			other => bail!("checkpoint changed unexpectedly mid-run: {other:?}"),
		};

		let processed = self.run_remap(&tree, target, start)?;

		if start + processed < target.patches.len() {
			info!("stopped after {processed} patches (limit), not rebuilding output");
			return Ok(RemapOutcome::Truncated { processed });
		}

		// only now is the persisted patch directory allowed to change
		tree.checkout(REMAPPED_BRANCH)?;
		let rebuilt = stack::rebuild_patches(&tree, REMAPPED_BASE_TAG, out_dir)?;
		info!("rebuilt {rebuilt} remapped patches into {out_dir:?}");

		self.session.clear_checkpoint()?;

		if !self.options.keep_work_dir {
			fs::remove_dir_all(tree.root())
				.with_context(|| anyhow!("failed to remove work tree {:?}", tree.root()))?;
		}

		Ok(RemapOutcome::Complete { rebuilt })
	}

	/// Fresh setup: copy the base, pull in missing imports, create both
	/// branches off the shared initial commit, write the initial checkpoint.
	fn setup_tree(&self, base_dir: &Path, sets: &[PatchSet], skips: &[PatchSet], target: &PatchSet) -> Result<WorkTree> {
		info!("setting up work tree in {:?}", self.session.work_dir());

		let tree = stack::materialize(base_dir, &self.session.work_dir())?;
		imports::import_missing(tree.root(), sets, self.imports)?;

		tree.create_branches(UNMAPPED_BRANCH, REMAPPED_BRANCH)?;
		tree.tag(stack::BASE_TAG)?;

		let first_set = skips.first().unwrap_or(target);
		self.session.save_checkpoint(&Checkpoint {
			stage: Stage::PreRemap,
			patch_set: first_set.name.clone(),
			patch_file: None,
		})?;

		Ok(tree)
	}

	fn run_pre_remap(&self, tree: &WorkTree, skips: &[PatchSet], start: (usize, usize)) -> Result<()> {
		let (start_set, start_patch) = start;

		// the run may have died between applying a patch and writing its
		// checkpoint; the commit count tells whether one patch is ahead of
		// the checkpoint, and that one must not be applied twice
		let expected = skips[..start_set.min(skips.len())].iter()
			.map(|set| set.patches.len())
			.sum::<usize>() + start_patch;
		let applied = tree.count_commits(stack::BASE_TAG, UNMAPPED_BRANCH)?;
		let mut ahead = match applied.checked_sub(expected) {
			Some(ahead @ (0 | 1)) => ahead,
			_ => bail!("unknown state: {applied} patches on {UNMAPPED_BRANCH:?}, \
				but the checkpoint accounts for {expected}"),
		};

		for (si, set) in skips.iter().enumerate().skip(start_set) {
			let from = if si == start_set { start_patch } else { 0 };

			for patch in &set.patches[from..] {
				let name = patch::file_name(patch)?;

				if std::mem::take(&mut ahead) == 1 {
					debug!("{name} was already applied before the interruption");
				} else {
					tree.apply_patch(patch)?;
				}

				self.session.save_checkpoint(&Checkpoint {
					stage: Stage::PreRemap,
					patch_set: set.name.clone(),
					patch_file: Some(name.to_owned()),
				})?;
			}
		}

		Ok(())
	}

	/// The hinge between the stages: with HEAD retargeted to `remapped` but
	/// the working files still those of `old`'s tip, one remap pass plus one
	/// commit gives both branches the same logical content under different
	/// names.
	fn build_remapped_base(&mut self, tree: &WorkTree, target: &PatchSet) -> Result<()> {
		info!("building the remapped base");

		tree.retarget_head(REMAPPED_BRANCH)?;
		self.remapper.remap(tree.root())?;
		tree.commit_all("remapped base")?;
		tree.tag(REMAPPED_BASE_TAG)?;
		tree.checkout(UNMAPPED_BRANCH)?;

		self.session.save_checkpoint(&Checkpoint {
			stage: Stage::Remap,
			patch_set: target.name.clone(),
			patch_file: None,
		})?;

		Ok(())
	}

	/// Brings a resumed work tree back in step with the checkpoint, and
	/// returns the index of the next patch to process.
	///
	/// Equal tip titles on both branches mean the last apply/remap pair
	/// completed; different titles mean a patch was applied on `old` but
	/// never committed remapped, and that half gets finished here.
	fn settle_in_flight(&mut self, tree: &WorkTree, target: &PatchSet, skip_total: usize, next: usize) -> Result<usize> {
		let old_title = tree.last_title(UNMAPPED_BRANCH)?;
		let remapped_title = tree.last_title(REMAPPED_BRANCH)?;

		let applied = tree.count_commits(stack::BASE_TAG, UNMAPPED_BRANCH)?
			.checked_sub(skip_total)
			.context("unknown state: fewer commits on the replay branch than skip patches")?;
		let remapped = tree.count_commits(REMAPPED_BASE_TAG, REMAPPED_BRANCH)?;

		if old_title != remapped_title {
			// interrupted between applying a patch and committing its
			// remapped form; finish the remapped half now
			if applied != remapped + 1 || applied != next + 1 {
				bail!("unknown state: {applied} patches applied but {remapped} remapped, \
					with the checkpoint at {next}");
			}
			let patch = &target.patches[next];
			let name = patch::file_name(patch)?;
			if patch::subject(patch)? != old_title {
				bail!("work tree does not match the checkpoint: old is at {old_title:?}, \
					but the in-flight patch is {name:?}");
			}

			info!("finishing in-flight patch {name}");

			let record = tree.commit_record_of(UNMAPPED_BRANCH)?;
			tree.retarget_head(REMAPPED_BRANCH)?;
			self.remapper.remap(tree.root())?;
			tree.commit_recorded(record)?;
			tree.checkout(UNMAPPED_BRANCH)?;

			self.session.save_checkpoint(&Checkpoint {
				stage: Stage::Remap,
				patch_set: target.name.clone(),
				patch_file: Some(name.to_owned()),
			})?;

			return Ok(next + 1);
		}

		if applied != remapped {
			bail!("unknown state: branch tips agree on {old_title:?}, \
				but {applied} patches were applied and {remapped} remapped");
		}
		if tree.current_branch()? == UNMAPPED_BRANCH && tree.has_uncommitted_changes()? {
			bail!("unknown state: branches are in sync but the work tree has uncommitted changes");
		}

		// the run may have died after committing a patch on both branches
		// but before its checkpoint; the commit count gives it away
		let mut next = next;
		if applied == next + 1 {
			let patch = &target.patches[next];
			let name = patch::file_name(patch)?;
			debug!("{name} completed on both branches before the interruption");

			self.session.save_checkpoint(&Checkpoint {
				stage: Stage::Remap,
				patch_set: target.name.clone(),
				patch_file: Some(name.to_owned()),
			})?;

			next += 1;
		} else if applied != next {
			bail!("unknown state: {applied} patches done on both branches, \
				but the checkpoint is at {next}");
		}

		// restore HEAD and files in case the crash was between commit and
		// checkout
		tree.checkout(UNMAPPED_BRANCH)?;

		Ok(next)
	}

	fn run_remap(&mut self, tree: &WorkTree, target: &PatchSet, start: usize) -> Result<usize> {
		let mut processed = 0;

		for patch in &target.patches[start..] {
			if self.options.limit.is_some_and(|limit| processed >= limit) {
				break;
			}

			let name = patch::file_name(patch)?;
			info!("remapping {name}");

			let record = tree.apply_patch(patch)?;
			tree.retarget_head(REMAPPED_BRANCH)?;
			self.remapper.remap(tree.root())?;
			tree.commit_recorded(record)?;
			tree.checkout(UNMAPPED_BRANCH)?;

			self.session.save_checkpoint(&Checkpoint {
				stage: Stage::Remap,
				patch_set: target.name.clone(),
				patch_file: Some(name.to_owned()),
			})?;

			processed += 1;
		}

		Ok(processed)
	}
}

fn pre_remap_start(skips: &[PatchSet], patch_set: &str, patch_file: Option<&str>) -> (usize, usize) {
	let Some(set_index) = skips.iter().position(|set| set.name == patch_set) else {
		// the initial checkpoint can name the target set when there are no
		// skip sets at all
		return (skips.len(), 0);
	};

	match patch_file {
		None => (set_index, 0),
		Some(file) => match skips[set_index].position(file) {
			// validated earlier, but stay defensive about indexing
			Some(index) => (set_index, index + 1),
			None => (set_index, 0),
		},
	}
}

/// A checkpoint must always name patch files that still exist on disk;
/// anything else means the inputs changed under a half-done run.
fn validate_checkpoint(checkpoint: &Checkpoint, skips: &[PatchSet], target: &PatchSet) -> Result<()> {
	let find_set = |name: &str| {
		skips.iter().chain([target]).find(|set| set.name == name)
	};

	let set = find_set(&checkpoint.patch_set)
		.with_context(|| anyhow!("checkpoint names unknown patch set {:?}; \
			reset the cache directory if the patch layout changed", checkpoint.patch_set))?;

	if let Some(ref file) = checkpoint.patch_file {
		if set.position(file).is_none() {
			bail!("checkpoint names patch {file:?} which no longer exists in {:?}; \
				reset the cache directory if the patch layout changed", set.name);
		}

		match checkpoint.stage {
			Stage::PreRemap if set.name == target.name => {
				bail!("checkpoint claims the target set {:?} was replayed verbatim", target.name);
			},
			Stage::Remap if set.name != target.name => {
				bail!("checkpoint remaps {:?}, which is not the target set {:?}", set.name, target.name);
			},
			_ => {},
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use crate::patch::PatchSet;
	use super::pre_remap_start;

	fn set(name: &str, files: &[&str]) -> PatchSet {
		PatchSet {
			name: name.to_owned(),
			dir: std::path::PathBuf::from(name),
			patches: files.iter().map(|f| std::path::PathBuf::from(name).join(f)).collect(),
		}
	}

	#[test]
	fn start_positions() {
		let skips = vec![
			set("0001-api", &["0001-a.patch", "0002-b.patch"]),
			set("0002-server", &["0001-c.patch"]),
		];

		assert_eq!(pre_remap_start(&skips, "0001-api", None), (0, 0));
		assert_eq!(pre_remap_start(&skips, "0001-api", Some("0001-a.patch")), (0, 1));
		assert_eq!(pre_remap_start(&skips, "0001-api", Some("0002-b.patch")), (0, 2));
		assert_eq!(pre_remap_start(&skips, "0002-server", Some("0001-c.patch")), (1, 1));
		// the target set never appears among the skips
		assert_eq!(pre_remap_start(&skips, "0003-feature", None), (2, 0));
	}
}
