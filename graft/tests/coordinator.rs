mod common;

use std::fs;
use std::path::Path;
use anyhow::Result;
use pretty_assertions::assert_eq;
use graft::coordinator::{RemapCoordinator, RemapOptions, RemapOutcome, REMAPPED_BRANCH, UNMAPPED_BRANCH};
use graft::imports::NoImports;
use graft::patch::{self, PatchSet};
use graft::repo::WorkTree;
use graft::session::{MemStore, Session, Stage};

const FOO_V1: &str = "\
package net.example;

public class Foo {
	int a;
	Foo self;
}
";

/// patch root with a single target set: one patch adding a self-typed field
fn single_target_set(dir: &Path, base: &Path) -> Result<Vec<PatchSet>> {
	let set_dir = dir.join("patches/0001-feature");
	common::build_patch_set(dir, base, &set_dir, &[
		("Add self field", "net/example/Foo.java", FOO_V1),
	])?;
	Ok(vec![PatchSet::load(&set_dir)?])
}

fn run_options(resume: bool) -> RemapOptions {
	RemapOptions { resume, limit: None, keep_work_dir: false }
}

#[test]
fn full_remap_renames_patch_content_and_paths() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let base = dir.path().join("base");
	common::base_tree(&base);

	let sets = single_target_set(dir.path(), &base)?;
	let out = dir.path().join("out");

	let store = MemStore::new();
	let session = Session::acquire_with(dir.path().join("cache"), Box::new(store.clone()))?;

	let mut remapper = common::rename_foo_to_bar;
	let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, run_options(false));
	let outcome = coordinator.run(&base, &sets, &out)?;
	assert_eq!(outcome, RemapOutcome::Complete { rebuilt: 1 });

	let patches = common::read_patches(&out);
	assert_eq!(patches.len(), 1);
	let (name, content) = &patches[0];

	// path and in-diff symbols both reflect the renamed class
	assert_eq!(name, "0001-Add-self-field.patch");
	assert!(content.contains("+++ b/net/example/Bar.java"));
	assert!(content.contains("Bar self;"));
	assert!(!content.contains("Foo"));

	// terminal state: checkpoint gone, work tree gone
	assert_eq!(store.get(), None);
	assert!(!session.work_dir().exists());

	Ok(())
}

#[test]
fn rerunning_fresh_produces_identical_output() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let base = dir.path().join("base");
	common::base_tree(&base);

	let sets = single_target_set(dir.path(), &base)?;

	let mut outputs = Vec::new();
	for run in 0..2 {
		let out = dir.path().join(format!("out-{run}"));
		let cache = dir.path().join(format!("cache-{run}"));

		let session = Session::acquire(&cache)?;
		let mut remapper = common::rename_foo_to_bar;
		let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, run_options(false));
		coordinator.run(&base, &sets, &out)?;

		outputs.push(common::read_patches(&out));
	}

	assert_eq!(outputs[0], outputs[1]);

	Ok(())
}

#[test]
fn resume_skips_already_replayed_patches() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let base = dir.path().join("base");
	common::base_tree(&base);

	// two skip patches in one accepted set, then the target set
	let skip_dir = dir.path().join("patches/0001-accepted");
	common::build_patch_set(dir.path(), &base, &skip_dir, &[
		("Add comment", "net/example/Foo.java", "\
package net.example;

// accepted upstream
public class Foo {
	int a;
}
"),
		("Add field b", "net/example/Foo.java", "\
package net.example;

// accepted upstream
public class Foo {
	int a;
	int b;
}
"),
	])?;

	// the target patch adds a new file, so it can never collide with the
	// hunks of the accepted patches
	let target_dir = dir.path().join("patches/0002-feature");
	common::build_patch_set(dir.path(), &base, &target_dir, &[
		("Add self field", "net/example/Selfie.java", "\
package net.example;

class Selfie {
	Foo self;
}
"),
	])?;

	// sabotage skip patch 2 so the first run dies right after checkpointing
	// skip patch 1
	let skip_set = PatchSet::load(&skip_dir)?;
	let real_second = fs::read_to_string(&skip_set.patches[1])?;
	let second_name = patch::file_name(&skip_set.patches[1])?.to_owned();
	fs::remove_file(&skip_set.patches[1])?;
	common::write_corrupt_patch(&skip_dir, &second_name, "Add field b");

	let load_sets = || -> Result<Vec<PatchSet>> {
		Ok(vec![PatchSet::load(&skip_dir)?, PatchSet::load(&target_dir)?])
	};

	let out = dir.path().join("out");
	let cache = dir.path().join("cache");
	let store = MemStore::new();

	{
		let session = Session::acquire_with(&cache, Box::new(store.clone()))?;
		let mut remapper = common::rename_foo_to_bar;
		let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, run_options(false));
		let err = coordinator.run(&base, &load_sets()?, &out).unwrap_err();
		assert!(format!("{err:?}").contains(&second_name));
	}

	// the interruption left a checkpoint right after skip patch 1
	let checkpoint = store.get().unwrap();
	assert_eq!(checkpoint.stage, Stage::PreRemap);
	assert_eq!(checkpoint.patch_file.as_deref(), Some("0001-Add-comment.patch"));

	// heal the patch and resume; skip patch 1 must not be applied again
	fs::write(skip_dir.join(&second_name), real_second)?;

	{
		let session = Session::acquire_with(&cache, Box::new(store.clone()))?;
		let options = RemapOptions { resume: true, limit: None, keep_work_dir: true };
		let mut remapper = common::rename_foo_to_bar;
		let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, options);
		let outcome = coordinator.run(&base, &load_sets()?, &out)?;
		assert_eq!(outcome, RemapOutcome::Complete { rebuilt: 1 });

		// initial + skip 1 + skip 2 + target = 4 commits on the replay branch
		assert_eq!(common::commit_count(&session.work_dir(), UNMAPPED_BRANCH)?, 4);
		// initial + remapped base + target = 3 on the output branch
		assert_eq!(common::commit_count(&session.work_dir(), REMAPPED_BRANCH)?, 3);
	}

	assert_eq!(store.get(), None);

	let patches = common::read_patches(&out);
	assert_eq!(patches.len(), 1);
	assert!(patches[0].1.contains("Bar self;"));

	Ok(())
}

#[test]
fn failing_target_patch_leaves_output_untouched() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let base = dir.path().join("base");
	common::base_tree(&base);

	let target_dir = dir.path().join("patches/0001-feature");
	common::write_corrupt_patch(&target_dir, "0001-break-things.patch", "Break things");
	let sets = vec![PatchSet::load(&target_dir)?];

	let out = dir.path().join("out");
	common::write(&out, "0001-precious.patch", "untouched earlier output");

	let store = MemStore::new();
	let session = Session::acquire_with(dir.path().join("cache"), Box::new(store.clone()))?;
	let mut remapper = common::rename_foo_to_bar;
	let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, run_options(false));

	let err = coordinator.run(&base, &sets, &out).unwrap_err();
	assert!(format!("{err:?}").contains("0001-break-things.patch"));

	// the output directory was never touched
	assert_eq!(common::read_patches(&out), vec![
		("0001-precious.patch".to_owned(), "untouched earlier output".to_owned()),
	]);

	// the remapped branch never moved past the remapped base
	let work = session.work_dir();
	let tree = WorkTree::open(&work)?;
	assert_eq!(tree.last_title(REMAPPED_BRANCH)?, "remapped base");

	Ok(())
}

const FOO_V2: &str = "\
package net.example;

public class Foo {
	int a;
	Foo self;
	int depth;
}
";

/// Two-patch target set plus the machinery to stop after the first patch.
fn two_patch_setup(dir: &Path) -> Result<(Vec<PatchSet>, MemStore)> {
	let base = dir.join("base");
	common::base_tree(&base);

	let target_dir = dir.join("patches/0001-feature");
	common::build_patch_set(dir, &base, &target_dir, &[
		("Add self field", "net/example/Foo.java", FOO_V1),
		("Add depth field", "net/example/Foo.java", FOO_V2),
	])?;

	Ok((vec![PatchSet::load(&target_dir)?], MemStore::new()))
}

#[test]
fn crash_after_commit_before_checkpoint_is_not_reapplied() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let (sets, store) = two_patch_setup(dir.path())?;
	let base = dir.path().join("base");
	let out = dir.path().join("out");
	let cache = dir.path().join("cache");

	// first run processes only patch 1 and keeps the work tree
	{
		let session = Session::acquire_with(&cache, Box::new(store.clone()))?;
		let options = RemapOptions { resume: false, limit: Some(1), keep_work_dir: true };
		let mut remapper = common::rename_foo_to_bar;
		let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, options);
		let outcome = coordinator.run(&base, &sets, &out)?;
		assert_eq!(outcome, RemapOutcome::Truncated { processed: 1 });
		assert!(!out.exists());
	}

	// by hand, take patch 2 all the way through its remapped commit, but
	// die before the checkpoint is written (the 4e-vs-4g crash window)
	let work = dir.path().join("cache/remap-work");
	{
		let tree = WorkTree::open(&work)?;
		tree.apply_patch(&sets[0].patches[1])?;
		let record = tree.commit_record_of("HEAD")?;
		tree.retarget_head(REMAPPED_BRANCH)?;
		common::rename_foo_to_bar(&work)?;
		tree.commit_recorded(record)?;
		tree.checkout(UNMAPPED_BRANCH)?;
	}
	assert_eq!(store.get().unwrap().patch_file.as_deref(), Some("0001-Add-self-field.patch"));

	// resuming recognizes the finished patch instead of applying it twice
	{
		let session = Session::acquire_with(&cache, Box::new(store.clone()))?;
		let options = RemapOptions { resume: true, limit: None, keep_work_dir: true };
		let mut remapper = common::rename_foo_to_bar;
		let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, options);
		let outcome = coordinator.run(&base, &sets, &out)?;
		assert_eq!(outcome, RemapOutcome::Complete { rebuilt: 2 });
	}

	// initial + patch 1 + patch 2, nothing duplicated
	assert_eq!(common::commit_count(&work, UNMAPPED_BRANCH)?, 3);
	assert_eq!(common::commit_count(&work, REMAPPED_BRANCH)?, 4);

	let patches = common::read_patches(&out);
	assert_eq!(patches.len(), 2);
	assert!(patches[1].1.contains("int depth;"));

	Ok(())
}

#[test]
fn crash_mid_patch_finishes_the_in_flight_half() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let (sets, store) = two_patch_setup(dir.path())?;
	let base = dir.path().join("base");
	let out = dir.path().join("out");
	let cache = dir.path().join("cache");

	{
		let session = Session::acquire_with(&cache, Box::new(store.clone()))?;
		let options = RemapOptions { resume: false, limit: Some(1), keep_work_dir: true };
		let mut remapper = common::rename_foo_to_bar;
		let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, options);
		coordinator.run(&base, &sets, &out)?;
	}

	// patch 2 gets applied on the replay branch, then the run dies before
	// anything lands on the remapped branch (the 4a-vs-4e crash window)
	let work = dir.path().join("cache/remap-work");
	{
		let tree = WorkTree::open(&work)?;
		tree.apply_patch(&sets[0].patches[1])?;
	}

	{
		let session = Session::acquire_with(&cache, Box::new(store.clone()))?;
		let options = RemapOptions { resume: true, limit: None, keep_work_dir: true };
		let mut remapper = common::rename_foo_to_bar;
		let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, options);
		let outcome = coordinator.run(&base, &sets, &out)?;
		assert_eq!(outcome, RemapOutcome::Complete { rebuilt: 2 });
	}

	assert_eq!(common::commit_count(&work, UNMAPPED_BRANCH)?, 3);
	assert_eq!(common::commit_count(&work, REMAPPED_BRANCH)?, 4);

	let patches = common::read_patches(&out);
	assert_eq!(patches.len(), 2);
	// the in-flight patch kept its authorship and got remapped
	assert!(patches[1].0.contains("Add-depth-field"));
	assert!(patches[1].1.contains("From: Initial <auto@mated.null>"));
	assert!(!patches[1].1.contains("Foo"));

	Ok(())
}

#[test]
fn stale_checkpoint_without_resume_is_refused() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let (sets, store) = two_patch_setup(dir.path())?;
	let base = dir.path().join("base");
	let out = dir.path().join("out");
	let cache = dir.path().join("cache");

	{
		let session = Session::acquire_with(&cache, Box::new(store.clone()))?;
		let options = RemapOptions { resume: false, limit: Some(1), keep_work_dir: true };
		let mut remapper = common::rename_foo_to_bar;
		let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, options);
		coordinator.run(&base, &sets, &out)?;
	}

	let session = Session::acquire_with(&cache, Box::new(store.clone()))?;
	let mut remapper = common::rename_foo_to_bar;
	let mut coordinator = RemapCoordinator::new(&session, &mut remapper, &NoImports, run_options(false));
	assert!(coordinator.run(&base, &sets, &out).is_err());

	Ok(())
}
