mod common;

use anyhow::Result;
use pretty_assertions::assert_eq;
use graft::patch::PatchSet;
use graft::stack;

#[test]
fn apply_then_rebuild_round_trips() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let base = dir.path().join("base");
	common::base_tree(&base);

	let patches = dir.path().join("patches");
	common::build_patch_set(dir.path(), &base, &patches, &[
		("Add field b", "net/example/Foo.java", "\
package net.example;

public class Foo {
	int a;
	int b;
}
"),
		("Add helper class", "net/example/Helper.java", "\
package net.example;

class Helper {
}
"),
	])?;

	let set = PatchSet::load(&patches)?;
	assert_eq!(set.patches.len(), 2);

	let work = dir.path().join("work");
	let tree = stack::apply_patches(&base, &set, &work)?;

	let rebuilt_dir = dir.path().join("rebuilt");
	let count = stack::rebuild_patches(&tree, "base", &rebuilt_dir)?;
	assert_eq!(count, 2);

	// same file names, byte-identical contents
	assert_eq!(common::read_patches(&patches), common::read_patches(&rebuilt_dir));

	Ok(())
}

#[test]
fn failing_patch_aborts_and_names_the_file() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let base = dir.path().join("base");
	common::base_tree(&base);

	let patches = dir.path().join("patches");
	common::build_patch_set(dir.path(), &base, &patches, &[
		("Add field b", "net/example/Foo.java", "\
package net.example;

public class Foo {
	int a;
	int b;
}
"),
	])?;
	common::write_corrupt_patch(&patches, "0002-break-things.patch", "Break things");

	let set = PatchSet::load(&patches)?;
	let work = dir.path().join("work");

	let err = stack::apply_patches(&base, &set, &work).unwrap_err();
	assert!(format!("{err:?}").contains("0002-break-things.patch"));

	Ok(())
}

#[test]
fn rebuild_clears_stale_output() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let base = dir.path().join("base");
	common::base_tree(&base);

	let patches = dir.path().join("patches");
	common::build_patch_set(dir.path(), &base, &patches, &[
		("Add field b", "net/example/Foo.java", "\
package net.example;

public class Foo {
	int a;
	int b;
}
"),
	])?;

	let set = PatchSet::load(&patches)?;
	let work = dir.path().join("work");
	let tree = stack::apply_patches(&base, &set, &work)?;

	let out = dir.path().join("out");
	common::write(&out, "0099-stale.patch", "stale leftover");

	stack::rebuild_patches(&tree, "base", &out)?;

	let names: Vec<String> = common::read_patches(&out).into_iter().map(|(name, _)| name).collect();
	assert_eq!(names, ["0001-Add-field-b.patch"]);

	Ok(())
}
