// not every test binary uses every helper
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::Result;
use walkdir::WalkDir;
use graft::repo::WorkTree;
use graft::stack;

/// Writes a file under `root`, creating parent directories.
pub fn write(root: &Path, rel: &str, content: &str) {
	let path = root.join(rel);
	fs::create_dir_all(path.parent().unwrap()).unwrap();
	fs::write(path, content).unwrap();
}

pub const FOO_V0: &str = "\
package net.example;

public class Foo {
	int a;
}
";

/// A base tree with one class in it.
pub fn base_tree(dir: &Path) {
	write(dir, "net/example/Foo.java", FOO_V0);
}

/// Builds a patch set by committing each `(message, rel_path, content)` on
/// top of a copy of `base`, then rebuilding the commits as patch files in
/// `out`.
pub fn build_patch_set(scratch: &Path, base: &Path, out: &Path, commits: &[(&str, &str, &str)]) -> Result<()> {
	let work = scratch.join("patch-gen");
	if work.exists() {
		fs::remove_dir_all(&work)?;
	}
	fs::create_dir_all(&work)?;
	stack::copy_tree(base, &work)?;

	let tree = WorkTree::init(&work)?;
	tree.commit_all("Initial source")?;
	tree.tag("base")?;

	for (message, rel_path, content) in commits {
		write(&work, rel_path, content);
		tree.commit_all(message)?;
	}

	stack::rebuild_patches(&tree, "base", out)?;
	fs::remove_dir_all(&work)?;

	Ok(())
}

/// A patch that can never apply: its context exists nowhere and its index
/// blobs are unknown, so even a 3-way merge has nothing to work with.
pub fn write_corrupt_patch(dir: &Path, name: &str, subject: &str) {
	let content = format!("\
From 0000000000000000000000000000000000000000 Mon Sep 17 00:00:00 2001
From: Initial <auto@mated.null>
Date: Thu, 1 Jan 2020 00:00:00 +0000
Subject: [PATCH] {subject}

---
diff --git a/net/example/Foo.java b/net/example/Foo.java
index 1234567890123456789012345678901234567890..0987654321098765432109876543210987654321 100644
--- a/net/example/Foo.java
+++ b/net/example/Foo.java
@@ -1,3 +1,3 @@
 context that
-simply is
+not present
 anywhere
");
	fs::create_dir_all(dir).unwrap();
	fs::write(dir.join(name), content).unwrap();
}

/// A stand-in for the symbol remapper: renames the `Foo` class to `Bar` in
/// file contents and file names. Idempotent, like the real thing.
pub fn rename_foo_to_bar(root: &Path) -> Result<()> {
	let mut renames: Vec<(PathBuf, PathBuf)> = Vec::new();

	for entry in WalkDir::new(root).into_iter().filter_entry(|e| e.file_name() != ".git") {
		let entry = entry?;
		if !entry.file_type().is_file() || entry.path().extension().map(|e| e != "java").unwrap_or(true) {
			continue;
		}

		let text = fs::read_to_string(entry.path())?;
		let replaced = text.replace("Foo", "Bar");
		if replaced != text {
			fs::write(entry.path(), replaced)?;
		}

		if entry.path().file_name().is_some_and(|name| name == "Foo.java") {
			renames.push((entry.path().to_owned(), entry.path().with_file_name("Bar.java")));
		}
	}

	for (from, to) in renames {
		fs::rename(from, to)?;
	}

	Ok(())
}

/// All `*.patch` files in a directory, sorted, as `(name, content)`.
pub fn read_patches(dir: &Path) -> Vec<(String, String)> {
	let mut patches: Vec<(String, String)> = fs::read_dir(dir).unwrap()
		.map(|entry| entry.unwrap().path())
		.filter(|path| path.extension().is_some_and(|ext| ext == "patch"))
		.map(|path| {
			let name = path.file_name().unwrap().to_str().unwrap().to_owned();
			let content = fs::read_to_string(&path).unwrap();
			(name, content)
		})
		.collect();
	patches.sort();
	patches
}

pub fn commit_count(work: &Path, branch: &str) -> Result<usize> {
	let git = graft::git::Git::new(work)?;
	Ok(git.output(&["rev-list", "--count", branch])?.trim().parse()?)
}
