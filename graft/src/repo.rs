//! The two-branch git working copy patches are replayed and remapped in.

use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use crate::git::Git;

/// Commit metadata captured right after a patch was applied, to be spent on
/// exactly one remapped commit.
///
/// There is deliberately no way to commit remapped changes without holding
/// one of these: [`WorkTree::apply_patch`] hands it out and
/// [`WorkTree::commit_recorded`] consumes it by value, so "commit reached
/// without captured metadata" cannot be written down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
	pub message: String,
	pub author: String,
	pub time: String,
}

impl CommitRecord {
	/// The commit title, i.e. the first line of the message.
	pub fn title(&self) -> &str {
		self.message.lines().next().unwrap_or("")
	}
}

/// A git working copy owned by one coordinator run.
#[derive(Debug)]
pub struct WorkTree {
	git: Git,
	root: PathBuf,
}

impl WorkTree {
	/// Initializes a fresh repository in `root`, which must already exist.
	pub fn init(root: impl Into<PathBuf>) -> Result<WorkTree> {
		let root = root.into();
		let git = Git::new(&root)?;
		git.run(&["init", "--quiet"])?;
		Ok(WorkTree { git, root })
	}

	/// Opens an existing repository, for resuming.
	pub fn open(root: impl Into<PathBuf>) -> Result<WorkTree> {
		let root = root.into();
		if !root.join(".git").exists() {
			bail!("{root:?} is not a git repository, cannot resume in it");
		}
		let git = Git::new(&root)?;
		Ok(WorkTree { git, root })
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Creates the replay branch (and checks it out) plus the output branch.
	///
	/// Must be called before the first commit; both branches share whatever
	/// gets committed first.
	pub fn create_branches(&self, unmapped: &str, remapped: &str) -> Result<()> {
		self.git.run(&["checkout", "-q", "-b", unmapped])?;
		self.commit_all("Initial")?;
		self.git.run(&["branch", remapped])?;
		Ok(())
	}

	/// Stages everything and commits it under the fixed setup identity.
	///
	/// Allows empty commits: setup steps get redone wholesale when a run is
	/// interrupted in the middle of one, and the redo may find nothing left
	/// to do.
	pub fn commit_all(&self, message: &str) -> Result<()> {
		self.git.run(&["add", "."])?;
		self.git.run(&["commit", "-q", "--allow-empty", "-m", message, "--author=Initial <auto@mated.null>"])?;
		Ok(())
	}

	pub fn tag(&self, name: &str) -> Result<()> {
		// -f so that a redone setup step can move its tag
		self.git.run(&["tag", "-f", name])
	}

	/// Repoints HEAD at another branch without touching a single working
	/// file — a symbolic-ref update, not a checkout.
	///
	/// This is the trick the remap loop is built on: after retargeting, the
	/// working tree still holds the *other* branch's files, and the next
	/// commit lands on the retargeted branch.
	pub fn retarget_head(&self, branch: &str) -> Result<()> {
		debug!("switching to {branch} without touching files");
		self.git.run(&["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")])
	}

	/// A normal checkout: moves HEAD *and* the working files.
	pub fn checkout(&self, branch: &str) -> Result<()> {
		debug!("checking out {branch}");
		self.git.run(&["checkout", "-q", branch])
	}

	pub fn current_branch(&self) -> Result<String> {
		Ok(self.git.output(&["branch", "--show-current"])?.trim().to_owned())
	}

	/// Applies one patch as a commit (3-way, whitespace-tolerant) and hands
	/// back the metadata of the commit it created.
	///
	/// A patch that does not apply is fatal; the error names the file.
	pub fn apply_patch(&self, patch: &Path) -> Result<CommitRecord> {
		info!("applying {:?}", patch.file_name().unwrap_or(patch.as_os_str()));

		let path = patch.to_str()
			.with_context(|| anyhow!("patch path {patch:?} is not utf8"))?;

		self.git.run(&["am", "--3way", "--ignore-whitespace", path])
			.with_context(|| anyhow!("patch failed to apply: {patch:?}"))?;

		self.commit_record_of("HEAD")
	}

	/// Reads the commit metadata at the tip of the given ref.
	pub fn commit_record_of(&self, reference: &str) -> Result<CommitRecord> {
		let message = self.git.output(&["log", "--format=%B", "-n", "1", reference])?;
		let author = self.git.output(&["log", "--format=%an <%ae>", "-n", "1", reference])?;
		let time = self.git.output(&["log", "--format=%aD", "-n", "1", reference])?;

		Ok(CommitRecord {
			message: message.trim_end().to_owned(),
			author: author.trim().to_owned(),
			time: time.trim().to_owned(),
		})
	}

	/// Stages everything and commits it, spending the captured metadata so
	/// the remapped commit keeps the original author, message and date.
	pub fn commit_recorded(&self, record: CommitRecord) -> Result<()> {
		debug!("committing remapped changes as {:?}", record.title());

		self.git.run(&["add", "."])?;
		self.git.run(&[
			"commit", "-q", "--allow-empty", "-m", &record.message,
			&format!("--author={}", record.author),
			&format!("--date={}", record.time),
		])?;
		Ok(())
	}

	/// The commit title at the tip of a branch.
	pub fn last_title(&self, branch: &str) -> Result<String> {
		Ok(self.git.output(&["log", branch, "-1", "--pretty=%s"])?.trim().to_owned())
	}

	/// How many commits `to` has on top of `from`.
	pub fn count_commits(&self, from: &str, to: &str) -> Result<usize> {
		let range = format!("{from}..{to}");
		let output = self.git.output(&["rev-list", "--count", &range])?;
		output.trim().parse()
			.with_context(|| anyhow!("unexpected rev-list output {output:?} for {range}"))
	}

	/// Whether the working tree differs from HEAD.
	pub fn has_uncommitted_changes(&self) -> Result<bool> {
		// refresh first, or stat-only differences count as changes
		let _ = self.git.check(&["update-index", "--refresh"])?;
		Ok(!self.git.check(&["diff-index", "--quiet", "HEAD", "--"])?)
	}

	pub fn git(&self) -> &Git {
		&self.git
	}
}
