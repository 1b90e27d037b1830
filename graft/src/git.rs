//! Running git as a subprocess.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use anyhow::{anyhow, bail, Context, Result};
use log::trace;

/// Runs git commands in one repository directory.
///
/// Every invocation disables commit signing and crlf checking, and pins a
/// repo-independent identity so that reruns commit byte-identically no
/// matter whose machine they run on.
#[derive(Debug, Clone)]
pub struct Git {
	repo: PathBuf,
}

impl Git {
	pub fn new(repo: impl Into<PathBuf>) -> Result<Git> {
		let repo = repo.into();
		if !repo.exists() {
			bail!("git directory does not exist: {repo:?}");
		}
		Ok(Git { repo })
	}

	pub fn repo(&self) -> &Path {
		&self.repo
	}

	fn command(&self, args: &[&str]) -> Command {
		let mut command = Command::new("git");
		command
			.arg("-c").arg("commit.gpgsign=false")
			.arg("-c").arg("core.safecrlf=false")
			.arg("-c").arg("user.name=regraft")
			.arg("-c").arg("user.email=regraft@auto.mated.null")
			.args(args)
			.current_dir(&self.repo);
		command
	}

	fn invoke(&self, args: &[&str]) -> Result<Output> {
		let mut command = self.command(args);
		trace!("running {command:?}");
		command.output()
			.with_context(|| anyhow!("failed to run git {}", args.join(" ")))
	}

	/// Runs the command, failing on a non-zero exit with the captured stderr
	/// in the error.
	pub fn run(&self, args: &[&str]) -> Result<()> {
		let output = self.invoke(args)?;
		if !output.status.success() {
			bail!("git {} finished with {}: {}",
				args.join(" "), output.status, String::from_utf8_lossy(&output.stderr).trim());
		}
		Ok(())
	}

	/// Like [`run`][Git::run], but hands back the captured stdout.
	pub fn output(&self, args: &[&str]) -> Result<String> {
		let output = self.invoke(args)?;
		if !output.status.success() {
			bail!("git {} finished with {}: {}",
				args.join(" "), output.status, String::from_utf8_lossy(&output.stderr).trim());
		}
		String::from_utf8(output.stdout)
			.with_context(|| anyhow!("stdout of git {} is not utf8", args.join(" ")))
	}

	/// Runs the command and reports whether it exited zero. For probes where
	/// a non-zero exit is an answer, not a failure.
	pub fn check(&self, args: &[&str]) -> Result<bool> {
		let output = self.invoke(args)?;
		Ok(output.status.success())
	}
}
