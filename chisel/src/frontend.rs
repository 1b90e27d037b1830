//! The seam to the external Java frontend.
//!
//! Parsing Java and resolving bindings against a classpath is not this
//! crate's job. A [`Frontend`] hands back [`BoundUnit`]s for every source
//! file under a root; the production implementation is [`JsonFrontend`],
//! which runs a resolver subprocess and talks JSON with it.

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, trace};
use serde::Serialize;
use crate::tree::BoundUnit;

pub trait Frontend {
	/// Parses every source file under `root`, resolving bindings against the
	/// classpath.
	///
	/// References that cannot be resolved come back with
	/// [`target: None`][crate::tree::SymbolRef::target]; only IO and
	/// frontend-internal failures are errors.
	fn parse(&mut self, root: &Path, classpath: &[PathBuf]) -> Result<Vec<BoundUnit>>;
}

#[derive(Debug, Serialize)]
struct FrontendConfig<'a> {
	root: &'a Path,
	classpath: &'a [PathBuf],
}

/// Runs an external resolver command.
///
/// The config (source root plus classpath) is sent to the child as JSON on
/// stdin; the child answers with a JSON array of bound units on stdout and
/// keeps stderr for its own diagnostics.
#[derive(Debug)]
pub struct JsonFrontend {
	command: OsString,
	args: Vec<OsString>,
}

impl JsonFrontend {
	pub fn new(command: &(impl AsRef<OsStr> + ?Sized)) -> JsonFrontend {
		JsonFrontend { command: OsString::from(command), args: Vec::new() }
	}

	pub fn arg(mut self, arg: &(impl AsRef<OsStr> + ?Sized)) -> JsonFrontend {
		self.args.push(OsString::from(arg));
		self
	}
}

impl Frontend for JsonFrontend {
	fn parse(&mut self, root: &Path, classpath: &[PathBuf]) -> Result<Vec<BoundUnit>> {
		let mut command = Command::new(&self.command);
		command.args(&self.args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped());

		trace!("running frontend {command:?} on {root:?}");

		let mut child = command.spawn()
			.with_context(|| anyhow!("failed to spawn frontend {command:?}"))?;

		let config = FrontendConfig { root, classpath };
		{
			let mut stdin = child.stdin.take()
				.context("frontend child has no stdin")?;
			let json = serde_json::to_vec(&config)?;
			stdin.write_all(&json)
				.context("failed to send config to the frontend")?;
			// dropping stdin closes the pipe, the child sees eof
		}

		let output = child.wait_with_output()
			.with_context(|| anyhow!("failed to wait for frontend {command:?}"))?;

		if !output.status.success() {
			bail!("frontend {command:?} finished with {}", output.status);
		}

		let units: Vec<BoundUnit> = serde_json::from_slice(&output.stdout)
			.context("frontend output is not a valid bound unit array")?;

		debug!("frontend parsed {} units under {root:?}", units.len());

		Ok(units)
	}
}
