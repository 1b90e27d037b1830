//! The session context of one coordinator run: cache directory, advisory
//! lock, and the persisted checkpoint.

use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

const LOCK_FILE: &str = "regraft.lock";
const CHECKPOINT_FILE: &str = "checkpoint.json";
const WORK_DIR: &str = "remap-work";

/// The two stages of a patch-chain remap.
///
/// The transition is one-directional: `PreRemap` (replaying the
/// already-accepted patch sets verbatim) is left for `Remap` (the per-patch
/// apply/remap/commit loop) exactly once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
	PreRemap,
	Remap,
}

/// The persisted record of the last completed step.
///
/// `patch_file` names the last patch whose commit step finished in `stage`,
/// or is `None` right after entering a stage, before the first patch. It
/// must always name a patch file that exists on disk; a checkpoint naming a
/// missing file means the inputs changed under a half-done run, which needs
/// an explicit reset rather than guesswork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
	pub stage: Stage,
	pub patch_set: String,
	pub patch_file: Option<String>,
}

/// Where checkpoints live between steps.
///
/// File-backed in production, in-memory for tests.
pub trait CheckpointStore {
	fn load(&self) -> Result<Option<Checkpoint>>;
	fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
	fn clear(&self) -> Result<()>;
}

/// Stores the checkpoint as a small json file, overwritten atomically
/// (write to a temp name, then rename over).
#[derive(Debug)]
pub struct FsStore {
	path: PathBuf,
}

impl FsStore {
	pub fn new(path: impl Into<PathBuf>) -> FsStore {
		FsStore { path: path.into() }
	}
}

impl CheckpointStore for FsStore {
	fn load(&self) -> Result<Option<Checkpoint>> {
		let content = match fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e).with_context(|| anyhow!("failed to read checkpoint {:?}", self.path)),
		};

		serde_json::from_str(&content)
			.map(Some)
			.with_context(|| anyhow!("checkpoint {:?} is corrupt", self.path))
	}

	fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
		let json = serde_json::to_string(checkpoint)?;

		let tmp = self.path.with_extension("json.tmp");
		fs::write(&tmp, json)
			.with_context(|| anyhow!("failed to write checkpoint to {tmp:?}"))?;
		fs::rename(&tmp, &self.path)
			.with_context(|| anyhow!("failed to move checkpoint into place at {:?}", self.path))?;

		debug!("checkpoint: {checkpoint:?}");
		Ok(())
	}

	fn clear(&self) -> Result<()> {
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e).with_context(|| anyhow!("failed to remove checkpoint {:?}", self.path)),
		}
	}
}

/// Keeps the checkpoint in memory. The slot is shared, so a test can
/// inspect it (or carry it over into a "restarted" run) from outside.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
	slot: Rc<RefCell<Option<Checkpoint>>>,
}

impl MemStore {
	pub fn new() -> MemStore {
		MemStore::default()
	}

	pub fn get(&self) -> Option<Checkpoint> {
		self.slot.borrow().clone()
	}
}

impl CheckpointStore for MemStore {
	fn load(&self) -> Result<Option<Checkpoint>> {
		Ok(self.slot.borrow().clone())
	}

	fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
		*self.slot.borrow_mut() = Some(checkpoint.clone());
		Ok(())
	}

	fn clear(&self) -> Result<()> {
		*self.slot.borrow_mut() = None;
		Ok(())
	}
}

/// One run's exclusive handle on a cache directory.
///
/// Acquiring takes an advisory lock file, so two coordinators cannot chew on
/// the same work tree at once. The lock disappears when the session is
/// dropped; after a hard kill the stale file has to be removed by the
/// operator, the same policy as for a corrupt checkpoint.
pub struct Session {
	cache_dir: PathBuf,
	store: Box<dyn CheckpointStore>,
	lock_path: PathBuf,
}

impl Session {
	/// Locks `cache_dir` and uses a file-backed checkpoint store inside it.
	pub fn acquire(cache_dir: impl Into<PathBuf>) -> Result<Session> {
		let cache_dir = cache_dir.into();
		let store = Box::new(FsStore::new(cache_dir.join(CHECKPOINT_FILE)));
		Session::acquire_with(cache_dir, store)
	}

	/// Locks `cache_dir` with a caller-chosen checkpoint store.
	pub fn acquire_with(cache_dir: impl Into<PathBuf>, store: Box<dyn CheckpointStore>) -> Result<Session> {
		let cache_dir = cache_dir.into();
		fs::create_dir_all(&cache_dir)
			.with_context(|| anyhow!("failed to create cache directory {cache_dir:?}"))?;

		let lock_path = cache_dir.join(LOCK_FILE);
		match fs::OpenOptions::new().write(true).create_new(true).open(&lock_path) {
			Ok(_) => {},
			Err(e) if e.kind() == ErrorKind::AlreadyExists => {
				bail!("another run owns {cache_dir:?} (lock file {lock_path:?} exists; \
					remove it if that run is certainly gone)");
			},
			Err(e) => return Err(e).with_context(|| anyhow!("failed to create lock file {lock_path:?}")),
		}

		Ok(Session { cache_dir, store, lock_path })
	}

	pub fn cache_dir(&self) -> &Path {
		&self.cache_dir
	}

	/// The directory the working tree lives in.
	pub fn work_dir(&self) -> PathBuf {
		self.cache_dir.join(WORK_DIR)
	}

	pub fn checkpoint(&self) -> Result<Option<Checkpoint>> {
		self.store.load()
	}

	pub fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
		self.store.save(checkpoint)
	}

	pub fn clear_checkpoint(&self) -> Result<()> {
		self.store.clear()
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		if let Err(e) = fs::remove_file(&self.lock_path) {
			if e.kind() != ErrorKind::NotFound {
				warn!("failed to remove lock file {:?}: {e}", self.lock_path);
			}
		}
	}
}
