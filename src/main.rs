//! The regraft command line: transplant a patch chain onto a new mapping
//! namespace.

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use chisel::frontend::JsonFrontend;
use chisel::remap::OnUnresolved;
use graft::coordinator::{RemapCoordinator, RemapOptions, RemapOutcome};
use graft::imports::{DirImportSource, ImportSource, NoImports};
use graft::patch;
use graft::session::Session;
use crate::worker::SourceRemapWorker;

mod worker;

#[derive(Debug, Parser)]
#[command(name = "regraft", version, about = "Remaps a stack of source patches onto a new symbol namespace")]
struct Opts {
	/// Root directory with the ordered patch set directories; all but the
	/// last are replayed verbatim, the last one is remapped.
	#[arg(long)]
	patches: PathBuf,

	/// The decompiled source tree the patch chain applies to.
	#[arg(long)]
	base: PathBuf,

	/// Mapping table for the namespace hop ("remap" format).
	#[arg(long)]
	mappings: PathBuf,

	/// Access transform file to apply while remapping.
	#[arg(long)]
	ats: Option<PathBuf>,

	/// Constructor id table (`<id> <owner> <descriptor>` lines).
	#[arg(long)]
	constructors: PathBuf,

	/// Previously collected parameter names to replay.
	#[arg(long)]
	param_names: Option<PathBuf>,

	/// Classpath entry for binding resolution; repeatable.
	#[arg(long = "classpath")]
	classpath: Vec<PathBuf>,

	/// Directory with sources to import when a patch touches a file the
	/// base tree doesn't have.
	#[arg(long)]
	imports: Option<PathBuf>,

	/// The resolver command implementing the frontend protocol.
	#[arg(long)]
	frontend: String,

	/// Cache directory holding the work tree and the checkpoint.
	#[arg(long)]
	cache: PathBuf,

	/// Where the rebuilt (remapped) patch set goes.
	#[arg(long)]
	output: PathBuf,

	/// Where to write the updated access transforms.
	#[arg(long)]
	ats_out: Option<PathBuf>,

	/// Where to write the collected parameter names.
	#[arg(long)]
	param_names_out: Option<PathBuf>,

	/// Resume an interrupted run from its checkpoint.
	#[arg(long = "continue")]
	resume: bool,

	/// Stop after remapping this many patches, for iterative testing.
	#[arg(long)]
	limit_patches: Option<usize>,

	/// Fail on references whose bindings cannot be resolved, instead of
	/// leaving them unchanged.
	#[arg(long)]
	strict: bool,

	/// Keep the work tree around after successful completion.
	#[arg(long)]
	keep_work_dir: bool,

	/// More logging; repeat for trace output.
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,
}

fn init_logger(verbose: u8) -> Result<()> {
	let level = match verbose {
		0 => log::LevelFilter::Info,
		1 => log::LevelFilter::Debug,
		_ => log::LevelFilter::Trace,
	};

	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{}] {message}", record.level()))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()
		.context("failed to set up logging")
}

fn main() -> Result<()> {
	let opts = Opts::parse();
	init_logger(opts.verbose)?;

	let sets = patch::load_sets(&opts.patches)?;

	let mappings = sigil::tabular::read_file(&opts.mappings)?;
	let ats = match opts.ats {
		Some(ref path) => sigil::access::read_file(path)?,
		None => sigil::access::AccessTransformSet::new(),
	};
	let constructors = sigil::constructors::read_file(&opts.constructors)?;
	let replay = opts.param_names.as_ref()
		.map(sigil::params::read_file)
		.transpose()?;

	let on_unresolved = if opts.strict { OnUnresolved::Fail } else { OnUnresolved::Keep };

	let mut worker = SourceRemapWorker::new(
		Box::new(JsonFrontend::new(&opts.frontend)),
		opts.classpath.clone(),
		mappings,
		ats,
		true,
		on_unresolved,
		constructors,
		replay,
	);

	let imports: Box<dyn ImportSource> = match opts.imports {
		Some(ref dir) => Box::new(DirImportSource::new(dir)),
		None => Box::new(NoImports),
	};

	let session = Session::acquire(&opts.cache)?;
	let options = RemapOptions {
		resume: opts.resume,
		limit: opts.limit_patches,
		keep_work_dir: opts.keep_work_dir,
	};

	let outcome = RemapCoordinator::new(&session, &mut worker, imports.as_ref(), options)
		.run(&opts.base, &sets, &opts.output)?;

	match outcome {
		RemapOutcome::Complete { rebuilt } => {
			info!("remap complete, {rebuilt} patches written to {:?}", opts.output);

			let (ats, params) = worker.into_outputs();
			if let Some(ref path) = opts.ats_out {
				sigil::access::write_file(&ats, path)?;
				info!("updated access transforms written to {path:?}");
			}
			if let Some(ref path) = opts.param_names_out {
				sigil::params::write_file(&params, path)?;
				info!("collected parameter names written to {path:?}");
			}
		},
		RemapOutcome::Truncated { processed } => {
			info!("stopped after {processed} patches; rerun with --continue to finish");
		},
	}

	Ok(())
}
