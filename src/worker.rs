use std::path::{Path, PathBuf};
use anyhow::Result;
use log::info;
use chisel::frontend::Frontend;
use chisel::params::{RecordedParamPass, SyntheticParamPass};
use chisel::remap::{infer_access, AtApplier, OnUnresolved, SymbolRenamer};
use chisel::rewrite::Rewriter;
use graft::coordinator::TreeRemapper;
use sigil::access::AccessTransformSet;
use sigil::constructors::ConstructorIndex;
use sigil::mappings::MappingTable;
use sigil::params::ParamNames;

/// The composite rewrite step the coordinator runs between two branch
/// retargets: symbol renames, access transforms (consumed plus inferred),
/// and both parameter passes.
///
/// Inferred access transforms and collected parameter names accumulate
/// across all invocations of one run; they are written out once the whole
/// remap has succeeded.
pub struct SourceRemapWorker {
	frontend: Box<dyn Frontend>,
	classpath: Vec<PathBuf>,
	mappings: MappingTable,
	ats: AccessTransformSet,
	infer_access: bool,
	on_unresolved: OnUnresolved,
	constructors: ConstructorIndex,
	replay: Option<ParamNames>,
	collected: ParamNames,
}

impl SourceRemapWorker {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		frontend: Box<dyn Frontend>,
		classpath: Vec<PathBuf>,
		mappings: MappingTable,
		ats: AccessTransformSet,
		infer_access: bool,
		on_unresolved: OnUnresolved,
		constructors: ConstructorIndex,
		replay: Option<ParamNames>,
	) -> SourceRemapWorker {
		SourceRemapWorker {
			frontend,
			classpath,
			mappings,
			ats,
			infer_access,
			on_unresolved,
			constructors,
			replay,
			collected: ParamNames::new(),
		}
	}

	/// The updated access transforms (consumed plus everything inferred),
	/// rewritten into the target namespace, and the collected parameter
	/// names.
	pub fn into_outputs(self) -> (AccessTransformSet, ParamNames) {
		let ats = self.ats.remap(&self.mappings);
		(ats, self.collected)
	}
}

impl TreeRemapper for SourceRemapWorker {
	fn remap(&mut self, root: &Path) -> Result<()> {
		info!("remapping tree {root:?} to namespace {:?}", self.mappings.to);

		let units = self.frontend.parse(root, &self.classpath)?;

		if self.infer_access {
			let inferred = infer_access(&units)?;
			if !inferred.is_empty() {
				info!("inferred {} additional access transforms", inferred.len());
				self.ats.merge(inferred);
			}
		}

		let mut rewriter = Rewriter::new();
		rewriter.add(Box::new(SymbolRenamer::new(&self.mappings, self.on_unresolved)));
		rewriter.add(Box::new(AtApplier::new(&self.ats)));
		rewriter.add(Box::new(SyntheticParamPass::new(&self.mappings, &self.constructors, &mut self.collected)));
		if let Some(ref replay) = self.replay {
			rewriter.add(Box::new(RecordedParamPass::new(replay, &self.constructors)));
		}

		rewriter.rewrite_units(root, &units)
	}
}
