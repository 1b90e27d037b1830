//! Parameter renaming.
//!
//! Two passes over method/constructor parameter declarations, both driven by
//! resolved bindings:
//! - [`SyntheticParamPass`] assigns deterministic placeholder names derived
//!   from the numeric id in a synthetic method name (or, for constructors,
//!   the id from the [`ConstructorIndex`]), and records the names the
//!   parameters had before — that is where human-chosen names get collected.
//! - [`RecordedParamPass`] replays such a collected table onto a tree whose
//!   methods already carry their synthetic names.

use anyhow::{bail, Result};
use log::trace;
use sigil::constructors::ConstructorIndex;
use sigil::mappings::MappingTable;
use sigil::name::MethodRef;
use sigil::params::ParamNames;
use crate::edit::Edit;
use crate::rewrite::{UnitEdits, UnitProcessor};
use crate::tree::{BoundUnit, MemberDecl};

/// Extracts the numeric id out of a synthetic method name, `func_<id>_*`.
fn synthetic_id(name: &str) -> Option<&str> {
	let rest = name.strip_prefix("func_")?;
	let (id, _rest) = rest.split_once('_')?;
	(!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}

/// Assigns placeholder parameter names and collects the previous names.
///
/// A parameter of a method whose *mapped* name is synthetic gets
/// `p_<id>_<index>_`; a constructor parameter gets `p_i<id>_<index>_` with
/// the id resolved through the constructor table. The index counts JVM
/// slots, so it is incremented by one for anything non-static (`this` is
/// slot 0; constructors are never static).
pub struct SyntheticParamPass<'a> {
	mappings: &'a MappingTable,
	constructors: &'a ConstructorIndex,
	recorded: &'a mut ParamNames,
}

impl<'a> SyntheticParamPass<'a> {
	pub fn new(
		mappings: &'a MappingTable,
		constructors: &'a ConstructorIndex,
		recorded: &'a mut ParamNames,
	) -> SyntheticParamPass<'a> {
		SyntheticParamPass { mappings, constructors, recorded }
	}

	fn key_and_id(&self, method: &MethodRef) -> Result<Option<(String, String)>> {
		if method.is_ctor() {
			// the constructor table is written against the mapped namespace
			let owner = self.mappings.map_class(&method.class);
			let desc = self.mappings.map_desc(&method.desc);

			Ok(self.constructors.find(owner, &desc)
				.map(|entry| (format!("const_{}", entry.id), format!("i{}", entry.id))))
		} else {
			let key = method.member_key();
			let mapped = self.mappings.map_method(&method.class, &key);

			Ok(synthetic_id(mapped)
				.map(|id| (mapped.to_owned(), id.to_owned())))
		}
	}
}

impl UnitProcessor for SyntheticParamPass<'_> {
	fn process(&mut self, unit: &BoundUnit) -> Result<UnitEdits> {
		let mut edits = Vec::new();

		for decl in &unit.decls {
			let Some(method) = decl.method() else { continue };

			let Some((key, id)) = self.key_and_id(method)? else { continue };

			for param in &decl.params {
				self.recorded.record(&key, decl.params.len(), param.index, &param.name)?;

				let mut slot = param.index;
				if method.is_ctor() {
					// constructors are never static
					slot += 1;
				} else if !decl.modifiers.is_static {
					slot += 1;
				}

				let placeholder = format!("p_{id}_{slot}_");
				trace!("renaming parameter {:?} of {key} to {placeholder}", param.name);

				for span in &param.spans {
					edits.push(Edit::replace(*span, placeholder.clone()));
				}
			}
		}

		Ok(UnitEdits { edits, relocate: None })
	}
}

/// Replays previously collected parameter names.
///
/// Looks up methods by their current (synthetic) name and constructors
/// through the constructor table. A recorded entry whose length does not
/// match the declaration's arity means the signature changed since the
/// names were collected, which is fatal.
pub struct RecordedParamPass<'a> {
	recorded: &'a ParamNames,
	constructors: &'a ConstructorIndex,
}

impl<'a> RecordedParamPass<'a> {
	pub fn new(recorded: &'a ParamNames, constructors: &'a ConstructorIndex) -> RecordedParamPass<'a> {
		RecordedParamPass { recorded, constructors }
	}
}

impl UnitProcessor for RecordedParamPass<'_> {
	fn process(&mut self, unit: &BoundUnit) -> Result<UnitEdits> {
		let mut edits = Vec::new();

		for decl in &unit.decls {
			let Some(method) = decl.method() else { continue };

			let key = if method.is_ctor() {
				let Some(entry) = self.constructors.find(&method.class, &method.desc) else {
					continue;
				};
				format!("const_{}", entry.id)
			} else {
				method.name.clone()
			};

			let Some(names) = self.recorded.get(&key) else { continue };

			if names.len() != decl.params.len() {
				bail!("invalid parameter length; expected {}, actual {} for {} {} {}",
					names.len(), decl.params.len(), method.class, method.name, method.desc);
			}

			for param in &decl.params {
				let Some(name) = &names[param.index] else { continue };

				for span in &param.spans {
					edits.push(Edit::replace(*span, name.clone()));
				}
			}
		}

		Ok(UnitEdits { edits, relocate: None })
	}
}
