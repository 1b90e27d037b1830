//! Renaming symbol references and rewriting access modifiers.

use anyhow::{bail, Result};
use indexmap::IndexMap;
use log::{debug, trace};
use sigil::access::{AccessChange, AccessTransform, AccessTransformSet, FinalChange, TargetMember};
use sigil::mappings::MappingTable;
use sigil::name::ClassName;
use crate::edit::Edit;
use crate::rewrite::{UnitEdits, UnitProcessor};
use crate::tree::{BoundUnit, MemberDecl, Modifiers, SymbolTarget};

/// What to do with a reference whose binding the frontend could not resolve.
///
/// Patched decompiler output is not guaranteed to compile, so the default is
/// to keep such references untouched and move on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnUnresolved {
	#[default]
	Keep,
	Fail,
}

/// Renames class/field/method references per a [`MappingTable`].
///
/// Declaration name tokens are references too (see [`crate::tree`]), so this
/// also renames the declarations themselves. A renamed top-level class
/// relocates its file.
pub struct SymbolRenamer<'a> {
	mappings: &'a MappingTable,
	on_unresolved: OnUnresolved,
}

impl<'a> SymbolRenamer<'a> {
	pub fn new(mappings: &'a MappingTable, on_unresolved: OnUnresolved) -> SymbolRenamer<'a> {
		SymbolRenamer { mappings, on_unresolved }
	}
}

impl UnitProcessor for SymbolRenamer<'_> {
	fn process(&mut self, unit: &BoundUnit) -> Result<UnitEdits> {
		let mut edits = Vec::new();

		for symbol_ref in &unit.refs {
			let old_text = unit.text.get(symbol_ref.span.start..symbol_ref.span.end);
			let Some(old_text) = old_text else {
				bail!("reference span {:?} does not lie on char boundaries of {:?}", symbol_ref.span, unit.rel_path);
			};

			let Some(ref target) = symbol_ref.target else {
				match self.on_unresolved {
					OnUnresolved::Keep => {
						debug!("leaving unresolved reference {old_text:?} in {:?} unchanged", unit.rel_path);
						continue;
					},
					OnUnresolved::Fail => {
						bail!("unresolved reference {old_text:?} at bytes {}..{} in {:?}",
							symbol_ref.span.start, symbol_ref.span.end, unit.rel_path);
					},
				}
			};

			let replacement = match target {
				SymbolTarget::Class(class) => {
					let new = self.mappings.map_class(class);
					if new == class {
						continue;
					}
					// qualified references keep their qualification
					if old_text.contains('.') {
						new.as_binary()
					} else {
						new.simple_name().to_owned()
					}
				},
				SymbolTarget::Field(field) => {
					let key = field.member_key();
					let new = self.mappings.map_field(&field.class, &key);
					if new == field.name {
						continue;
					}
					new.to_owned()
				},
				SymbolTarget::Method(method) => {
					// constructor "names" are class name tokens, which the
					// frontend reports as class references
					if method.is_ctor() {
						continue;
					}
					let key = method.member_key();
					let new = self.mappings.map_method(&method.class, &key);
					if new == method.name {
						continue;
					}
					new.to_owned()
				},
			};

			trace!("renaming {old_text:?} to {replacement:?} in {:?}", unit.rel_path);
			edits.push(Edit::replace(symbol_ref.span, replacement));
		}

		let new_main = self.mappings.map_class(&unit.main_class);
		let relocate = Some(new_main.source_path())
			.filter(|new_path| *new_path != unit.rel_path);

		Ok(UnitEdits { edits, relocate })
	}
}

fn transform_target(decl: &MemberDecl) -> (ClassName, TargetMember) {
	match &decl.target {
		SymbolTarget::Class(class) => (class.clone(), TargetMember::Class),
		SymbolTarget::Field(field) => (field.class.clone(), TargetMember::Field(field.name.clone())),
		SymbolTarget::Method(method) => (method.class.clone(), TargetMember::Method {
			name: method.name.clone(),
			desc: method.desc.clone(),
		}),
	}
}

fn modifier_edits(modifiers: &Modifiers, transform: AccessTransform, edits: &mut Vec<Edit>) -> Result<()> {
	if transform.access != modifiers.access {
		let replacement = match transform.access {
			AccessChange::Default => String::new(),
			access => {
				let keyword = match access {
					AccessChange::Private => "private",
					AccessChange::Protected => "protected",
					AccessChange::Public => "public",
					AccessChange::Default => unreachable!("matched above"),
				};
				format!("{keyword} ")
			},
		};
		edits.push(Edit::replace(modifiers.access_span, replacement));
	}

	match transform.final_change {
		FinalChange::Keep => {},
		FinalChange::Set => {
			if !modifiers.is_final {
				edits.push(Edit::insert(modifiers.access_span.end, "final "));
			}
		},
		FinalChange::Strip => {
			if modifiers.is_final {
				let Some(final_span) = modifiers.final_span else {
					bail!("declaration is final but the frontend supplied no span for the keyword");
				};
				edits.push(Edit::delete(final_span));
			}
		},
	}

	Ok(())
}

/// Applies an [`AccessTransformSet`] to matching declarations.
pub struct AtApplier<'a> {
	ats: &'a AccessTransformSet,
}

impl<'a> AtApplier<'a> {
	pub fn new(ats: &'a AccessTransformSet) -> AtApplier<'a> {
		AtApplier { ats }
	}
}

impl UnitProcessor for AtApplier<'_> {
	fn process(&mut self, unit: &BoundUnit) -> Result<UnitEdits> {
		let mut edits = Vec::new();

		for decl in &unit.decls {
			let (owner, member) = transform_target(decl);
			if let Some(transform) = self.ats.get(&owner, &member) {
				modifier_edits(&decl.modifiers, transform, &mut edits)?;
			}
		}

		Ok(UnitEdits { edits, relocate: None })
	}
}

fn package(class: &ClassName) -> &str {
	class.as_str().rsplit_once('/').map(|(package, _)| package).unwrap_or("")
}

fn outermost(class: &ClassName) -> &str {
	class.as_str().split_once('$').map(|(outer, _)| outer).unwrap_or(class.as_str())
}

/// The widening `from` needs to legally reach a member of `owner` declared
/// with `declared` access, if any.
///
/// Subclass relations aren't tracked, so a cross-package reference to a
/// protected member conservatively widens to public.
fn required_access(from: &ClassName, owner: &ClassName, declared: AccessChange) -> Option<AccessChange> {
	if outermost(from) == outermost(owner) {
		return None;
	}

	let same_package = package(from) == package(owner);
	let required = match declared {
		AccessChange::Public => return None,
		AccessChange::Private if same_package => AccessChange::Default,
		AccessChange::Default | AccessChange::Protected if same_package => return None,
		_ => AccessChange::Public,
	};

	(required > declared).then_some(required)
}

/// Scans every reference in the given units and collects the access
/// widenings needed for them to compile, as an access transform set.
///
/// Only declarations found in the units themselves are considered; a
/// reference into a classpath-only class cannot be widened by a source
/// rewrite anyway.
pub fn infer_access(units: &[BoundUnit]) -> Result<AccessTransformSet> {
	let mut declared: IndexMap<(ClassName, TargetMember), AccessChange> = IndexMap::new();
	for unit in units {
		for decl in &unit.decls {
			declared.insert(transform_target(decl), decl.modifiers.access);
		}
	}

	let mut inferred = AccessTransformSet::new();

	for unit in units {
		for symbol_ref in &unit.refs {
			let (Some(target), Some(from)) = (&symbol_ref.target, &symbol_ref.from_class) else {
				continue;
			};

			let (owner, member) = match target {
				SymbolTarget::Class(class) => (class.clone(), TargetMember::Class),
				SymbolTarget::Field(field) => (field.class.clone(), TargetMember::Field(field.name.clone())),
				SymbolTarget::Method(method) => (method.class.clone(), TargetMember::Method {
					name: method.name.clone(),
					desc: method.desc.clone(),
				}),
			};

			let Some(&access) = declared.get(&(owner.clone(), member.clone())) else {
				continue;
			};

			if let Some(required) = required_access(from, &owner, access) {
				debug!("widening {owner:?} {member:?} to {required:?} for a reference from {from:?}");
				inferred.add(owner, member, AccessTransform::widen(required));
			}
		}
	}

	Ok(inferred)
}

#[cfg(test)]
mod tests {
	use sigil::access::AccessChange;
	use sigil::name::ClassName;
	use super::required_access;

	#[test]
	fn protected_is_fine_within_a_package() {
		let from = ClassName::new("a/b/Caller");
		let owner = ClassName::new("a/b/Owner");
		assert_eq!(required_access(&from, &owner, AccessChange::Protected), None);
		assert_eq!(required_access(&from, &owner, AccessChange::Private), Some(AccessChange::Default));
	}

	#[test]
	fn cross_package_needs_public() {
		let from = ClassName::new("a/b/Caller");
		let owner = ClassName::new("c/d/Owner");
		assert_eq!(required_access(&from, &owner, AccessChange::Protected), Some(AccessChange::Public));
		assert_eq!(required_access(&from, &owner, AccessChange::Default), Some(AccessChange::Public));
		assert_eq!(required_access(&from, &owner, AccessChange::Public), None);
	}

	#[test]
	fn inner_classes_see_each_other() {
		let from = ClassName::new("a/b/Owner$Inner");
		let owner = ClassName::new("a/b/Owner");
		assert_eq!(required_access(&from, &owner, AccessChange::Private), None);
	}
}
