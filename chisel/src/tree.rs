//! The bound AST, as supplied by the external frontend.
//!
//! A [`BoundUnit`] is one source file together with everything the rewriters
//! need to know about it: the spans of resolved symbol references (including
//! the name tokens of declarations, which count as references to their own
//! symbol) and the declarations themselves with their modifier spans and
//! parameters.
//!
//! All spans are byte offsets into [`BoundUnit::text`]. The types derive
//! serde traits because units cross the frontend subprocess boundary as
//! JSON.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use sigil::access::AccessChange;
use sigil::name::{ClassName, FieldRef, MethodRef};

/// A half-open byte range into the text of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
	pub start: usize,
	pub end: usize,
}

impl Span {
	pub fn new(start: usize, end: usize) -> Span {
		Span { start, end }
	}

	pub fn len(&self) -> usize {
		self.end - self.start
	}

	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}
}

/// The symbol a reference or declaration resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolTarget {
	Class(ClassName),
	Field(FieldRef),
	Method(MethodRef),
}

/// One resolved (or unresolvable) symbol reference in the source text.
///
/// `target` is `None` when the frontend could not resolve the binding:
/// patched decompiler output is not guaranteed to compile, so unresolved
/// references are expected input, not a frontend bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
	pub span: Span,
	pub target: Option<SymbolTarget>,
	/// The class whose body contains this reference, for accessibility
	/// analysis.
	pub from_class: Option<ClassName>,
}

/// A parameter declaration: the declaration site span first, then every
/// usage span inside the method body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
	pub index: usize,
	pub name: String,
	pub spans: Vec<Span>,
}

/// The modifier situation of a declaration.
///
/// `access_span` covers the access keyword *including one trailing space*,
/// or is empty at the position where a keyword would be inserted (default
/// access). `final_span` likewise covers `final ` when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
	pub access: AccessChange,
	pub access_span: Span,
	pub is_final: bool,
	pub final_span: Option<Span>,
	pub is_static: bool,
}

/// A class, field, method or constructor declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDecl {
	pub target: SymbolTarget,
	pub modifiers: Modifiers,
	/// Parameters, for methods and constructors.
	pub params: Vec<ParamDecl>,
}

impl MemberDecl {
	pub fn method(&self) -> Option<&MethodRef> {
		match &self.target {
			SymbolTarget::Method(method) => Some(method),
			_ => None,
		}
	}
}

/// One parsed source file with resolved bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundUnit {
	/// Path relative to the source root.
	pub rel_path: PathBuf,
	pub text: String,
	/// The top-level class this file declares.
	pub main_class: ClassName,
	pub refs: Vec<SymbolRef>,
	pub decls: Vec<MemberDecl>,
}
