//! Source-level symbol rewriting over an externally parsed, binding-resolved
//! AST.
//!
//! The Java frontend itself is not part of this crate: a [`Frontend`]
//! implementation (usually [`frontend::JsonFrontend`], a subprocess speaking
//! JSON) supplies [`tree::BoundUnit`]s, i.e. source text plus the spans of
//! every resolved reference and declaration. On top of that:
//! - [`remap`] renames symbol references per a mapping table and rewrites
//!   access/finality modifiers per an access transform set, optionally
//!   inferring the widenings a cross-boundary reference needs,
//! - [`params`] renames method/constructor parameters (deterministic
//!   placeholder assignment, and replay of previously chosen names),
//! - [`rewrite`] drives any set of such processors over a source root and
//!   materializes the rewritten tree in place.

pub mod edit;
pub mod frontend;
pub mod params;
pub mod remap;
pub mod rewrite;
pub mod tree;

pub use frontend::Frontend;
