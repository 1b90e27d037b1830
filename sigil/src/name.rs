//! Names of classes and members.
//!
//! Class names are stored in JVM internal form, i.e. with slashes and with
//! `$` separating inner classes: `net/example/Foo$Bar`. The access transform
//! format uses binary names (dots) instead, see [`ClassName::from_binary`]
//! and [`ClassName::as_binary`].

use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

/// A class name in JVM internal form, like `net/example/Foo$Bar`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
	pub fn new(name: impl Into<String>) -> ClassName {
		ClassName(name.into())
	}

	/// Parses a binary name (dots) into the internal form (slashes).
	pub fn from_binary(name: &str) -> ClassName {
		ClassName(name.replace('.', "/"))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The binary name, with dots instead of slashes.
	///
	/// Inner class separators (`$`) are kept as-is.
	pub fn as_binary(&self) -> String {
		self.0.replace('/', ".")
	}

	/// The path of the source file declaring this class, relative to a source
	/// root.
	///
	/// Inner classes live in the file of their outermost enclosing class:
	/// `a/b/Foo$Bar` is declared in `a/b/Foo.java`.
	pub fn source_path(&self) -> PathBuf {
		let outer = match self.0.split_once('$') {
			Some((outer, _)) => outer,
			None => &self.0,
		};
		PathBuf::from(format!("{outer}.java"))
	}

	/// The unqualified name, without package and without enclosing classes.
	pub fn simple_name(&self) -> &str {
		let after_package = self.0.rsplit('/').next().unwrap_or(&self.0);
		after_package.rsplit('$').next().unwrap_or(after_package)
	}
}

impl From<&str> for ClassName {
	fn from(value: &str) -> ClassName {
		ClassName::new(value)
	}
}

impl Debug for ClassName {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self.0)
	}
}

impl Display for ClassName {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A field or method name paired with its descriptor, identifying a member
/// within its declaring class.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberKey {
	pub name: String,
	pub desc: String,
}

impl MemberKey {
	pub fn new(name: impl Into<String>, desc: impl Into<String>) -> MemberKey {
		MemberKey { name: name.into(), desc: desc.into() }
	}
}

/// A reference to a field: declaring class, name and descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
	pub class: ClassName,
	pub name: String,
	pub desc: String,
}

/// A reference to a method: declaring class, name and descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
	pub class: ClassName,
	pub name: String,
	pub desc: String,
}

impl MethodRef {
	/// Whether this refers to a constructor.
	pub fn is_ctor(&self) -> bool {
		self.name == "<init>"
	}

	pub fn member_key(&self) -> MemberKey {
		MemberKey::new(self.name.clone(), self.desc.clone())
	}
}

impl FieldRef {
	pub fn member_key(&self) -> MemberKey {
		MemberKey::new(self.name.clone(), self.desc.clone())
	}
}

#[cfg(test)]
mod tests {
	use std::path::Path;
	use super::ClassName;

	#[test]
	fn source_path_of_inner_class() {
		let name = ClassName::new("net/example/Foo$Bar$Baz");
		assert_eq!(name.source_path(), Path::new("net/example/Foo.java"));
		assert_eq!(name.simple_name(), "Baz");
	}

	#[test]
	fn binary_round_trip() {
		let name = ClassName::from_binary("net.example.Foo$Bar");
		assert_eq!(name.as_str(), "net/example/Foo$Bar");
		assert_eq!(name.as_binary(), "net.example.Foo$Bar");
	}
}
