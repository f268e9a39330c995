//! Declared type descriptors for static edge validation.
//!
//! These are metadata, not Rust types: every node's runtime payload is a
//! `serde_json::Value` regardless of what it declares here. A descriptor
//! only participates in [`Builder::build`](crate::builder::Builder::build)'s
//! static walk; it is never consulted at run time.

use std::fmt;

/// A node's declared input or output type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// Untyped; compatible with anything, skipped by the validator.
    Dynamic,
    /// A named type. Two named descriptors are compatible only if they are
    /// identical or `consumer` is listed among `producer`'s declared
    /// supertypes/interfaces (see [`Named::implements`]).
    Named(Named),
}

/// A named type descriptor: a primary name plus the interfaces/supertypes
/// it declares itself assignable to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Named {
    pub name: String,
    pub implements: Vec<String>,
}

impl Named {
    pub fn new(name: impl Into<String>) -> Self {
        Named {
            name: name.into(),
            implements: Vec::new(),
        }
    }

    pub fn implementing(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }
}

impl TypeDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        TypeDescriptor::Named(Named::new(name))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, TypeDescriptor::Dynamic)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Dynamic => f.write_str("dynamic/any"),
            TypeDescriptor::Named(n) => f.write_str(&n.name),
        }
    }
}

impl Default for TypeDescriptor {
    fn default() -> Self {
        TypeDescriptor::Dynamic
    }
}

impl From<&str> for TypeDescriptor {
    fn from(name: &str) -> Self {
        TypeDescriptor::named(name)
    }
}

/// Edge compatibility: dynamic endpoints always pass; otherwise identical
/// names, or the producer declaring itself an implementer of the
/// consumer's name, are compatible.
pub fn assignable(producer: &TypeDescriptor, consumer: &TypeDescriptor) -> bool {
    match (producer, consumer) {
        (TypeDescriptor::Dynamic, _) | (_, TypeDescriptor::Dynamic) => true,
        (TypeDescriptor::Named(p), TypeDescriptor::Named(c)) => {
            p.name == c.name || p.implements.iter().any(|i| i == &c.name)
        }
    }
}
