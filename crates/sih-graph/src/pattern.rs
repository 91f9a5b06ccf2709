//! Composite patterns
//!
//! A composite pattern is a reusable sub-graph. Instantiating one creates
//! its nodes directly in the importing graph, which owns them from then on.
//! What the caller gets back is a [`PatternInstance`]: a handle plus the
//! name table of the children the pattern chose to expose. That table is the
//! only way to reach a pattern's internals for pruning or overriding.
//!
//! Child logical ids are derived from the scope path and a short digest of
//! it, so identical inputs always produce the same sub-graph.

use crate::builder::{GraphBuilder, MAX_LOGICAL_ID_LEN};
use crate::condition::ConditionRef;
use crate::context::StackContext;
use crate::error::{BuildError, BuildResult};
use crate::node::{NodeRef, ResourceKind};
use crate::value::{Properties, Value};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Identifies one instantiation of a pattern within a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternHandle(u32);

impl PatternHandle {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PatternHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pattern#{}", self.0)
    }
}

/// A reusable sub-graph
pub trait CompositePattern {
    /// Inputs the pattern is parameterized by
    type Inputs;

    /// Pattern kind, used in logs
    fn kind(&self) -> &'static str;

    /// Create the pattern's nodes through `scope`
    ///
    /// # Errors
    ///
    /// Any builder error raised while creating or wiring children.
    fn build(&self, scope: &mut PatternScope<'_>, inputs: &Self::Inputs) -> BuildResult<()>;
}

/// Bookkeeping the builder keeps per instantiation
#[derive(Debug, Clone)]
pub(crate) struct PatternRecord {
    pub(crate) kind: &'static str,
    pub(crate) scope_id: String,
    pub(crate) path: String,
    pub(crate) exposed: IndexMap<String, NodeRef>,
}

/// Result of instantiating a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternInstance {
    handle: PatternHandle,
    kind: &'static str,
    scope_id: String,
    path: String,
    exposed: IndexMap<String, NodeRef>,
}

impl PatternInstance {
    pub(crate) fn from_record(handle: PatternHandle, record: &PatternRecord) -> Self {
        Self {
            handle,
            kind: record.kind,
            scope_id: record.scope_id.clone(),
            path: record.path.clone(),
            exposed: record.exposed.clone(),
        }
    }

    /// Handle for [`GraphBuilder::remove`]
    #[inline]
    #[must_use]
    pub fn handle(&self) -> PatternHandle {
        self.handle
    }

    /// [`CompositePattern::kind`] of the pattern
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Scope id within the parent scope
    #[inline]
    #[must_use]
    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    /// Full scope path, `/`-separated for nested patterns
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Exposed child by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<NodeRef> {
        self.exposed.get(name).copied()
    }

    /// Exposed child by name
    ///
    /// # Errors
    ///
    /// `UnknownChild` when the pattern never exposed `name`.
    pub fn node(&self, name: &str) -> BuildResult<NodeRef> {
        self.get(name).ok_or_else(|| BuildError::UnknownChild {
            pattern: self.path.clone(),
            child: name.to_string(),
        })
    }

    /// Exposed names in exposure order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exposed.keys().map(String::as_str)
    }

    /// Number of exposed children
    #[must_use]
    pub fn len(&self) -> usize {
        self.exposed.len()
    }

    /// Whether nothing was exposed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exposed.is_empty()
    }
}

/// Builder view handed to [`CompositePattern::build`]
pub struct PatternScope<'a> {
    builder: &'a mut GraphBuilder,
    handle: PatternHandle,
    path: String,
}

impl<'a> PatternScope<'a> {
    pub(crate) fn new(builder: &'a mut GraphBuilder, handle: PatternHandle, path: String) -> Self {
        Self {
            builder,
            handle,
            path,
        }
    }

    /// Environment context
    #[must_use]
    pub fn context(&self) -> Arc<StackContext> {
        self.builder.shared_context()
    }

    /// Full path of this scope
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Create a child node named `name` within this scope
    ///
    /// # Errors
    ///
    /// Same as [`GraphBuilder::create`].
    pub fn create(
        &mut self,
        kind: ResourceKind,
        name: &str,
        properties: Properties,
    ) -> BuildResult<NodeRef> {
        let hint = child_logical_id(&self.path, name);
        self.builder
            .create_in(kind, &hint, properties, Some(self.handle))
    }

    /// Create a child node and expose it under `name`
    ///
    /// # Errors
    ///
    /// Same as [`GraphBuilder::create`].
    pub fn create_exposed(
        &mut self,
        kind: ResourceKind,
        name: &str,
        properties: Properties,
    ) -> BuildResult<NodeRef> {
        let node = self.create(kind, name, properties)?;
        self.expose(name, node);
        Ok(node)
    }

    /// Make `node` reachable by `name` through the instance
    pub fn expose(&mut self, name: &str, node: NodeRef) {
        self.builder.expose(self.handle, name, node);
    }

    /// Re-expose every child of a nested instance as `<scope id>/<name>`
    pub fn expose_nested(&mut self, nested: &PatternInstance) {
        for (name, node) in &nested.exposed {
            self.expose(&format!("{}/{name}", nested.scope_id), *node);
        }
    }

    /// Instantiate another pattern below this scope
    ///
    /// # Errors
    ///
    /// Whatever the nested pattern's build raises.
    pub fn instantiate<P: CompositePattern>(
        &mut self,
        pattern: &P,
        scope_id: &str,
        inputs: &P::Inputs,
    ) -> BuildResult<PatternInstance> {
        let path = format!("{}/{scope_id}", self.path);
        self.builder.instantiate_at(pattern, scope_id, path, inputs)
    }

    /// See [`GraphBuilder::add_dependency`]
    ///
    /// # Errors
    ///
    /// Same as [`GraphBuilder::add_dependency`].
    pub fn add_dependency(&mut self, from: NodeRef, to: NodeRef) -> BuildResult<()> {
        self.builder.add_dependency(from, to)
    }

    /// See [`GraphBuilder::set_property`]
    ///
    /// # Errors
    ///
    /// Same as [`GraphBuilder::set_property`].
    pub fn set_property(&mut self, node: NodeRef, key: &str, value: Value) -> BuildResult<()> {
        self.builder.set_property(node, key, value)
    }

    /// See [`GraphBuilder::attach_condition`]
    ///
    /// # Errors
    ///
    /// Same as [`GraphBuilder::attach_condition`].
    pub fn attach_condition(&mut self, node: NodeRef, condition: &ConditionRef) -> BuildResult<()> {
        self.builder.attach_condition(node, condition)
    }

    /// See [`GraphBuilder::suppress`]
    ///
    /// # Errors
    ///
    /// Same as [`GraphBuilder::suppress`].
    pub fn suppress(&mut self, node: NodeRef, rule: &str, reason: &str) -> BuildResult<()> {
        self.builder.suppress(node, rule, reason)
    }
}

/// Logical id for child `name` of the scope at `path`
pub(crate) fn child_logical_id(path: &str, name: &str) -> String {
    let full = format!("{path}/{name}");
    let mut readable: String = full.chars().filter(char::is_ascii_alphanumeric).collect();
    // room for the hash and for the builder's numeric suffix
    readable.truncate(MAX_LOGICAL_ID_LEN - 16);
    let digest = Sha256::digest(full.as_bytes());
    let suffix = hex::encode_upper(&digest[..4]);
    format!("{readable}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_paths_keep_the_whole_hash() {
        let path = "Scope".repeat(80);
        let id = child_logical_id(&path, "Bucket");
        let digest = Sha256::digest(format!("{path}/Bucket").as_bytes());
        assert!(id.ends_with(&hex::encode_upper(&digest[..4])));
        // the builder keeps ids up to this length intact
        assert_eq!(id.len(), MAX_LOGICAL_ID_LEN - 8);
    }

    #[test]
    fn child_ids_are_deterministic_and_distinct() {
        let a = child_logical_id("Front", "RestApi");
        let b = child_logical_id("Front", "RestApi");
        let c = child_logical_id("Front2", "RestApi");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("FrontRestApi"));
        assert_eq!(a.len(), "FrontRestApi".len() + 8);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn slash_and_dot_do_not_collide() {
        // "A/B.c" and "A/Bc" sanitize alike but hash apart
        assert_ne!(child_logical_id("A", "B.c"), child_logical_id("A", "Bc"));
    }
}
