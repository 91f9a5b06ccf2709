//! Graph Builder
//!
//! The mutation interface of the engine. Every operation checks the
//! invariant it could break and fails with a typed [`BuildError`] instead of
//! recording a bad state.
//!
//! Usage:
//! ```rust,ignore
//! let mut builder = GraphBuilder::new(StackContext::default());
//! let a = builder.conditions_mut()?.equals("A", Pseudo::Region, "x")?;
//! let role = builder.create(ResourceKind::IamRole, "Role", props([...]))?;
//! builder.attach_condition(role, &a)?;
//! let template = builder.finalize()?;
//! ```

use crate::condition::{ConditionExpr, ConditionRef, ConditionRegistry};
use crate::context::StackContext;
use crate::dag::DependencyGraph;
use crate::error::{BuildError, BuildResult};
use crate::node::{NodeRef, ResourceKind, ResourceNode};
use crate::parameter::ParameterSpec;
use crate::pattern::{
    CompositePattern, PatternHandle, PatternInstance, PatternRecord, PatternScope,
};
use crate::suppression::SuppressionLedger;
use crate::value::{Properties, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) const MAX_LOGICAL_ID_LEN: usize = 255;

/// Builder for one template's resource graph
#[derive(Debug)]
pub struct GraphBuilder {
    pub(crate) context: Arc<StackContext>,
    pub(crate) description: Option<String>,
    pub(crate) conditions: ConditionRegistry,
    pub(crate) parameters: IndexMap<String, ParameterSpec>,
    pub(crate) nodes: Vec<ResourceNode>,
    /// Logical ids of live nodes
    pub(crate) ids: HashMap<String, NodeRef>,
    pub(crate) dependencies: DependencyGraph,
    pub(crate) suppressions: SuppressionLedger,
    pub(crate) patterns: Vec<PatternRecord>,
    pub(crate) finalized: bool,
}

impl GraphBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new(context: StackContext) -> Self {
        Self {
            context: Arc::new(context),
            description: None,
            conditions: ConditionRegistry::new(),
            parameters: IndexMap::new(),
            nodes: Vec::new(),
            ids: HashMap::new(),
            dependencies: DependencyGraph::new(),
            suppressions: SuppressionLedger::new(),
            patterns: Vec::new(),
            finalized: false,
        }
    }

    /// Set the template description
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Environment context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &StackContext {
        &self.context
    }

    pub(crate) fn shared_context(&self) -> Arc<StackContext> {
        Arc::clone(&self.context)
    }

    /// Whether [`finalize`](Self::finalize) has run
    #[inline]
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn ensure_open(&self) -> BuildResult<()> {
        if self.finalized {
            Err(BuildError::AlreadyFinalized)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Conditions and parameters
    // ------------------------------------------------------------------

    /// Registered conditions
    #[inline]
    #[must_use]
    pub fn conditions(&self) -> &ConditionRegistry {
        &self.conditions
    }

    /// Mutable access to the condition registry
    ///
    /// # Errors
    ///
    /// `AlreadyFinalized` once the graph has been finalized.
    pub fn conditions_mut(&mut self) -> BuildResult<&mut ConditionRegistry> {
        self.ensure_open()?;
        Ok(&mut self.conditions)
    }

    /// Shorthand for `conditions_mut()?.define(name, expr)`
    ///
    /// # Errors
    ///
    /// See [`ConditionRegistry::define`].
    pub fn define_condition(&mut self, name: &str, expr: ConditionExpr) -> BuildResult<ConditionRef> {
        self.conditions_mut()?.define(name, expr)
    }

    /// Declare a template parameter and return a reference to it
    ///
    /// # Errors
    ///
    /// `DuplicateParameter` when the name is already declared.
    pub fn declare_parameter(&mut self, spec: ParameterSpec) -> BuildResult<Value> {
        self.ensure_open()?;
        let name = spec.name().to_string();
        if self.parameters.contains_key(&name) {
            return Err(BuildError::DuplicateParameter { name });
        }
        tracing::debug!(parameter = %name, "parameter declared");
        self.parameters.insert(name.clone(), spec);
        Ok(Value::Parameter(name))
    }

    /// Declared parameters in declaration order
    pub fn parameters(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.values()
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Create a node
    ///
    /// `hint` is sanitized to alphanumerics; when the result is taken by a
    /// live node a numeric suffix is appended.
    ///
    /// # Errors
    ///
    /// `UnknownProperty` for keys the kind does not declare,
    /// `DanglingReference` for values referencing removed nodes,
    /// `OutputDependency` for values referencing outputs.
    pub fn create(
        &mut self,
        kind: ResourceKind,
        hint: &str,
        properties: Properties,
    ) -> BuildResult<NodeRef> {
        self.create_in(kind, hint, properties, None)
    }

    pub(crate) fn create_in(
        &mut self,
        kind: ResourceKind,
        hint: &str,
        properties: Properties,
        pattern: Option<PatternHandle>,
    ) -> BuildResult<NodeRef> {
        self.ensure_open()?;
        let logical_id = self.unique_id(hint, &kind);
        for (key, value) in &properties {
            check_key(&kind, &logical_id, key)?;
            self.check_value(&logical_id, value)?;
        }

        let raw = u32::try_from(self.nodes.len()).map_err(|_| BuildError::InvalidLogicalId {
            id: logical_id.clone(),
        })?;
        let node = NodeRef::new(raw);
        tracing::debug!(node = %node, logical_id = %logical_id, kind = %kind, "node created");
        self.ids.insert(logical_id.clone(), node);
        self.nodes
            .push(ResourceNode::new(logical_id, kind, properties, pattern));
        Ok(node)
    }

    fn unique_id(&self, hint: &str, kind: &ResourceKind) -> String {
        let mut base: String = hint.chars().filter(char::is_ascii_alphanumeric).collect();
        if base.is_empty() {
            base = kind.short_name().chars().filter(char::is_ascii_alphanumeric).collect();
        }
        base.truncate(MAX_LOGICAL_ID_LEN - 8);
        if !self.ids.contains_key(&base) {
            return base;
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{base}{n}");
            if !self.ids.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Node by handle
    ///
    /// # Errors
    ///
    /// `UnknownNode` when the handle belongs to another graph.
    pub fn node(&self, node: NodeRef) -> BuildResult<&ResourceNode> {
        self.nodes
            .get(node.index())
            .ok_or(BuildError::UnknownNode { node })
    }

    fn node_mut(&mut self, node: NodeRef) -> BuildResult<&mut ResourceNode> {
        self.nodes
            .get_mut(node.index())
            .ok_or(BuildError::UnknownNode { node })
    }

    /// Current logical id of a node
    ///
    /// # Errors
    ///
    /// `UnknownNode` when the handle belongs to another graph.
    pub fn logical_id(&self, node: NodeRef) -> BuildResult<&str> {
        self.node(node).map(ResourceNode::logical_id)
    }

    /// Live node holding `logical_id`
    #[must_use]
    pub fn find(&self, logical_id: &str) -> Option<NodeRef> {
        self.ids.get(logical_id).copied()
    }

    /// All nodes in creation order, tombstones included
    pub fn nodes(&self) -> impl Iterator<Item = (NodeRef, &ResourceNode)> {
        self.nodes.iter().enumerate().filter_map(|(i, n)| {
            u32::try_from(i).ok().map(|raw| (NodeRef::new(raw), n))
        })
    }

    /// Number of live nodes
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.tombstoned).count()
    }

    /// Assign an explicit logical id
    ///
    /// # Errors
    ///
    /// `InvalidLogicalId` when `id` is empty, too long or not alphanumeric;
    /// `IdCollision` when another live node already holds it.
    pub fn set_logical_id(&mut self, node: NodeRef, id: &str) -> BuildResult<()> {
        self.ensure_open()?;
        if id.is_empty()
            || id.len() > MAX_LOGICAL_ID_LEN
            || !id.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(BuildError::InvalidLogicalId { id: id.to_string() });
        }
        let current = self.node(node)?;
        let previous = current.logical_id.clone();
        let live = !current.tombstoned;

        match self.ids.get(id) {
            Some(holder) if *holder == node => return Ok(()),
            Some(_) => {
                return Err(BuildError::IdCollision {
                    id: id.to_string(),
                    requested_by: previous,
                })
            }
            None => {}
        }

        if live {
            self.ids.remove(&previous);
            self.ids.insert(id.to_string(), node);
        }
        tracing::debug!(node = %node, from = %previous, to = id, "logical id set");
        self.node_mut(node)?.logical_id = id.to_string();
        Ok(())
    }

    /// Gate a node on a condition
    ///
    /// Attaching the same condition twice is a no-op.
    ///
    /// # Errors
    ///
    /// `ConditionAlreadyAttached` when a different condition is attached.
    pub fn attach_condition(&mut self, node: NodeRef, condition: &ConditionRef) -> BuildResult<()> {
        self.ensure_open()?;
        let target = self.node_mut(node)?;
        if let Some(existing) = &target.condition {
            if existing == condition {
                return Ok(());
            }
            return Err(BuildError::ConditionAlreadyAttached {
                node: target.logical_id.clone(),
                existing: existing.name().to_string(),
            });
        }
        tracing::debug!(logical_id = %target.logical_id, condition = %condition, "condition attached");
        target.condition = Some(condition.clone());
        Ok(())
    }

    /// Replace whatever condition a node carries
    ///
    /// # Errors
    ///
    /// `UnknownNode` or `AlreadyFinalized`.
    pub fn override_condition(&mut self, node: NodeRef, condition: &ConditionRef) -> BuildResult<()> {
        self.ensure_open()?;
        let target = self.node_mut(node)?;
        tracing::debug!(logical_id = %target.logical_id, condition = %condition, "condition overridden");
        target.condition = Some(condition.clone());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Replace one property
    ///
    /// # Errors
    ///
    /// `UnknownProperty`, `DanglingReference`, `OutputDependency`.
    pub fn set_property(&mut self, node: NodeRef, key: &str, value: Value) -> BuildResult<()> {
        self.ensure_open()?;
        let target = self.node(node)?;
        check_key(&target.kind, &target.logical_id, key)?;
        self.check_value(&target.logical_id, &value)?;
        self.node_mut(node)?.properties.insert(key.to_string(), value);
        Ok(())
    }

    /// Shallow-merge `properties` into the node's bag
    ///
    /// All keys and values are checked before anything is written.
    ///
    /// # Errors
    ///
    /// `UnknownProperty`, `DanglingReference`, `OutputDependency`.
    pub fn merge_properties(&mut self, node: NodeRef, properties: Properties) -> BuildResult<()> {
        self.ensure_open()?;
        self.write_properties(node, properties, "properties merged")
    }

    /// Replace the given keys of an existing node, typically one created by
    /// a pattern
    ///
    /// # Errors
    ///
    /// `UnknownProperty` for keys the kind does not declare; the bag is
    /// never widened with undeclared keys.
    pub fn override_properties(&mut self, node: NodeRef, properties: Properties) -> BuildResult<()> {
        self.ensure_open()?;
        self.write_properties(node, properties, "properties overridden")
    }

    fn write_properties(
        &mut self,
        node: NodeRef,
        properties: Properties,
        action: &'static str,
    ) -> BuildResult<()> {
        let target = self.node(node)?;
        for (key, value) in &properties {
            check_key(&target.kind, &target.logical_id, key)?;
            self.check_value(&target.logical_id, value)?;
        }
        let target = self.node_mut(node)?;
        tracing::debug!(
            logical_id = %target.logical_id,
            keys = ?properties.keys().collect::<Vec<_>>(),
            "{action}"
        );
        target.properties.extend(properties);
        Ok(())
    }

    /// Set a nested property by dotted path, e.g.
    /// `DistributionConfig.DefaultCacheBehavior.CachePolicyId`
    ///
    /// Missing intermediate objects are created.
    ///
    /// # Errors
    ///
    /// `UnknownProperty` when the top-level key is undeclared,
    /// `InvalidPropertyPath` when an intermediate value is not an object.
    pub fn override_at(&mut self, node: NodeRef, path: &str, value: Value) -> BuildResult<()> {
        self.ensure_open()?;
        let target = self.node(node)?;
        let (top, rest) = split_path(path);
        check_key(&target.kind, &target.logical_id, top)?;
        self.check_value(&target.logical_id, &value)?;

        let target = self.node_mut(node)?;
        let Some(rest) = rest else {
            target.properties.insert(top.to_string(), value);
            return Ok(());
        };
        let err = BuildError::InvalidPropertyPath {
            node: target.logical_id.clone(),
            path: path.to_string(),
        };

        let mut cursor = target
            .properties
            .entry(top.to_string())
            .or_insert_with(|| Value::Map(IndexMap::new()));
        let segments: Vec<&str> = rest.split('.').collect();
        let (last, parents) = segments.split_last().ok_or_else(|| err.clone())?;
        for segment in parents {
            let map = as_map_mut(cursor).ok_or_else(|| err.clone())?;
            cursor = map
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Map(IndexMap::new()));
        }
        as_map_mut(cursor)
            .ok_or(err)?
            .insert((*last).to_string(), value);
        Ok(())
    }

    /// Delete a top-level property
    ///
    /// # Errors
    ///
    /// `UnknownProperty` when the key is undeclared for the kind.
    pub fn remove_property(&mut self, node: NodeRef, key: &str) -> BuildResult<Option<Value>> {
        self.ensure_open()?;
        let target = self.node_mut(node)?;
        check_key(&target.kind, &target.logical_id, key)?;
        tracing::debug!(logical_id = %target.logical_id, key, "property removed");
        Ok(target.properties.shift_remove(key))
    }

    /// Delete a nested property by dotted path
    ///
    /// Returns `None` when nothing is stored at the path.
    ///
    /// # Errors
    ///
    /// `UnknownProperty` when the top-level key is undeclared,
    /// `InvalidPropertyPath` when an intermediate value is not an object.
    pub fn remove_property_at(&mut self, node: NodeRef, path: &str) -> BuildResult<Option<Value>> {
        let (top, rest) = split_path(path);
        let Some(rest) = rest else {
            return self.remove_property(node, top);
        };
        self.ensure_open()?;
        let target = self.node_mut(node)?;
        check_key(&target.kind, &target.logical_id, top)?;
        let err = BuildError::InvalidPropertyPath {
            node: target.logical_id.clone(),
            path: path.to_string(),
        };
        tracing::debug!(logical_id = %target.logical_id, path, "nested property removed");

        let Some(mut cursor) = target.properties.get_mut(top) else {
            return Ok(None);
        };
        let segments: Vec<&str> = rest.split('.').collect();
        let (last, parents) = segments.split_last().ok_or_else(|| err.clone())?;
        for segment in parents {
            let map = as_map_mut(cursor).ok_or_else(|| err.clone())?;
            match map.get_mut(*segment) {
                Some(next) => cursor = next,
                None => return Ok(None),
            }
        }
        Ok(as_map_mut(cursor).ok_or(err)?.shift_remove(*last))
    }

    /// Reject references to unknown, removed or output nodes
    fn check_value(&self, owner: &str, value: &Value) -> BuildResult<()> {
        for referenced in value.node_refs() {
            let target = self.node(referenced)?;
            if target.tombstoned {
                return Err(BuildError::DanglingReference {
                    from: owner.to_string(),
                    to: target.logical_id.clone(),
                });
            }
            if target.kind.is_output() {
                return Err(BuildError::OutputDependency {
                    node: target.logical_id.clone(),
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dependencies and suppressions
    // ------------------------------------------------------------------

    /// Require `from` to be realized after `to`
    ///
    /// # Errors
    ///
    /// `CyclicDependency` when `to` already depends on `from` (self-edges
    /// included), `DanglingReference` when either end was removed,
    /// `OutputDependency` when either end is an output.
    pub fn add_dependency(&mut self, from: NodeRef, to: NodeRef) -> BuildResult<()> {
        self.ensure_open()?;
        let source = self.node(from)?;
        let target = self.node(to)?;
        for end in [source, target] {
            if end.kind.is_output() {
                return Err(BuildError::OutputDependency {
                    node: end.logical_id.clone(),
                });
            }
        }
        if source.tombstoned || target.tombstoned {
            return Err(BuildError::DanglingReference {
                from: source.logical_id.clone(),
                to: target.logical_id.clone(),
            });
        }
        if self.dependencies.would_cycle(from, to) {
            return Err(BuildError::CyclicDependency {
                from: source.logical_id.clone(),
                to: target.logical_id.clone(),
            });
        }
        tracing::debug!(from = %source.logical_id, to = %target.logical_id, "dependency added");
        self.dependencies.insert(from, to);
        Ok(())
    }

    /// Explicit dependency edges
    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    /// Attach a linter suppression; the last justification per rule wins
    ///
    /// # Errors
    ///
    /// `UnknownNode` or `AlreadyFinalized`.
    pub fn suppress(&mut self, node: NodeRef, rule: &str, reason: &str) -> BuildResult<()> {
        self.ensure_open()?;
        let target = self.node(node)?;
        tracing::debug!(logical_id = %target.logical_id, rule, "rule suppressed");
        self.suppressions.record(node, rule, reason);
        Ok(())
    }

    /// Recorded suppressions
    #[inline]
    #[must_use]
    pub fn suppressions(&self) -> &SuppressionLedger {
        &self.suppressions
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    /// Instantiate a composite pattern under `scope_id`
    ///
    /// Reusing a scope id gives the second instance a numbered path, so its
    /// children get distinct logical ids.
    ///
    /// # Errors
    ///
    /// Whatever the pattern's build raises.
    pub fn instantiate<P: CompositePattern>(
        &mut self,
        pattern: &P,
        scope_id: &str,
        inputs: &P::Inputs,
    ) -> BuildResult<PatternInstance> {
        self.instantiate_at(pattern, scope_id, scope_id.to_string(), inputs)
    }

    pub(crate) fn instantiate_at<P: CompositePattern>(
        &mut self,
        pattern: &P,
        scope_id: &str,
        path: String,
        inputs: &P::Inputs,
    ) -> BuildResult<PatternInstance> {
        self.ensure_open()?;
        let taken = |candidate: &str| self.patterns.iter().any(|p| p.path == candidate);
        let path = if taken(&path) {
            let mut n = 2u32;
            loop {
                let candidate = format!("{path}{n}");
                if !taken(&candidate) {
                    break candidate;
                }
                n += 1;
            }
        } else {
            path
        };
        let raw = u32::try_from(self.patterns.len()).map_err(|_| BuildError::UnknownChild {
            pattern: path.clone(),
            child: String::new(),
        })?;
        let handle = PatternHandle::new(raw);
        self.patterns.push(PatternRecord {
            kind: pattern.kind(),
            scope_id: scope_id.to_string(),
            path: path.clone(),
            exposed: IndexMap::new(),
        });

        tracing::debug!(pattern = pattern.kind(), path = %path, "instantiating pattern");
        let mut scope = PatternScope::new(self, handle, path);
        pattern.build(&mut scope, inputs)?;

        let record = &self.patterns[handle.index()];
        tracing::debug!(
            pattern = record.kind,
            path = %record.path,
            exposed = record.exposed.len(),
            "pattern instantiated"
        );
        Ok(PatternInstance::from_record(handle, record))
    }

    pub(crate) fn expose(&mut self, handle: PatternHandle, name: &str, node: NodeRef) {
        if let Some(record) = self.patterns.get_mut(handle.index()) {
            record.exposed.insert(name.to_string(), node);
        }
    }

    /// Tombstone the exposed child `child` of a pattern instance
    ///
    /// Children exposed as `child/<name>` go with it. Removing an already
    /// removed child is a no-op. Whether anything still references the
    /// removed nodes is checked by [`finalize`](Self::finalize).
    ///
    /// # Errors
    ///
    /// `UnknownChild` when the instance never exposed `child`.
    pub fn remove(&mut self, handle: PatternHandle, child: &str) -> BuildResult<()> {
        self.ensure_open()?;
        let record = self
            .patterns
            .get(handle.index())
            .ok_or_else(|| BuildError::UnknownChild {
                pattern: handle.to_string(),
                child: child.to_string(),
            })?;
        if !record.exposed.contains_key(child) {
            return Err(BuildError::UnknownChild {
                pattern: record.path.clone(),
                child: child.to_string(),
            });
        }

        let prefix = format!("{child}/");
        let doomed: Vec<NodeRef> = record
            .exposed
            .iter()
            .filter(|(name, _)| name.as_str() == child || name.starts_with(&prefix))
            .map(|(_, node)| *node)
            .collect();
        let path = record.path.clone();

        for node in doomed {
            let target = self.node_mut(node)?;
            if target.tombstoned {
                continue;
            }
            target.tombstoned = true;
            let id = target.logical_id.clone();
            tracing::debug!(pattern = %path, logical_id = %id, "pattern child removed");
            if self.ids.get(&id) == Some(&node) {
                self.ids.remove(&id);
            }
        }
        Ok(())
    }

    /// Current name table of an instance
    ///
    /// # Errors
    ///
    /// `UnknownChild` when the handle belongs to another graph.
    pub fn pattern(&self, handle: PatternHandle) -> BuildResult<PatternInstance> {
        self.patterns
            .get(handle.index())
            .map(|record| PatternInstance::from_record(handle, record))
            .ok_or_else(|| BuildError::UnknownChild {
                pattern: handle.to_string(),
                child: String::new(),
            })
    }
}

fn check_key(kind: &ResourceKind, logical_id: &str, key: &str) -> BuildResult<()> {
    if kind.declares(key) {
        Ok(())
    } else {
        Err(BuildError::UnknownProperty {
            kind: kind.type_name().to_string(),
            node: logical_id.to_string(),
            key: key.to_string(),
        })
    }
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((top, rest)) => (top, Some(rest)),
        None => (path, None),
    }
}

/// View a value as an object, converting a literal JSON object in place
fn as_map_mut(value: &mut Value) -> Option<&mut IndexMap<String, Value>> {
    if let Value::Literal(serde_json::Value::Object(obj)) = value {
        let converted = std::mem::take(obj)
            .into_iter()
            .map(|(k, v)| (k, Value::Literal(v)))
            .collect();
        *value = Value::Map(converted);
    }
    match value {
        Value::Map(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::props;
    use pretty_assertions::assert_eq;

    fn builder() -> GraphBuilder {
        GraphBuilder::new(StackContext::default())
    }

    #[test]
    fn hints_are_sanitized_and_deduplicated() {
        let mut b = builder();
        let a = b.create(ResourceKind::Bucket, "Logs-Bucket", props([])).unwrap();
        let c = b.create(ResourceKind::Bucket, "LogsBucket", props([])).unwrap();
        let d = b.create(ResourceKind::Bucket, "", props([])).unwrap();
        assert_eq!(b.logical_id(a).unwrap(), "LogsBucket");
        assert_eq!(b.logical_id(c).unwrap(), "LogsBucket2");
        assert_eq!(b.logical_id(d).unwrap(), "Bucket");
    }

    #[test]
    fn set_logical_id_rejects_collisions() {
        let mut b = builder();
        let a = b.create(ResourceKind::IamRole, "A", props([])).unwrap();
        let c = b.create(ResourceKind::IamRole, "B", props([])).unwrap();
        let err = b.set_logical_id(c, "A").unwrap_err();
        assert_eq!(
            err,
            BuildError::IdCollision {
                id: "A".into(),
                requested_by: "B".into()
            }
        );
        b.set_logical_id(a, "Renamed").unwrap();
        b.set_logical_id(c, "A").unwrap();
        assert_eq!(b.find("A"), Some(c));
        assert_eq!(b.find("B"), None);
        assert!(matches!(
            b.set_logical_id(c, "bad id"),
            Err(BuildError::InvalidLogicalId { .. })
        ));
    }

    #[test]
    fn one_condition_per_node() {
        let mut b = builder();
        let x = b.conditions_mut().unwrap().equals("X", "a", "a").unwrap();
        let y = b.conditions_mut().unwrap().negate("Y", &x).unwrap();
        let n = b.create(ResourceKind::Bucket, "N", props([])).unwrap();
        b.attach_condition(n, &x).unwrap();
        b.attach_condition(n, &x).unwrap();
        assert!(matches!(
            b.attach_condition(n, &y),
            Err(BuildError::ConditionAlreadyAttached { .. })
        ));
        b.override_condition(n, &y).unwrap();
        assert_eq!(b.node(n).unwrap().condition(), Some(&y));
    }

    #[test]
    fn unknown_keys_never_widen_the_bag() {
        let mut b = builder();
        let f = b
            .create(ResourceKind::LambdaFunction, "Fn", props([("MemorySize", 512u32.into())]))
            .unwrap();
        let err = b
            .override_properties(f, props([("Timeout", 30u32.into()), ("MemroySize", 1024u32.into())]))
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownProperty { ref key, .. } if key == "MemroySize"));
        // nothing was written
        assert_eq!(b.node(f).unwrap().property("Timeout"), None);
        assert_eq!(b.node(f).unwrap().properties().len(), 1);
    }

    #[test]
    fn nested_overrides() {
        let mut b = builder();
        let d = b
            .create(
                ResourceKind::Distribution,
                "Dist",
                props([(
                    "DistributionConfig",
                    serde_json::json!({ "Enabled": true, "Logging": { "Bucket": "b" } }).into(),
                )]),
            )
            .unwrap();
        b.override_at(d, "DistributionConfig.DefaultCacheBehavior.CachePolicyId", "p".into())
            .unwrap();
        let removed = b.remove_property_at(d, "DistributionConfig.Logging").unwrap();
        assert!(removed.is_some());
        assert_eq!(b.remove_property_at(d, "DistributionConfig.Missing.X").unwrap(), None);
        assert!(matches!(
            b.override_at(d, "DistributionConfig.Enabled.Deep", "x".into()),
            Err(BuildError::InvalidPropertyPath { .. })
        ));

        let rendered = b.node(d).unwrap().property("DistributionConfig").unwrap().to_json(&|n| n.to_string());
        assert_eq!(
            rendered,
            serde_json::json!({
                "Enabled": true,
                "DefaultCacheBehavior": { "CachePolicyId": "p" }
            })
        );
    }

    #[test]
    fn dependencies_reject_cycles_and_outputs() {
        let mut b = builder();
        let a = b.create(ResourceKind::IamRole, "A", props([])).unwrap();
        let c = b.create(ResourceKind::IamRole, "C", props([])).unwrap();
        let o = b.create(ResourceKind::Output, "Out", props([("Value", Value::Ref(a))])).unwrap();
        b.add_dependency(a, c).unwrap();
        assert!(matches!(b.add_dependency(c, a), Err(BuildError::CyclicDependency { .. })));
        assert!(matches!(b.add_dependency(a, a), Err(BuildError::CyclicDependency { .. })));
        assert!(matches!(b.add_dependency(o, a), Err(BuildError::OutputDependency { .. })));
        assert!(matches!(
            b.set_property(a, "Description", Value::Ref(o)),
            Err(BuildError::OutputDependency { .. })
        ));
    }

    #[test]
    fn parameters_are_declared_once() {
        let mut b = builder();
        let v = b.declare_parameter(ParameterSpec::string("P")).unwrap();
        assert_eq!(v, Value::param("P"));
        assert_eq!(
            b.declare_parameter(ParameterSpec::number("P")).unwrap_err(),
            BuildError::DuplicateParameter { name: "P".into() }
        );
    }
}
