//! Error types for graph assembly
//!
//! Every builder operation returns [`BuildResult`]. Errors are structural and
//! raised synchronously by the operation that violates an invariant, so the
//! caller can halt assembly instead of emitting a malformed template.

use crate::node::NodeRef;

/// Result alias for builder operations
pub type BuildResult<T> = Result<T, BuildError>;

/// Structural assembly errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// A condition with this name is already registered
    #[error("condition already defined: {name}")]
    DuplicateCondition {
        /// Condition name
        name: String,
    },

    /// Defining the condition would close a reference cycle
    #[error("cyclic condition {name}: {}", path.join(" -> "))]
    CyclicCondition {
        /// Condition being defined
        name: String,
        /// Reference chain that returns to `name`
        path: Vec<String>,
    },

    /// A condition reference never resolved to a registered condition
    #[error("unresolved condition {name} referenced by {referenced_by}")]
    UnresolvedCondition {
        /// Missing condition name
        name: String,
        /// Condition or node holding the reference
        referenced_by: String,
    },

    /// Another live node already holds the logical id
    #[error("logical id {id} already held by a live node (requested for {requested_by})")]
    IdCollision {
        /// Contested logical id
        id: String,
        /// Current logical id of the node the caller tried to rename
        requested_by: String,
    },

    /// Logical id is empty, too long or not alphanumeric
    #[error("invalid logical id: {id:?}")]
    InvalidLogicalId {
        /// Rejected id
        id: String,
    },

    /// A property value or edge points at a tombstoned node
    #[error("{from} references removed node {to}")]
    DanglingReference {
        /// Referencing node
        from: String,
        /// Tombstoned target
        to: String,
    },

    /// Node handle does not belong to this graph
    #[error("unknown node {node}")]
    UnknownNode {
        /// Offending handle
        node: NodeRef,
    },

    /// Pattern never exposed a child by this name
    #[error("pattern {pattern} has no exposed child {child}")]
    UnknownChild {
        /// Pattern scope path
        pattern: String,
        /// Requested child name
        child: String,
    },

    /// A removed node is still the target of live edges or references
    #[error("removed node {node} is still referenced by {}", referenced_by.join(", "))]
    NodeStillReferenced {
        /// Tombstoned node
        node: String,
        /// Live nodes holding edges or references to it
        referenced_by: Vec<String>,
    },

    /// Property key is not declared for the resource kind
    #[error("{kind} ({node}) has no property {key}")]
    UnknownProperty {
        /// Resource type name
        kind: String,
        /// Node logical id
        node: String,
        /// Rejected key
        key: String,
    },

    /// Nested property path does not resolve to an object
    #[error("invalid property path {path} on {node}")]
    InvalidPropertyPath {
        /// Node logical id
        node: String,
        /// Dotted path
        path: String,
    },

    /// A node already carries a top-level condition
    #[error("{node} already has condition {existing}")]
    ConditionAlreadyAttached {
        /// Node logical id
        node: String,
        /// Condition already attached
        existing: String,
    },

    /// Adding the edge would close a dependency cycle
    #[error("dependency {from} -> {to} would create a cycle")]
    CyclicDependency {
        /// Dependent node
        from: String,
        /// Dependency
        to: String,
    },

    /// Template outputs cannot take part in dependencies or references
    #[error("output {node} cannot be depended on or referenced")]
    OutputDependency {
        /// Output logical id
        node: String,
    },

    /// A parameter with this name is already declared
    #[error("parameter already declared: {name}")]
    DuplicateParameter {
        /// Parameter name
        name: String,
    },

    /// Reference to a parameter the template never declares
    #[error("undeclared parameter {name} referenced by {referenced_by}")]
    UnknownParameter {
        /// Parameter name
        name: String,
        /// Condition or node holding the reference
        referenced_by: String,
    },

    /// The graph was already finalized
    #[error("graph already finalized")]
    AlreadyFinalized,
}

impl BuildError {
    /// Whether the error was raised by the final assembly pass rather than
    /// by an individual mutation.
    #[must_use]
    pub fn is_assembly_error(&self) -> bool {
        matches!(
            self,
            Self::NodeStillReferenced { .. }
                | Self::UnresolvedCondition { .. }
                | Self::UnknownParameter { .. }
                | Self::AlreadyFinalized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_offending_ids() {
        let err = BuildError::NodeStillReferenced {
            node: "UsagePlan".into(),
            referenced_by: vec!["Deployment".into(), "Stage".into()],
        };
        assert_eq!(
            err.to_string(),
            "removed node UsagePlan is still referenced by Deployment, Stage"
        );

        let err = BuildError::CyclicCondition {
            name: "A".into(),
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "cyclic condition A: A -> B -> A");
    }

    #[test]
    fn assembly_errors_are_classified() {
        assert!(BuildError::AlreadyFinalized.is_assembly_error());
        assert!(!BuildError::DuplicateCondition { name: "A".into() }.is_assembly_error());
    }
}
