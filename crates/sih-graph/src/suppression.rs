//! Linter suppression records
//!
//! Suppressions are pure metadata. They are rendered under the node's
//! `Metadata.cfn_nag.rules_to_suppress` and never affect emission,
//! conditions or ordering.

use crate::node::NodeRef;
use indexmap::IndexMap;
use serde::Serialize;

/// One suppressed rule with its justification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuppressionRecord {
    /// Rule id, e.g. `W28`
    pub id: String,
    /// Why the finding does not apply
    pub reason: String,
}

/// Suppressions per node, in first-suppressed order
#[derive(Debug, Clone, Default)]
pub struct SuppressionLedger {
    records: IndexMap<NodeRef, IndexMap<String, String>>,
}

impl SuppressionLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add or replace the justification for `(node, rule)`
    pub(crate) fn record(&mut self, node: NodeRef, rule: &str, reason: &str) {
        self.records
            .entry(node)
            .or_default()
            .insert(rule.to_string(), reason.to_string());
    }

    /// Records attached to `node`
    #[must_use]
    pub fn for_node(&self, node: NodeRef) -> Vec<SuppressionRecord> {
        self.records
            .get(&node)
            .map(|rules| {
                rules
                    .iter()
                    .map(|(id, reason)| SuppressionRecord {
                        id: id.clone(),
                        reason: reason.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Template metadata for `node`, if it has any suppressions
    #[must_use]
    pub fn metadata(&self, node: NodeRef) -> Option<serde_json::Value> {
        let records = self.for_node(node);
        if records.is_empty() {
            return None;
        }
        Some(serde_json::json!({
            "cfn_nag": { "rules_to_suppress": records }
        }))
    }

    /// Total number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.values().map(IndexMap::len).sum()
    }

    /// Whether no rule is suppressed anywhere
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
