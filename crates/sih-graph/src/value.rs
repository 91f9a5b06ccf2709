//! Property values
//!
//! A [`Value`] is either a literal JSON value or a structure that the template
//! renderer resolves after all logical ids are final: node references,
//! attribute lookups, parameter and pseudo-parameter references, string joins
//! and deferred condition choices.

use crate::condition::ConditionRef;
use crate::node::NodeRef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Ordered property bag of a resource node
pub type Properties = IndexMap<String, Value>;

/// Build a property bag from literal entries
#[must_use]
pub fn props<const N: usize>(entries: [(&str, Value); N]) -> Properties {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Values supplied by the deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pseudo {
    /// `AWS::AccountId`
    AccountId,
    /// `AWS::Partition`
    Partition,
    /// `AWS::Region`
    Region,
    /// `AWS::StackName`
    StackName,
    /// `AWS::URLSuffix`
    UrlSuffix,
}

impl Pseudo {
    /// Template name of the pseudo parameter
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccountId => "AWS::AccountId",
            Self::Partition => "AWS::Partition",
            Self::Region => "AWS::Region",
            Self::StackName => "AWS::StackName",
            Self::UrlSuffix => "AWS::URLSuffix",
        }
    }
}

impl fmt::Display for Pseudo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A property value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Constant JSON
    Literal(serde_json::Value),
    /// List that may contain references
    List(Vec<Value>),
    /// Object that may contain references
    Map(IndexMap<String, Value>),
    /// The id a node was assigned (`Ref`)
    Ref(NodeRef),
    /// A named attribute of a node (`Fn::GetAtt`)
    GetAtt(NodeRef, String),
    /// A template parameter
    Parameter(String),
    /// A deployment pseudo parameter
    Pseudo(Pseudo),
    /// String concatenation (`Fn::Join` with an empty delimiter)
    Join(Vec<Value>),
    /// Deferred choice between two values (`Fn::If`)
    If(ConditionRef, Box<Value>, Box<Value>),
    /// Removes the enclosing property when chosen (`AWS::NoValue`)
    NoValue,
}

impl Value {
    /// Object value from entries
    #[must_use]
    pub fn map<K: Into<String>, I: IntoIterator<Item = (K, Value)>>(entries: I) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// List value
    #[must_use]
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// List of string literals
    #[must_use]
    pub fn strings<I: IntoIterator<Item = S>, S: Into<String>>(items: I) -> Self {
        Self::List(items.into_iter().map(|s| Value::from(s.into())).collect())
    }

    /// Attribute of a node
    #[must_use]
    pub fn get_att(node: NodeRef, attribute: &str) -> Self {
        Self::GetAtt(node, attribute.to_string())
    }

    /// Parameter reference
    #[must_use]
    pub fn param(name: &str) -> Self {
        Self::Parameter(name.to_string())
    }

    /// String concatenation. Adjacent literal strings are merged and a join of
    /// only literals collapses to a single literal.
    #[must_use]
    pub fn join<I: IntoIterator<Item = Value>>(parts: I) -> Self {
        let mut merged: Vec<Value> = Vec::new();
        for part in parts {
            match (merged.last_mut(), part) {
                (
                    Some(Value::Literal(serde_json::Value::String(prev))),
                    Value::Literal(serde_json::Value::String(next)),
                ) => prev.push_str(&next),
                (_, part) => merged.push(part),
            }
        }
        match merged.len() {
            0 => Value::from(""),
            1 if matches!(merged[0], Value::Literal(_)) => merged.remove(0),
            _ => Value::Join(merged),
        }
    }

    /// Deferred choice resolved by the provisioning engine
    #[must_use]
    pub fn when(condition: &ConditionRef, then: Value, otherwise: Value) -> Self {
        Self::If(condition.clone(), Box::new(then), Box::new(otherwise))
    }

    /// Whether the value contains no references of any kind
    #[must_use]
    pub fn is_literal(&self) -> bool {
        match self {
            Self::Literal(_) => true,
            Self::List(items) => items.iter().all(Value::is_literal),
            Self::Map(entries) => entries.values().all(Value::is_literal),
            _ => false,
        }
    }

    /// Nodes referenced anywhere in the value, in first-seen order
    #[must_use]
    pub fn node_refs(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        self.visit(&mut |v| match v {
            Value::Ref(n) | Value::GetAtt(n, _) => {
                if !out.contains(n) {
                    out.push(*n);
                }
            }
            _ => {}
        });
        out
    }

    /// Parameter names referenced anywhere in the value
    #[must_use]
    pub fn parameter_refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.visit(&mut |v| {
            if let Value::Parameter(name) = v {
                out.push(name.as_str());
            }
        });
        out
    }

    /// Condition names referenced by deferred choices
    #[must_use]
    pub fn condition_refs(&self) -> Vec<&ConditionRef> {
        let mut out = Vec::new();
        self.visit(&mut |v| {
            if let Value::If(cond, _, _) = v {
                out.push(cond);
            }
        });
        out
    }

    fn visit<'a, F: FnMut(&'a Value)>(&'a self, f: &mut F) {
        f(self);
        match self {
            Self::List(items) | Self::Join(items) => items.iter().for_each(|v| v.visit(f)),
            Self::Map(entries) => entries.values().for_each(|v| v.visit(f)),
            Self::If(_, a, b) => {
                a.visit(f);
                b.visit(f);
            }
            _ => {}
        }
    }

    /// Render to template JSON, resolving node handles through `logical_id`
    pub fn to_json<F>(&self, logical_id: &F) -> serde_json::Value
    where
        F: Fn(NodeRef) -> String,
    {
        match self {
            Self::Literal(v) => v.clone(),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json(logical_id)).collect())
            }
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json(logical_id)))
                    .collect(),
            ),
            Self::Ref(node) => json!({ "Ref": logical_id(*node) }),
            Self::GetAtt(node, attr) => json!({ "Fn::GetAtt": [logical_id(*node), attr] }),
            Self::Parameter(name) => json!({ "Ref": name }),
            Self::Pseudo(p) => json!({ "Ref": p.as_str() }),
            Self::Join(parts) => {
                let parts: Vec<_> = parts.iter().map(|v| v.to_json(logical_id)).collect();
                json!({ "Fn::Join": ["", parts] })
            }
            Self::If(cond, a, b) => json!({
                "Fn::If": [cond.name(), a.to_json(logical_id), b.to_json(logical_id)]
            }),
            Self::NoValue => json!({ "Ref": "AWS::NoValue" }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Literal(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Literal(serde_json::Value::String(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Literal(serde_json::Value::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Literal(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Literal(n.into())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Literal(v)
    }
}

impl From<NodeRef> for Value {
    fn from(node: NodeRef) -> Self {
        Self::Ref(node)
    }
}

impl From<Pseudo> for Value {
    fn from(p: Pseudo) -> Self {
        Self::Pseudo(p)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(node: NodeRef) -> String {
        format!("Node{}", node.index())
    }

    #[test]
    fn join_merges_adjacent_literals() {
        let v = Value::join(["arn:".into(), Pseudo::Partition.into(), ":s3:::".into(), "*".into()]);
        assert_eq!(
            v,
            Value::Join(vec!["arn:".into(), Pseudo::Partition.into(), ":s3:::*".into()])
        );
        assert_eq!(Value::join(["a".into(), "b".into()]), Value::from("ab"));
        assert_eq!(Value::join([]), Value::from(""));
    }

    #[test]
    fn renders_intrinsics() {
        let n = NodeRef::new(3);
        let v = Value::map([
            ("Name", Value::Ref(n)),
            ("Arn", Value::get_att(n, "Arn")),
            ("Region", Pseudo::Region.into()),
            ("Retention", Value::param("LogRetentionPeriod")),
            ("Skip", Value::NoValue),
        ]);
        assert_eq!(
            v.to_json(&id),
            json!({
                "Name": { "Ref": "Node3" },
                "Arn": { "Fn::GetAtt": ["Node3", "Arn"] },
                "Region": { "Ref": "AWS::Region" },
                "Retention": { "Ref": "LogRetentionPeriod" },
                "Skip": { "Ref": "AWS::NoValue" }
            })
        );
    }

    #[test]
    fn collects_references() {
        let a = NodeRef::new(1);
        let b = NodeRef::new(2);
        let v = Value::list([
            Value::Ref(a),
            Value::join([Value::get_att(b, "Arn"), "/*".into()]),
            Value::Ref(a),
            Value::param("Origin"),
        ]);
        assert_eq!(v.node_refs(), vec![a, b]);
        assert_eq!(v.parameter_refs(), vec!["Origin"]);
        assert!(!v.is_literal());
        assert!(Value::strings(["GET", "HEAD"]).is_literal());
    }
}
