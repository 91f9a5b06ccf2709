//! Condition registry
//!
//! Conditions are named boolean expressions over template parameters,
//! pseudo parameters and other conditions. The registry only records them;
//! truth is decided by whoever renders the template for a concrete
//! deployment (see [`crate::render`]).
//!
//! Conditions must form a DAG. Every `define` walks the references of the
//! new expression through the already registered conditions and rejects the
//! definition when the walk returns to its own name.

use crate::error::{BuildError, BuildResult};
use crate::value::Pseudo;
use indexmap::IndexMap;
use serde_json::json;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Opaque handle to a named condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConditionRef(Arc<str>);

impl ConditionRef {
    /// Reference a condition by name
    ///
    /// The name does not have to be registered yet; unresolved names are
    /// reported when the graph is finalized.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Condition name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConditionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operand of an equality test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Constant string
    Literal(String),
    /// Template parameter
    Parameter(String),
    /// Pseudo parameter such as the deploy region
    Pseudo(Pseudo),
}

impl Operand {
    /// Template parameter operand
    #[must_use]
    pub fn param(name: &str) -> Self {
        Self::Parameter(name.to_string())
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Literal(s) => json!(s),
            Self::Parameter(name) => json!({ "Ref": name }),
            Self::Pseudo(p) => json!({ "Ref": p.as_str() }),
        }
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<Pseudo> for Operand {
    fn from(p: Pseudo) -> Self {
        Self::Pseudo(p)
    }
}

/// Boolean expression of a condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionExpr {
    /// Both operands resolve to the same string
    Equals(Operand, Operand),
    /// Negation
    Not(Box<ConditionExpr>),
    /// Any operand holds
    Or(Vec<ConditionExpr>),
    /// Every operand holds
    And(Vec<ConditionExpr>),
    /// Reference to another named condition
    Condition(ConditionRef),
}

impl ConditionExpr {
    /// `Fn::Equals` of two operands
    #[must_use]
    pub fn equals(a: impl Into<Operand>, b: impl Into<Operand>) -> Self {
        Self::Equals(a.into(), b.into())
    }

    /// `Fn::Not`
    #[must_use]
    pub fn not(expr: ConditionExpr) -> Self {
        Self::Not(Box::new(expr))
    }

    /// `Fn::Or`
    #[must_use]
    pub fn or<I: IntoIterator<Item = ConditionExpr>>(exprs: I) -> Self {
        Self::Or(exprs.into_iter().collect())
    }

    /// `Fn::And`
    #[must_use]
    pub fn and<I: IntoIterator<Item = ConditionExpr>>(exprs: I) -> Self {
        Self::And(exprs.into_iter().collect())
    }

    /// Reference to a named condition
    #[must_use]
    pub fn reference(cond: &ConditionRef) -> Self {
        Self::Condition(cond.clone())
    }

    /// Names of the conditions this expression references directly
    #[must_use]
    pub fn referenced_conditions(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |expr| {
            if let ConditionExpr::Condition(c) = expr {
                out.push(c.name());
            }
        });
        out
    }

    /// Names of the template parameters this expression reads
    #[must_use]
    pub fn parameter_refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |expr| {
            if let ConditionExpr::Equals(a, b) = expr {
                for op in [a, b] {
                    if let Operand::Parameter(name) = op {
                        out.push(name.as_str());
                    }
                }
            }
        });
        out
    }

    fn walk<'a, F: FnMut(&'a ConditionExpr)>(&'a self, f: &mut F) {
        f(self);
        match self {
            Self::Not(inner) => inner.walk(f),
            Self::Or(exprs) | Self::And(exprs) => exprs.iter().for_each(|e| e.walk(f)),
            Self::Equals(..) | Self::Condition(_) => {}
        }
    }

    /// Template JSON
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Equals(a, b) => json!({ "Fn::Equals": [a.to_json(), b.to_json()] }),
            Self::Not(inner) => json!({ "Fn::Not": [inner.to_json()] }),
            Self::Or(exprs) => {
                json!({ "Fn::Or": exprs.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            Self::And(exprs) => {
                json!({ "Fn::And": exprs.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            Self::Condition(c) => json!({ "Condition": c.name() }),
        }
    }
}

/// Named conditions of one template, in definition order
#[derive(Debug, Clone, Default)]
pub struct ConditionRegistry {
    conditions: IndexMap<String, ConditionExpr>,
}

impl ConditionRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `expr` under `name`
    ///
    /// # Errors
    ///
    /// `InvalidLogicalId` for a name that is not alphanumeric,
    /// `DuplicateCondition` when the name is taken and `CyclicCondition`
    /// when the expression reaches `name` through registered conditions.
    pub fn define(&mut self, name: &str, expr: ConditionExpr) -> BuildResult<ConditionRef> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BuildError::InvalidLogicalId {
                id: name.to_string(),
            });
        }
        if self.conditions.contains_key(name) {
            return Err(BuildError::DuplicateCondition {
                name: name.to_string(),
            });
        }
        if let Some(path) = self.path_back_to(name, &expr) {
            return Err(BuildError::CyclicCondition {
                name: name.to_string(),
                path,
            });
        }

        tracing::debug!(condition = name, "condition defined");
        self.conditions.insert(name.to_string(), expr);
        Ok(ConditionRef::named(name))
    }

    /// `name = not of`
    ///
    /// # Errors
    ///
    /// Same as [`define`](Self::define).
    pub fn negate(&mut self, name: &str, of: &ConditionRef) -> BuildResult<ConditionRef> {
        self.define(name, ConditionExpr::not(ConditionExpr::reference(of)))
    }

    /// `name = refs[0] or refs[1] or ...`
    ///
    /// # Errors
    ///
    /// Same as [`define`](Self::define).
    pub fn any(&mut self, name: &str, refs: &[ConditionRef]) -> BuildResult<ConditionRef> {
        self.define(
            name,
            ConditionExpr::or(refs.iter().map(ConditionExpr::reference)),
        )
    }

    /// `name = (a == b)`
    ///
    /// # Errors
    ///
    /// Same as [`define`](Self::define).
    pub fn equals(
        &mut self,
        name: &str,
        a: impl Into<Operand>,
        b: impl Into<Operand>,
    ) -> BuildResult<ConditionRef> {
        self.define(name, ConditionExpr::equals(a, b))
    }

    /// Depth-first search from the references of `expr` back to `name`.
    /// Returns the reference chain, starting and ending with `name`.
    fn path_back_to(&self, name: &str, expr: &ConditionExpr) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut path = vec![name.to_string()];
        for next in expr.referenced_conditions() {
            if self.search(next, name, &mut visited, &mut path) {
                return Some(path);
            }
        }
        None
    }

    fn search<'a>(
        &'a self,
        current: &'a str,
        target: &str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<String>,
    ) -> bool {
        path.push(current.to_string());
        if current == target {
            return true;
        }
        if visited.insert(current) {
            if let Some(expr) = self.conditions.get(current) {
                for next in expr.referenced_conditions() {
                    if self.search(next, target, visited, path) {
                        return true;
                    }
                }
            }
        }
        path.pop();
        false
    }

    /// Expression registered under `name`
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConditionExpr> {
        self.conditions.get(name)
    }

    /// Handle for a registered condition
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ConditionRef> {
        self.conditions
            .contains_key(name)
            .then(|| ConditionRef::named(name))
    }

    /// Whether `name` is defined
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// Conditions in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConditionExpr)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of defined conditions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Whether nothing is defined
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Check that every reference between registered conditions resolves
    ///
    /// # Errors
    ///
    /// `UnresolvedCondition` naming the first missing condition.
    pub fn check_resolved(&self) -> BuildResult<()> {
        for (name, expr) in &self.conditions {
            for referenced in expr.referenced_conditions() {
                if !self.conditions.contains_key(referenced) {
                    return Err(BuildError::UnresolvedCondition {
                        name: referenced.to_string(),
                        referenced_by: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
