//! Deploy-time condition evaluation
//!
//! The builder never evaluates conditions. This module plays the part of
//! the provisioning engine: given concrete parameter values and pseudo
//! parameters it decides which conditions hold and therefore which
//! resources and outputs would actually be created.

use crate::condition::{ConditionExpr, Operand};
use crate::template::Template;
use crate::value::Pseudo;
use std::collections::HashMap;

/// Errors raised while evaluating conditions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// A parameter has neither a value nor a default
    #[error("no value for parameter {name} and no default declared")]
    MissingParameter {
        /// Parameter name
        name: String,
    },

    /// A pseudo parameter has no value
    #[error("no value for pseudo parameter {name}")]
    MissingPseudo {
        /// Pseudo parameter name
        name: String,
    },

    /// A condition refers to one the template does not define
    #[error("unknown condition {name}")]
    UnknownCondition {
        /// Condition name
        name: String,
    },
}

/// Concrete values of one deployment
#[derive(Debug, Clone, Default)]
pub struct DeployEnvironment {
    parameters: HashMap<String, String>,
    pseudo: HashMap<Pseudo, String>,
}

impl DeployEnvironment {
    /// Environment with no values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `AWS::Region`
    #[must_use]
    pub fn with_region(self, region: &str) -> Self {
        self.with_pseudo(Pseudo::Region, region)
    }

    /// Set any pseudo parameter
    #[must_use]
    pub fn with_pseudo(mut self, pseudo: Pseudo, value: &str) -> Self {
        self.pseudo.insert(pseudo, value.to_string());
        self
    }

    /// Set a parameter value
    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }
}

/// Condition truth values for one template in one environment
#[derive(Debug)]
pub struct Renderer<'t> {
    template: &'t Template,
    truth: HashMap<String, bool>,
}

impl<'t> Renderer<'t> {
    /// Evaluate every condition of `template`
    ///
    /// # Errors
    ///
    /// `MissingParameter` / `MissingPseudo` when an operand has no value,
    /// `UnknownCondition` for a reference the template does not define.
    pub fn new(template: &'t Template, env: &DeployEnvironment) -> Result<Self, RenderError> {
        let mut eval = Evaluator {
            template,
            env,
            memo: HashMap::new(),
        };
        for name in template.conditions().keys() {
            eval.condition(name)?;
        }
        let truth = eval.memo;
        tracing::info!(
            conditions = truth.len(),
            holding = truth.values().filter(|v| **v).count(),
            "conditions evaluated"
        );
        Ok(Self { template, truth })
    }

    /// Truth of a named condition
    #[must_use]
    pub fn condition(&self, name: &str) -> Option<bool> {
        self.truth.get(name).copied()
    }

    fn holds(&self, condition: Option<&str>) -> bool {
        condition.map_or(true, |name| self.condition(name).unwrap_or(false))
    }

    /// Whether the resource or output with `logical_id` would be created
    #[must_use]
    pub fn is_emitted(&self, logical_id: &str) -> bool {
        if let Some(resource) = self.template.resource(logical_id) {
            return self.holds(resource.condition());
        }
        self.template
            .output(logical_id)
            .is_some_and(|output| self.holds(output.condition()))
    }

    /// Resources that would be created, in emission order
    #[must_use]
    pub fn emitted_resources(&self) -> Vec<&'t str> {
        self.template
            .resources()
            .iter()
            .filter(|r| self.holds(r.condition()))
            .map(|r| r.logical_id())
            .collect()
    }

    /// Outputs that would be created
    #[must_use]
    pub fn emitted_outputs(&self) -> Vec<&'t str> {
        self.template
            .outputs()
            .iter()
            .filter(|o| self.holds(o.condition()))
            .map(|o| o.logical_id())
            .collect()
    }
}

struct Evaluator<'a> {
    template: &'a Template,
    env: &'a DeployEnvironment,
    memo: HashMap<String, bool>,
}

impl Evaluator<'_> {
    fn condition(&mut self, name: &str) -> Result<bool, RenderError> {
        if let Some(value) = self.memo.get(name) {
            return Ok(*value);
        }
        let expr = self
            .template
            .conditions()
            .get(name)
            .ok_or_else(|| RenderError::UnknownCondition {
                name: name.to_string(),
            })?;
        let value = self.expr(expr)?;
        self.memo.insert(name.to_string(), value);
        Ok(value)
    }

    fn expr(&mut self, expr: &ConditionExpr) -> Result<bool, RenderError> {
        match expr {
            ConditionExpr::Equals(a, b) => Ok(self.operand(a)? == self.operand(b)?),
            ConditionExpr::Not(inner) => Ok(!self.expr(inner)?),
            ConditionExpr::Or(exprs) => {
                for e in exprs {
                    if self.expr(e)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            ConditionExpr::And(exprs) => {
                for e in exprs {
                    if !self.expr(e)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ConditionExpr::Condition(c) => self.condition(c.name()),
        }
    }

    fn operand(&self, operand: &Operand) -> Result<String, RenderError> {
        match operand {
            Operand::Literal(s) => Ok(s.clone()),
            Operand::Parameter(name) => self
                .env
                .parameters
                .get(name)
                .cloned()
                .or_else(|| {
                    self.template
                        .parameter(name)
                        .and_then(|p| p.default_value())
                        .map(str::to_string)
                })
                .ok_or_else(|| RenderError::MissingParameter { name: name.clone() }),
            Operand::Pseudo(p) => {
                self.env
                    .pseudo
                    .get(p)
                    .cloned()
                    .ok_or_else(|| RenderError::MissingPseudo {
                        name: p.as_str().to_string(),
                    })
            }
        }
    }
}
