//! Assembled template
//!
//! The immutable result of [`GraphBuilder::finalize`](crate::GraphBuilder::finalize).
//! Resources are stored in emission order with every node handle already
//! resolved to its final logical id.

use crate::condition::ConditionExpr;
use crate::parameter::ParameterSpec;
use indexmap::IndexMap;
use serde_json::{json, Map, Value as Json};
use sha2::{Digest, Sha256};

/// Template format version written to every document
pub const FORMAT_VERSION: &str = "2010-09-09";

/// One resource in the assembled template
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedResource {
    pub(crate) logical_id: String,
    pub(crate) type_name: String,
    pub(crate) condition: Option<String>,
    pub(crate) depends_on: Vec<String>,
    pub(crate) metadata: Option<Json>,
    pub(crate) properties: Map<String, Json>,
}

impl EmittedResource {
    /// Final logical id
    #[inline]
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Template type name, e.g. `AWS::S3::Bucket`
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Top-level condition name
    #[inline]
    #[must_use]
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// Explicit dependencies
    #[inline]
    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// `Metadata` block, present when rules are suppressed
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> Option<&Json> {
        self.metadata.as_ref()
    }

    /// Properties as rendered
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &Map<String, Json> {
        &self.properties
    }

    /// One top-level property
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Json> {
        self.properties.get(key)
    }

    /// Rule ids suppressed on this resource
    #[must_use]
    pub fn suppressed_rules(&self) -> Vec<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.pointer("/cfn_nag/rules_to_suppress"))
            .and_then(Json::as_array)
            .map(|rules| rules.iter().filter_map(|r| r["id"].as_str()).collect())
            .unwrap_or_default()
    }

    fn to_json(&self) -> Json {
        let mut out = Map::new();
        out.insert("Type".into(), json!(self.type_name));
        if let Some(condition) = &self.condition {
            out.insert("Condition".into(), json!(condition));
        }
        if !self.depends_on.is_empty() {
            out.insert("DependsOn".into(), json!(self.depends_on));
        }
        if let Some(metadata) = &self.metadata {
            out.insert("Metadata".into(), metadata.clone());
        }
        if !self.properties.is_empty() {
            out.insert("Properties".into(), Json::Object(self.properties.clone()));
        }
        Json::Object(out)
    }
}

/// One template output
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedOutput {
    pub(crate) logical_id: String,
    pub(crate) condition: Option<String>,
    pub(crate) value: Json,
    pub(crate) description: Option<Json>,
    pub(crate) export: Option<Json>,
}

impl EmittedOutput {
    /// Final logical id
    #[inline]
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Condition name
    #[inline]
    #[must_use]
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// Rendered `Value`
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Json {
        &self.value
    }

    fn to_json(&self) -> Json {
        let mut out = Map::new();
        if let Some(description) = &self.description {
            out.insert("Description".into(), description.clone());
        }
        out.insert("Value".into(), self.value.clone());
        if let Some(export) = &self.export {
            out.insert("Export".into(), export.clone());
        }
        if let Some(condition) = &self.condition {
            out.insert("Condition".into(), json!(condition));
        }
        Json::Object(out)
    }
}

/// A finalized deployment template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub(crate) description: Option<String>,
    pub(crate) parameters: Vec<ParameterSpec>,
    pub(crate) conditions: IndexMap<String, ConditionExpr>,
    pub(crate) resources: Vec<EmittedResource>,
    pub(crate) outputs: Vec<EmittedOutput>,
}

impl Template {
    /// Template description
    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared parameters in declaration order
    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Parameter by name
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// Conditions in definition order
    #[inline]
    #[must_use]
    pub fn conditions(&self) -> &IndexMap<String, ConditionExpr> {
        &self.conditions
    }

    /// Resources in emission order
    #[inline]
    #[must_use]
    pub fn resources(&self) -> &[EmittedResource] {
        &self.resources
    }

    /// Outputs in creation order
    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &[EmittedOutput] {
        &self.outputs
    }

    /// Resource by final logical id
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&EmittedResource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    /// Output by final logical id
    #[must_use]
    pub fn output(&self, logical_id: &str) -> Option<&EmittedOutput> {
        self.outputs.iter().find(|o| o.logical_id == logical_id)
    }

    /// Resource logical ids in emission order
    #[must_use]
    pub fn emission_order(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.logical_id.as_str()).collect()
    }

    /// Emission position of a resource
    #[must_use]
    pub fn position(&self, logical_id: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.logical_id == logical_id)
    }

    /// Template document
    #[must_use]
    pub fn to_json(&self) -> Json {
        let mut out = Map::new();
        out.insert("AWSTemplateFormatVersion".into(), json!(FORMAT_VERSION));
        if let Some(description) = &self.description {
            out.insert("Description".into(), json!(description));
        }
        if !self.parameters.is_empty() {
            let params: Map<String, Json> = self
                .parameters
                .iter()
                .map(|p| (p.name().to_string(), p.to_json()))
                .collect();
            out.insert("Parameters".into(), Json::Object(params));
        }
        if !self.conditions.is_empty() {
            let conditions: Map<String, Json> = self
                .conditions
                .iter()
                .map(|(name, expr)| (name.clone(), expr.to_json()))
                .collect();
            out.insert("Conditions".into(), Json::Object(conditions));
        }
        let resources: Map<String, Json> = self
            .resources
            .iter()
            .map(|r| (r.logical_id.clone(), r.to_json()))
            .collect();
        out.insert("Resources".into(), Json::Object(resources));
        if !self.outputs.is_empty() {
            let outputs: Map<String, Json> = self
                .outputs
                .iter()
                .map(|o| (o.logical_id.clone(), o.to_json()))
                .collect();
            out.insert("Outputs".into(), Json::Object(outputs));
        }
        Json::Object(out)
    }

    /// Pretty-printed template document
    ///
    /// # Errors
    ///
    /// Serialization errors from `serde_json`.
    pub fn to_string_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_json())
    }

    /// Hex SHA-256 of the compact document
    ///
    /// Two assemblies from the same inputs produce the same fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let compact = self.to_json().to_string();
        hex::encode(Sha256::digest(compact.as_bytes()))
    }
}
