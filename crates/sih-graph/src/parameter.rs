//! Template parameters

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Parameter value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Free-form string
    String,
    /// Integer or float
    Number,
    /// Comma-separated strings
    CommaDelimitedList,
}

impl ParameterType {
    /// Type name as written in the template
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::CommaDelimitedList => "CommaDelimitedList",
        }
    }
}

/// Declared input of the template
///
/// Values are supplied by the deployer and arrive already validated; the
/// builder only records the declaration so references can be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    name: String,
    kind: ParameterType,
    description: Option<String>,
    default: Option<String>,
    allowed_values: Vec<String>,
}

impl ParameterSpec {
    fn new(name: &str, kind: ParameterType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: None,
            default: None,
            allowed_values: Vec::new(),
        }
    }

    /// `String` parameter
    #[must_use]
    pub fn string(name: &str) -> Self {
        Self::new(name, ParameterType::String)
    }

    /// `Number` parameter
    #[must_use]
    pub fn number(name: &str) -> Self {
        Self::new(name, ParameterType::Number)
    }

    /// `CommaDelimitedList` parameter
    #[must_use]
    pub fn list(name: &str) -> Self {
        Self::new(name, ParameterType::CommaDelimitedList)
    }

    /// Description shown to operators
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Value used when the deployment supplies none
    #[must_use]
    pub fn with_default(mut self, default: impl ToString) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Restrict values to `values`
    #[must_use]
    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Toggle parameter accepting `Yes` or `No`
    #[must_use]
    pub fn yes_no(name: &str, default: &str) -> Self {
        Self::string(name)
            .with_default(default)
            .with_allowed_values(["Yes", "No"])
    }

    /// Parameter name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value type
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ParameterType {
        self.kind
    }

    /// Declared default
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Allowed values, empty when unrestricted
    #[inline]
    #[must_use]
    pub fn allowed_values(&self) -> &[String] {
        &self.allowed_values
    }

    /// Template JSON
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        out.insert("Type".into(), json!(self.kind.as_str()));
        if let Some(default) = &self.default {
            let value = match self.kind {
                ParameterType::Number => default
                    .parse::<i64>()
                    .map_or_else(|_| json!(default), |n| json!(n)),
                _ => json!(default),
            };
            out.insert("Default".into(), value);
        }
        if !self.allowed_values.is_empty() {
            out.insert("AllowedValues".into(), json!(self.allowed_values));
        }
        if let Some(description) = &self.description {
            out.insert("Description".into(), json!(description));
        }
        serde_json::Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_toggle() {
        let p = ParameterSpec::yes_no("CorsEnabled", "No").with_description("Enable CORS");
        assert_eq!(
            p.to_json(),
            json!({
                "Type": "String",
                "Default": "No",
                "AllowedValues": ["Yes", "No"],
                "Description": "Enable CORS"
            })
        );
    }

    #[test]
    fn numeric_defaults_stay_numbers() {
        let p = ParameterSpec::number("LogRetentionPeriod").with_default(1);
        assert_eq!(p.to_json()["Default"], json!(1));
        assert_eq!(p.default_value(), Some("1"));
    }
}
