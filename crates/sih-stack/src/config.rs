//! Stack configuration
//!
//! Loaded from a TOML file; every field has a default so a missing file
//! yields a usable configuration. `SIH_CODE_BUCKET`, `SIH_SOLUTION_NAME` and
//! `SIH_VERSION` override the file.

use serde::{Deserialize, Serialize};
use sih_graph::StackContext;
use std::path::{Path, PathBuf};

/// Route definition attached to the REST API when none is configured
pub const DEFAULT_API_DEFINITION: &str = include_str!("../assets/api.json");

/// Environment variable overriding [`StackConfig::code_bucket`]
pub const ENV_CODE_BUCKET: &str = "SIH_CODE_BUCKET";
/// Environment variable overriding [`StackConfig::solution_name`]
pub const ENV_SOLUTION_NAME: &str = "SIH_SOLUTION_NAME";
/// Environment variable overriding [`StackConfig::version`]
pub const ENV_VERSION: &str = "SIH_VERSION";

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },

    /// The API definition is not valid JSON
    #[error("invalid api definition {path}: {source}")]
    ApiDefinition {
        /// File that failed
        path: PathBuf,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// A required field is empty
    #[error("{field} must not be empty")]
    Missing {
        /// Field name as written in the file
        field: &'static str,
    },
}

/// Build-time settings of the image handler stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Template description
    pub description: String,
    /// Bucket prefix the function code is published under (`<bucket>-<region>`)
    pub code_bucket: String,
    /// Solution name, part of the code key
    pub solution_name: String,
    /// Version, part of the code key
    pub version: String,
    /// JSON route definition; the bundled one is used when unset
    pub api_definition: Option<PathBuf>,
    /// Pin the region instead of using `AWS::Region`
    pub region: Option<String>,
    /// Pin the account instead of using `AWS::AccountId`
    pub account_id: Option<String>,
    /// Pin the partition instead of using `AWS::Partition`
    pub partition: Option<String>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            description: "Serverless Image Handler: dynamic image manipulation and delivery \
                          behind CloudFront"
                .to_string(),
            code_bucket: "solutions".to_string(),
            solution_name: "serverless-image-handler".to_string(),
            version: "v5.1.0".to_string(),
            api_definition: None,
            region: None,
            account_id: None,
            partition: None,
        }
    }
}

impl StackConfig {
    /// Load `path`, falling back to defaults when it does not exist, then
    /// apply environment overrides
    ///
    /// # Errors
    ///
    /// `Read` / `Parse` for an unreadable or malformed file, `Missing` when
    /// a required field ends up empty.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `lookup` (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields = [
            (ENV_CODE_BUCKET, &mut self.code_bucket),
            (ENV_SOLUTION_NAME, &mut self.solution_name),
            (ENV_VERSION, &mut self.version),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key) {
                tracing::debug!(key, value = %value, "config override");
                *field = value;
            }
        }
    }

    /// # Errors
    ///
    /// `Missing` naming the first empty required field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("code_bucket", &self.code_bucket),
            ("solution_name", &self.solution_name),
            ("version", &self.version),
        ];
        match required.iter().find(|(_, v)| v.trim().is_empty()) {
            Some((field, _)) => Err(ConfigError::Missing { field: *field }),
            None => Ok(()),
        }
    }

    /// Environment context handed to the graph builder
    #[must_use]
    pub fn to_context(&self) -> StackContext {
        let mut ctx = StackContext::new(&self.code_bucket, &self.solution_name, &self.version);
        if let Some(region) = &self.region {
            ctx = ctx.with_region(region);
        }
        if let Some(account) = &self.account_id {
            ctx = ctx.with_account_id(account);
        }
        if let Some(partition) = &self.partition {
            ctx = ctx.with_partition(partition);
        }
        ctx
    }

    /// The configured route definition, or the bundled one
    ///
    /// # Errors
    ///
    /// `Read` / `ApiDefinition` when the configured file cannot be used.
    pub fn api_body(&self) -> Result<serde_json::Value, ConfigError> {
        match &self.api_definition {
            Some(path) => load_api_body(path),
            None => serde_json::from_str(DEFAULT_API_DEFINITION).map_err(|source| {
                ConfigError::ApiDefinition {
                    path: PathBuf::from("assets/api.json"),
                    source,
                }
            }),
        }
    }
}

/// Read a JSON route definition
///
/// # Errors
///
/// `Read` when the file cannot be read, `ApiDefinition` when it is not JSON.
pub fn load_api_body(path: &Path) -> Result<serde_json::Value, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::ApiDefinition {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StackConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.description, StackConfig::default().description);
        assert!(config.api_definition.is_none());
    }

    #[test]
    fn file_values_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "code_bucket = \"my-dist\"\nversion = \"v9\"\nregion = \"eu-west-1\""
        )
        .unwrap();
        let config = StackConfig::load(file.path()).unwrap();
        assert_eq!(config.code_bucket, "my-dist");
        assert_eq!(config.version, "v9");
        assert_eq!(config.solution_name, "serverless-image-handler");
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "code_buckett = \"typo\"").unwrap();
        assert!(matches!(
            StackConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = StackConfig::default();
        config.apply_overrides(|key| (key == ENV_VERSION).then(|| "v6.0.0".to_string()));
        assert_eq!(config.version, "v6.0.0");
        assert_eq!(config.code_bucket, "solutions");
    }

    #[test]
    fn empty_required_field_fails_validation() {
        let config = StackConfig {
            solution_name: " ".into(),
            ..StackConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing { field: "solution_name" })
        ));
    }

    #[test]
    fn bundled_api_definition_parses() {
        let body = StackConfig::default().api_body().unwrap();
        assert!(body.get("paths").is_some());
    }

    #[test]
    fn context_pins_region() {
        let config = StackConfig {
            region: Some("us-east-1".into()),
            ..StackConfig::default()
        };
        assert_eq!(config.to_context().region(), sih_graph::Value::from("us-east-1"));
    }
}
