//! Immutable environment context
//!
//! Values that vary per deployment (stack name, region, account, partition)
//! default to pseudo-parameter references so the template stays portable.
//! Build-time values (where the code artifact lives, solution name and
//! version) are plain strings.

use crate::value::{Pseudo, Value};

/// Environment handed to the builder and every pattern scope
#[derive(Debug, Clone, PartialEq)]
pub struct StackContext {
    stack_name: Value,
    region: Value,
    account_id: Value,
    partition: Value,
    url_suffix: Value,
    code_bucket: String,
    solution_name: String,
    version: String,
}

impl Default for StackContext {
    fn default() -> Self {
        Self {
            stack_name: Pseudo::StackName.into(),
            region: Pseudo::Region.into(),
            account_id: Pseudo::AccountId.into(),
            partition: Pseudo::Partition.into(),
            url_suffix: Pseudo::UrlSuffix.into(),
            code_bucket: String::new(),
            solution_name: String::new(),
            version: String::new(),
        }
    }
}

impl StackContext {
    /// Context for a code artifact published under
    /// `<code_bucket>-<region>/<solution_name>/<version>/`
    #[must_use]
    pub fn new(code_bucket: &str, solution_name: &str, version: &str) -> Self {
        Self {
            code_bucket: code_bucket.to_string(),
            solution_name: solution_name.to_string(),
            version: version.to_string(),
            ..Self::default()
        }
    }

    /// Pin the region to a literal instead of `AWS::Region`
    #[must_use]
    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.into();
        self
    }

    /// Pin the account id
    #[must_use]
    pub fn with_account_id(mut self, account_id: &str) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Pin the partition
    #[must_use]
    pub fn with_partition(mut self, partition: &str) -> Self {
        self.partition = partition.into();
        self
    }

    /// Stack name, `AWS::StackName` unless pinned
    #[inline]
    #[must_use]
    pub fn stack_name(&self) -> Value {
        self.stack_name.clone()
    }

    /// Region, `AWS::Region` unless pinned
    #[inline]
    #[must_use]
    pub fn region(&self) -> Value {
        self.region.clone()
    }

    /// Account id, `AWS::AccountId` unless pinned
    #[inline]
    #[must_use]
    pub fn account_id(&self) -> Value {
        self.account_id.clone()
    }

    /// Partition, `AWS::Partition` unless pinned
    #[inline]
    #[must_use]
    pub fn partition(&self) -> Value {
        self.partition.clone()
    }

    /// `AWS::URLSuffix`
    #[inline]
    #[must_use]
    pub fn url_suffix(&self) -> Value {
        self.url_suffix.clone()
    }

    /// Bucket prefix the function code is published under
    #[inline]
    #[must_use]
    pub fn code_bucket(&self) -> &str {
        &self.code_bucket
    }

    /// Solution name, part of the code key
    #[inline]
    #[must_use]
    pub fn solution_name(&self) -> &str {
        &self.solution_name
    }

    /// Published solution version
    #[inline]
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// `arn:<partition>:<service>:<region>:<account>:<resource...>`
    #[must_use]
    pub fn regional_arn<I: IntoIterator<Item = Value>>(&self, service: &str, resource: I) -> Value {
        let mut parts = vec![
            "arn:".into(),
            self.partition(),
            format!(":{service}:").into(),
            self.region(),
            ":".into(),
            self.account_id(),
            ":".into(),
        ];
        parts.extend(resource);
        Value::join(parts)
    }

    /// `arn:<partition>:<service>:::<resource...>`
    #[must_use]
    pub fn global_arn<I: IntoIterator<Item = Value>>(&self, service: &str, resource: I) -> Value {
        let mut parts = vec!["arn:".into(), self.partition(), format!(":{service}:::").into()];
        parts.extend(resource);
        Value::join(parts)
    }

    /// Object key of the packaged function code
    #[must_use]
    pub fn code_key(&self, artifact: &str) -> String {
        format!("{}/{}/{artifact}", self.solution_name, self.version)
    }
}
