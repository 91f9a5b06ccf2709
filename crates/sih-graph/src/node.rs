//! Resource nodes and their kinds

use crate::condition::ConditionRef;
use crate::pattern::PatternHandle;
use crate::value::{Properties, Value};
use serde::{Serialize, Serializer};
use std::fmt;

/// Handle to a node in one [`GraphBuilder`](crate::GraphBuilder)
///
/// Handles are allocated in creation order; their ordering is the stable
/// tie-break used for emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef(u32);

impl NodeRef {
    #[inline]
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Creation index
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Resource kinds with a declared property schema
///
/// `Custom` carries an arbitrary type name and accepts any property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `AWS::Lambda::Function`
    LambdaFunction,
    /// `AWS::Lambda::Permission`
    LambdaPermission,
    /// `AWS::IAM::Role`
    IamRole,
    /// `AWS::IAM::Policy`
    IamPolicy,
    /// `AWS::Logs::LogGroup`
    LogGroup,
    /// `AWS::ApiGateway::RestApi`
    RestApi,
    /// `AWS::ApiGateway::Deployment`
    ApiDeployment,
    /// `AWS::ApiGateway::Stage`
    ApiStage,
    /// `AWS::ApiGateway::Method`
    ApiMethod,
    /// `AWS::ApiGateway::Resource`
    ApiResource,
    /// `AWS::ApiGateway::Account`
    ApiAccount,
    /// `AWS::ApiGateway::UsagePlan`
    UsagePlan,
    /// `AWS::CloudFront::Distribution`
    Distribution,
    /// `AWS::CloudFront::CachePolicy`
    CachePolicy,
    /// `AWS::CloudFront::OriginRequestPolicy`
    OriginRequestPolicy,
    /// `AWS::CloudFront::CloudFrontOriginAccessIdentity`
    OriginAccessIdentity,
    /// `AWS::CloudFront::Function`
    CloudFrontFunction,
    /// `AWS::S3::Bucket`
    Bucket,
    /// `AWS::S3::BucketPolicy`
    BucketPolicy,
    /// Template output, emitted under `Outputs` rather than `Resources`
    Output,
    /// Any other type, by name
    Custom(String),
}

impl ResourceKind {
    /// Template type name
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::LambdaFunction => "AWS::Lambda::Function",
            Self::LambdaPermission => "AWS::Lambda::Permission",
            Self::IamRole => "AWS::IAM::Role",
            Self::IamPolicy => "AWS::IAM::Policy",
            Self::LogGroup => "AWS::Logs::LogGroup",
            Self::RestApi => "AWS::ApiGateway::RestApi",
            Self::ApiDeployment => "AWS::ApiGateway::Deployment",
            Self::ApiStage => "AWS::ApiGateway::Stage",
            Self::ApiMethod => "AWS::ApiGateway::Method",
            Self::ApiResource => "AWS::ApiGateway::Resource",
            Self::ApiAccount => "AWS::ApiGateway::Account",
            Self::UsagePlan => "AWS::ApiGateway::UsagePlan",
            Self::Distribution => "AWS::CloudFront::Distribution",
            Self::CachePolicy => "AWS::CloudFront::CachePolicy",
            Self::OriginRequestPolicy => "AWS::CloudFront::OriginRequestPolicy",
            Self::OriginAccessIdentity => "AWS::CloudFront::CloudFrontOriginAccessIdentity",
            Self::CloudFrontFunction => "AWS::CloudFront::Function",
            Self::Bucket => "AWS::S3::Bucket",
            Self::BucketPolicy => "AWS::S3::BucketPolicy",
            Self::Output => "Output",
            Self::Custom(name) => name,
        }
    }

    /// Declared top-level property keys; `None` for custom kinds
    #[must_use]
    pub fn declared_properties(&self) -> Option<&'static [&'static str]> {
        let keys: &'static [&'static str] = match self {
            Self::LambdaFunction => &[
                "Architectures",
                "Code",
                "CodeSigningConfigArn",
                "DeadLetterConfig",
                "Description",
                "Environment",
                "EphemeralStorage",
                "FileSystemConfigs",
                "FunctionName",
                "Handler",
                "ImageConfig",
                "KmsKeyArn",
                "Layers",
                "MemorySize",
                "PackageType",
                "ReservedConcurrentExecutions",
                "Role",
                "Runtime",
                "Tags",
                "Timeout",
                "TracingConfig",
                "VpcConfig",
            ],
            Self::LambdaPermission => &[
                "Action",
                "EventSourceToken",
                "FunctionName",
                "Principal",
                "SourceAccount",
                "SourceArn",
            ],
            Self::IamRole => &[
                "AssumeRolePolicyDocument",
                "Description",
                "ManagedPolicyArns",
                "MaxSessionDuration",
                "Path",
                "PermissionsBoundary",
                "Policies",
                "RoleName",
                "Tags",
            ],
            Self::IamPolicy => &["Groups", "PolicyDocument", "PolicyName", "Roles", "Users"],
            Self::LogGroup => &["KmsKeyId", "LogGroupName", "RetentionInDays", "Tags"],
            Self::RestApi => &[
                "ApiKeySourceType",
                "BinaryMediaTypes",
                "Body",
                "BodyS3Location",
                "CloneFrom",
                "Description",
                "DisableExecuteApiEndpoint",
                "EndpointConfiguration",
                "FailOnWarnings",
                "MinimumCompressionSize",
                "Mode",
                "Name",
                "Parameters",
                "Policy",
                "Tags",
            ],
            Self::ApiDeployment => &[
                "DeploymentCanarySettings",
                "Description",
                "RestApiId",
                "StageDescription",
                "StageName",
            ],
            Self::ApiStage => &[
                "AccessLogSetting",
                "CacheClusterEnabled",
                "CacheClusterSize",
                "CanarySetting",
                "ClientCertificateId",
                "DeploymentId",
                "Description",
                "DocumentationVersion",
                "MethodSettings",
                "RestApiId",
                "StageName",
                "Tags",
                "TracingEnabled",
                "Variables",
            ],
            Self::ApiMethod => &[
                "ApiKeyRequired",
                "AuthorizationScopes",
                "AuthorizationType",
                "AuthorizerId",
                "HttpMethod",
                "Integration",
                "MethodResponses",
                "OperationName",
                "RequestModels",
                "RequestParameters",
                "RequestValidatorId",
                "ResourceId",
                "RestApiId",
            ],
            Self::ApiResource => &["ParentId", "PathPart", "RestApiId"],
            Self::ApiAccount => &["CloudWatchRoleArn"],
            Self::UsagePlan => &[
                "ApiStages",
                "Description",
                "Quota",
                "Tags",
                "Throttle",
                "UsagePlanName",
            ],
            Self::Distribution => &["DistributionConfig", "Tags"],
            Self::CachePolicy => &["CachePolicyConfig"],
            Self::OriginRequestPolicy => &["OriginRequestPolicyConfig"],
            Self::OriginAccessIdentity => &["CloudFrontOriginAccessIdentityConfig"],
            Self::CloudFrontFunction => &["AutoPublish", "FunctionCode", "FunctionConfig", "Name"],
            Self::Bucket => &[
                "AccelerateConfiguration",
                "AccessControl",
                "AnalyticsConfigurations",
                "BucketEncryption",
                "BucketName",
                "CorsConfiguration",
                "IntelligentTieringConfigurations",
                "InventoryConfigurations",
                "LifecycleConfiguration",
                "LoggingConfiguration",
                "MetricsConfigurations",
                "NotificationConfiguration",
                "ObjectLockConfiguration",
                "ObjectLockEnabled",
                "OwnershipControls",
                "PublicAccessBlockConfiguration",
                "ReplicationConfiguration",
                "Tags",
                "VersioningConfiguration",
                "WebsiteConfiguration",
            ],
            Self::BucketPolicy => &["Bucket", "PolicyDocument"],
            Self::Output => &["Description", "Export", "Value"],
            Self::Custom(_) => return None,
        };
        Some(keys)
    }

    /// Whether `key` may appear in this kind's property bag
    #[must_use]
    pub fn declares(&self, key: &str) -> bool {
        self.declared_properties()
            .map_or(true, |keys| keys.contains(&key))
    }

    /// Whether nodes of this kind are template outputs
    #[inline]
    #[must_use]
    pub fn is_output(&self) -> bool {
        matches!(self, Self::Output)
    }

    /// Short name used when a logical id hint is empty
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.type_name().rsplit("::").next().unwrap_or("Resource")
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_name())
    }
}

/// One declared infrastructure unit
#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub(crate) logical_id: String,
    pub(crate) kind: ResourceKind,
    pub(crate) properties: Properties,
    pub(crate) condition: Option<ConditionRef>,
    pub(crate) pattern: Option<PatternHandle>,
    pub(crate) tombstoned: bool,
}

impl ResourceNode {
    pub(crate) fn new(
        logical_id: String,
        kind: ResourceKind,
        properties: Properties,
        pattern: Option<PatternHandle>,
    ) -> Self {
        Self {
            logical_id,
            kind,
            properties,
            condition: None,
            pattern,
            tombstoned: false,
        }
    }

    /// Current logical id
    #[inline]
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Resource kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Property bag
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// One property
    #[inline]
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Attached condition
    #[inline]
    #[must_use]
    pub fn condition(&self) -> Option<&ConditionRef> {
        self.condition.as_ref()
    }

    /// Pattern that created this node
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> Option<PatternHandle> {
        self.pattern
    }

    /// Whether the node was pruned
    #[inline]
    #[must_use]
    pub fn is_tombstoned(&self) -> bool {
        self.tombstoned
    }

    /// Nodes referenced by any property, in first-seen order
    #[must_use]
    pub fn referenced_nodes(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        for value in self.properties.values() {
            for node in value.node_refs() {
                if !out.contains(&node) {
                    out.push(node);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_rejects_typos() {
        let kind = ResourceKind::LambdaFunction;
        assert!(kind.declares("MemorySize"));
        assert!(!kind.declares("MemroySize"));
    }

    #[test]
    fn custom_kinds_accept_anything() {
        let kind = ResourceKind::Custom("Custom::CreateUuid".into());
        assert!(kind.declares("ServiceToken"));
        assert_eq!(kind.type_name(), "Custom::CreateUuid");
        assert_eq!(kind.short_name(), "CreateUuid");
    }

    #[test]
    fn short_names() {
        assert_eq!(ResourceKind::Bucket.short_name(), "Bucket");
        assert_eq!(ResourceKind::Output.short_name(), "Output");
    }
}
