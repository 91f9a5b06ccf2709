//! CloudFront distribution serving a private S3 bucket

use crate::common::{
    bucket_policy_document, function_associations, logging_bucket, private_bucket_props,
    security_headers_function, CACHING_OPTIMIZED_POLICY_ID,
};
use sih_graph::prelude::*;

/// Inputs of [`CloudFrontToS3`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudFrontToS3Inputs {
    /// Turn on object versioning
    pub versioned: bool,
    /// Website index document
    pub website_index_document: Option<String>,
    /// Website error document
    pub website_error_document: Option<String>,
    /// Canned ACL, e.g. `Private`
    pub access_control: Option<String>,
    /// Associate a viewer-response function adding security headers
    pub insert_http_security_headers: bool,
}

/// Private content bucket read through an origin access identity
///
/// Exposed children: `S3LoggingBucket`, `S3LoggingBucket/Policy`,
/// `S3Bucket`, `S3Bucket/Policy`, `CloudFrontOriginAccessIdentity`,
/// `CloudfrontLoggingBucket`, `CloudfrontLoggingBucket/Policy`,
/// `CloudFrontDistribution` and optionally `SetHttpSecurityHeaders`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudFrontToS3;

impl CompositePattern for CloudFrontToS3 {
    type Inputs = CloudFrontToS3Inputs;

    fn kind(&self) -> &'static str {
        "cloudfront-s3"
    }

    fn build(&self, scope: &mut PatternScope<'_>, inputs: &Self::Inputs) -> BuildResult<()> {
        let access_logs = logging_bucket(scope, "S3LoggingBucket")?;

        let mut bucket_props = private_bucket_props();
        bucket_props.insert(
            "LoggingConfiguration".into(),
            Value::map([("DestinationBucketName", Value::Ref(access_logs))]),
        );
        if inputs.versioned {
            bucket_props.insert(
                "VersioningConfiguration".into(),
                Value::map([("Status", "Enabled".into())]),
            );
        }
        if let Some(index) = &inputs.website_index_document {
            let mut website = vec![("IndexDocument", Value::from(index.as_str()))];
            if let Some(error) = &inputs.website_error_document {
                website.push(("ErrorDocument", error.as_str().into()));
            }
            bucket_props.insert("WebsiteConfiguration".into(), Value::map(website));
        }
        if let Some(acl) = &inputs.access_control {
            bucket_props.insert("AccessControl".into(), acl.as_str().into());
        }
        let bucket = scope.create_exposed(ResourceKind::Bucket, "S3Bucket", bucket_props)?;

        let identity = scope.create_exposed(
            ResourceKind::OriginAccessIdentity,
            "CloudFrontOriginAccessIdentity",
            props([(
                "CloudFrontOriginAccessIdentityConfig",
                Value::map([("Comment", "Access S3 bucket content only through CloudFront".into())]),
            )]),
        )?;

        let read_through_identity = Value::map([
            ("Action", "s3:GetObject".into()),
            ("Effect", "Allow".into()),
            (
                "Principal",
                Value::map([(
                    "CanonicalUser",
                    Value::get_att(identity, "S3CanonicalUserId"),
                )]),
            ),
            (
                "Resource",
                Value::join([Value::get_att(bucket, "Arn"), "/*".into()]),
            ),
        ]);
        scope.create_exposed(
            ResourceKind::BucketPolicy,
            "S3Bucket/Policy",
            props([
                ("Bucket", Value::Ref(bucket)),
                (
                    "PolicyDocument",
                    bucket_policy_document(bucket, [read_through_identity]),
                ),
            ]),
        )?;

        let cloudfront_logs = logging_bucket(scope, "CloudfrontLoggingBucket")?;
        let headers = if inputs.insert_http_security_headers {
            Some(security_headers_function(scope)?)
        } else {
            None
        };

        let origin_id = "CloudFrontS3Origin";
        let mut default_behavior = vec![
            ("CachePolicyId", Value::from(CACHING_OPTIMIZED_POLICY_ID)),
            ("Compress", true.into()),
            ("TargetOriginId", origin_id.into()),
            ("ViewerProtocolPolicy", "redirect-to-https".into()),
        ];
        if let Some(associations) = function_associations(headers) {
            default_behavior.push(("FunctionAssociations", associations));
        }

        let config = Value::map([
            ("DefaultCacheBehavior", Value::map(default_behavior)),
            ("DefaultRootObject", "index.html".into()),
            ("Enabled", true.into()),
            ("HttpVersion", "http2".into()),
            ("IPV6Enabled", true.into()),
            (
                "Logging",
                Value::map([(
                    "Bucket",
                    Value::get_att(cloudfront_logs, "RegionalDomainName"),
                )]),
            ),
            (
                "Origins",
                Value::list([Value::map([
                    ("DomainName", Value::get_att(bucket, "RegionalDomainName")),
                    ("Id", origin_id.into()),
                    (
                        "S3OriginConfig",
                        Value::map([(
                            "OriginAccessIdentity",
                            Value::join([
                                "origin-access-identity/cloudfront/".into(),
                                Value::Ref(identity),
                            ]),
                        )]),
                    ),
                ])]),
            ),
        ]);
        scope.create_exposed(
            ResourceKind::Distribution,
            "CloudFrontDistribution",
            props([("DistributionConfig", config)]),
        )?;

        tracing::debug!(path = scope.path(), "cloudfront to s3 built");
        Ok(())
    }
}
