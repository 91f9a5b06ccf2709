//! CloudFront distribution in front of an API Gateway REST API

use crate::common::{
    function_associations, logging_bucket, security_headers_function,
    CACHING_OPTIMIZED_POLICY_ID,
};
use sih_graph::prelude::*;

/// Inputs of [`CloudFrontToApiGateway`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudFrontToApiGatewayInputs {
    /// REST API served as the origin
    pub rest_api: NodeRef,
    /// Stage the origin path points at
    pub stage: NodeRef,
    /// Attach a viewer-response function setting security headers
    pub insert_http_security_headers: bool,
}

/// Distribution with an access-log bucket, origin set to a REST API stage
///
/// Exposed children: `CloudfrontLoggingBucket`,
/// `CloudfrontLoggingBucket/Policy`, `CloudFrontDistribution` and, when
/// requested, `SetHttpSecurityHeaders`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudFrontToApiGateway;

impl CompositePattern for CloudFrontToApiGateway {
    type Inputs = CloudFrontToApiGatewayInputs;

    fn kind(&self) -> &'static str {
        "cloudfront-apigateway"
    }

    fn build(&self, scope: &mut PatternScope<'_>, inputs: &Self::Inputs) -> BuildResult<()> {
        let ctx = scope.context();
        let log_bucket = logging_bucket(scope, "CloudfrontLoggingBucket")?;
        let headers = if inputs.insert_http_security_headers {
            Some(security_headers_function(scope)?)
        } else {
            None
        };

        let origin_id = "CloudFrontApiGatewayOrigin";
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
            (
                "DefaultCacheBehavior",
                Value::map(default_behavior),
            ),
            ("Enabled", true.into()),
            ("HttpVersion", "http2".into()),
            ("IPV6Enabled", true.into()),
            (
                "Logging",
                Value::map([("Bucket", Value::get_att(log_bucket, "RegionalDomainName"))]),
            ),
            (
                "Origins",
                Value::list([Value::map([
                    (
                        "CustomOriginConfig",
                        Value::map([("OriginProtocolPolicy", "https-only".into())]),
                    ),
                    (
                        "DomainName",
                        Value::join([
                            Value::Ref(inputs.rest_api),
                            ".execute-api.".into(),
                            ctx.region(),
                            ".".into(),
                            ctx.url_suffix(),
                        ]),
                    ),
                    ("Id", origin_id.into()),
                    ("OriginPath", Value::join(["/".into(), Value::Ref(inputs.stage)])),
                ])]),
            ),
        ]);

        scope.create_exposed(
            ResourceKind::Distribution,
            "CloudFrontDistribution",
            props([("DistributionConfig", config)]),
        )?;
        tracing::debug!(path = scope.path(), "cloudfront to api gateway built");
        Ok(())
    }
}
