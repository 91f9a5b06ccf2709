//! Building blocks shared by the patterns

use sih_graph::prelude::*;

/// Managed `CachingOptimized` cache policy
pub(crate) const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

const SECURITY_HEADERS_CODE: &str = "function handler(event) { \
var response = event.response; \
var headers = response.headers; \
headers['strict-transport-security'] = { value: 'max-age=63072000; includeSubdomains; preload' }; \
headers['content-security-policy'] = { value: \"default-src 'none'; img-src 'self'; script-src 'self'; style-src 'self'; object-src 'none'\" }; \
headers['x-content-type-options'] = { value: 'nosniff' }; \
headers['x-frame-options'] = { value: 'DENY' }; \
headers['x-xss-protection'] = { value: '1; mode=block' }; \
headers['referrer-policy'] = { value: 'same-origin' }; \
return response; }";

/// Trust policy letting `service` assume a role
pub(crate) fn assume_role_policy(service: &str) -> Value {
    Value::map([
        ("Version", "2012-10-17".into()),
        (
            "Statement",
            Value::list([Value::map([
                ("Action", "sts:AssumeRole".into()),
                ("Effect", "Allow".into()),
                ("Principal", Value::map([("Service", service.into())])),
            ])]),
        ),
    ])
}

/// Encrypted, non-public bucket properties
pub(crate) fn private_bucket_props() -> Properties {
    props([
        (
            "BucketEncryption",
            Value::map([(
                "ServerSideEncryptionConfiguration",
                Value::list([Value::map([(
                    "ServerSideEncryptionByDefault",
                    Value::map([("SSEAlgorithm", "AES256".into())]),
                )])]),
            )]),
        ),
        (
            "PublicAccessBlockConfiguration",
            Value::map([
                ("BlockPublicAcls", true.into()),
                ("BlockPublicPolicy", true.into()),
                ("IgnorePublicAcls", true.into()),
                ("RestrictPublicBuckets", true.into()),
            ]),
        ),
    ])
}

/// Bucket that receives access logs
pub(crate) fn logging_bucket_props() -> Properties {
    let mut props = private_bucket_props();
    props.insert(
        "OwnershipControls".into(),
        Value::map([(
            "Rules",
            Value::list([Value::map([("ObjectOwnership", "ObjectWriter".into())])]),
        )]),
    );
    props.insert(
        "VersioningConfiguration".into(),
        Value::map([("Status", "Enabled".into())]),
    );
    props
}

/// Statement denying any request made without TLS
fn deny_insecure_transport(bucket: NodeRef) -> Value {
    let arn = Value::get_att(bucket, "Arn");
    Value::map([
        ("Action", "s3:*".into()),
        (
            "Condition",
            Value::map([(
                "Bool",
                Value::map([("aws:SecureTransport", "false".into())]),
            )]),
        ),
        ("Effect", "Deny".into()),
        ("Principal", Value::map([("AWS", "*".into())])),
        (
            "Resource",
            Value::list([Value::join([arn.clone(), "/*".into()]), arn]),
        ),
    ])
}

/// Bucket policy document with the TLS-only statement plus `extra`
pub(crate) fn bucket_policy_document<I: IntoIterator<Item = Value>>(bucket: NodeRef, extra: I) -> Value {
    let mut statements = vec![deny_insecure_transport(bucket)];
    statements.extend(extra);
    Value::map([
        ("Statement", Value::List(statements)),
        ("Version", "2012-10-17".into()),
    ])
}

/// A logging bucket exposed as `name` and its policy as `name/Policy`
pub(crate) fn logging_bucket(scope: &mut PatternScope<'_>, name: &str) -> BuildResult<NodeRef> {
    let bucket = scope.create_exposed(ResourceKind::Bucket, name, logging_bucket_props())?;
    scope.create_exposed(
        ResourceKind::BucketPolicy,
        &format!("{name}/Policy"),
        props([
            ("Bucket", Value::Ref(bucket)),
            ("PolicyDocument", bucket_policy_document(bucket, [])),
        ]),
    )?;
    scope.suppress(bucket, "W35", "This S3 bucket is used as the access logging bucket")?;
    Ok(bucket)
}

/// Viewer-response function adding HTTP security headers
pub(crate) fn security_headers_function(scope: &mut PatternScope<'_>) -> BuildResult<NodeRef> {
    let ctx = scope.context();
    scope.create_exposed(
        ResourceKind::CloudFrontFunction,
        "SetHttpSecurityHeaders",
        props([
            ("AutoPublish", true.into()),
            ("FunctionCode", SECURITY_HEADERS_CODE.into()),
            (
                "FunctionConfig",
                Value::map([
                    ("Comment", "Set HTTP security headers".into()),
                    ("Runtime", "cloudfront-js-1.0".into()),
                ]),
            ),
            (
                "Name",
                Value::join([ctx.stack_name(), "-".into(), ctx.region(), "-SetHttpSecurityHeaders".into()]),
            ),
        ]),
    )
}

/// Function association list for a default cache behavior
pub(crate) fn function_associations(function: Option<NodeRef>) -> Option<Value> {
    function.map(|f| {
        Value::list([Value::map([
            ("EventType", "viewer-response".into()),
            ("FunctionARN", Value::get_att(f, "FunctionARN")),
        ])])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_buckets_are_private() {
        let p = logging_bucket_props();
        assert!(p.contains_key("PublicAccessBlockConfiguration"));
        assert!(p.contains_key("OwnershipControls"));
        assert!(p.values().all(Value::is_literal));
    }

    #[test]
    fn trust_policy_names_the_service() {
        let doc = assume_role_policy("lambda.amazonaws.com").to_json(&|n| n.to_string());
        assert_eq!(
            doc["Statement"][0]["Principal"]["Service"],
            serde_json::json!("lambda.amazonaws.com")
        );
    }
}
