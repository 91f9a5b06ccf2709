//! Template parameters of the image handler stack

use sih_graph::prelude::*;

pub const CORS_ENABLED: &str = "CorsEnabled";
pub const CORS_ORIGIN: &str = "CorsOrigin";
pub const SOURCE_BUCKETS: &str = "SourceBuckets";
pub const LOG_RETENTION_PERIOD: &str = "LogRetentionPeriod";
pub const AUTO_WEBP: &str = "AutoWebP";
pub const ENABLE_SIGNATURE: &str = "EnableSignature";
pub const SECRETS_MANAGER_SECRET: &str = "SecretsManagerSecret";
pub const SECRETS_MANAGER_KEY: &str = "SecretsManagerKey";
pub const ENABLE_DEFAULT_FALLBACK_IMAGE: &str = "EnableDefaultFallbackImage";
pub const FALLBACK_IMAGE_S3_BUCKET: &str = "FallbackImageS3Bucket";
pub const FALLBACK_IMAGE_S3_KEY: &str = "FallbackImageS3Key";

const RETENTION_DAYS: [u32; 17] = [
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1827, 3653,
];

/// References to the declared parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StackParameters {
    /// `Yes` to return CORS headers
    pub cors_enabled: Value,
    /// Value of `Access-Control-Allow-Origin`
    pub cors_origin: Value,
    /// Buckets the function may read from
    pub source_buckets: Value,
    /// Retention of the function's log group in days
    pub log_retention_period: Value,
    /// `Yes` to convert to WebP when the client accepts it
    pub auto_webp: Value,
    /// `Yes` to require signed requests
    pub enable_signature: Value,
    /// Secrets Manager secret holding the signing key
    pub secrets_manager_secret: Value,
    /// Key of the signing key within the secret
    pub secrets_manager_key: Value,
    /// `Yes` to serve a fallback image on errors
    pub enable_default_fallback_image: Value,
    /// Bucket of the fallback image
    pub fallback_image_bucket: Value,
    /// Key of the fallback image
    pub fallback_image_key: Value,
}

impl StackParameters {
    /// Declare every parameter on `builder`
    ///
    /// # Errors
    ///
    /// `DuplicateParameter` when any of them is already declared.
    pub fn declare(builder: &mut GraphBuilder) -> BuildResult<Self> {
        Ok(Self {
            cors_enabled: builder.declare_parameter(
                ParameterSpec::yes_no(CORS_ENABLED, "No").with_description(
                    "Would you like to enable Cross-Origin Resource Sharing (CORS) for the \
                     image handler API? Select 'Yes' if so.",
                ),
            )?,
            cors_origin: builder.declare_parameter(
                ParameterSpec::string(CORS_ORIGIN).with_default("*").with_description(
                    "If you selected 'Yes' above, please specify an origin value here. A \
                     wildcard (*) value will support any origin.",
                ),
            )?,
            source_buckets: builder.declare_parameter(
                ParameterSpec::string(SOURCE_BUCKETS)
                    .with_default("defaultBucket, bucketNo2, bucketNo3, ...")
                    .with_description(
                        "List the buckets (comma-separated) within your account that contain \
                         original image files.",
                    ),
            )?,
            log_retention_period: builder.declare_parameter(
                ParameterSpec::number(LOG_RETENTION_PERIOD)
                    .with_default(1)
                    .with_allowed_values(RETENTION_DAYS.iter().map(ToString::to_string))
                    .with_description(
                        "This solution automatically logs events to Amazon CloudWatch. Select \
                         the amount of time for CloudWatch logs from this solution to be \
                         retained (in days).",
                    ),
            )?,
            auto_webp: builder.declare_parameter(
                ParameterSpec::yes_no(AUTO_WEBP, "No").with_description(
                    "Would you like to enable automatic WebP based on accept headers?",
                ),
            )?,
            enable_signature: builder.declare_parameter(
                ParameterSpec::yes_no(ENABLE_SIGNATURE, "No")
                    .with_description("Would you like to enable the signature?"),
            )?,
            secrets_manager_secret: builder.declare_parameter(
                ParameterSpec::string(SECRETS_MANAGER_SECRET)
                    .with_default("")
                    .with_description("The name of the secret holding the signature key."),
            )?,
            secrets_manager_key: builder.declare_parameter(
                ParameterSpec::string(SECRETS_MANAGER_KEY)
                    .with_default("")
                    .with_description("The key inside the secret that holds the signature."),
            )?,
            enable_default_fallback_image: builder.declare_parameter(
                ParameterSpec::yes_no(ENABLE_DEFAULT_FALLBACK_IMAGE, "No")
                    .with_description("Would you like to enable the default fallback image?"),
            )?,
            fallback_image_bucket: builder.declare_parameter(
                ParameterSpec::string(FALLBACK_IMAGE_S3_BUCKET)
                    .with_default("")
                    .with_description("The name of the bucket holding the fallback image."),
            )?,
            fallback_image_key: builder.declare_parameter(
                ParameterSpec::string(FALLBACK_IMAGE_S3_KEY)
                    .with_default("")
                    .with_description("The object key of the fallback image."),
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn declares_all_parameters_in_order() {
        let mut b = GraphBuilder::new(StackContext::default());
        let p = StackParameters::declare(&mut b).unwrap();
        assert_eq!(p.log_retention_period, Value::param(LOG_RETENTION_PERIOD));
        let names: Vec<&str> = b.parameters().map(ParameterSpec::name).collect();
        assert_eq!(names.len(), 11);
        assert_eq!(names[0], CORS_ENABLED);
        assert_eq!(names[10], FALLBACK_IMAGE_S3_KEY);
    }

    #[test]
    fn declaring_twice_fails() {
        let mut b = GraphBuilder::new(StackContext::default());
        StackParameters::declare(&mut b).unwrap();
        assert!(matches!(
            StackParameters::declare(&mut b),
            Err(BuildError::DuplicateParameter { .. })
        ));
    }
}
