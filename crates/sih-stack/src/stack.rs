//! The image handler stack
//!
//! A function behind a REST API behind CloudFront, assembled from the
//! front-door pattern with its defaults pruned and replaced: the default
//! method, deployment, stage, usage plan and endpoint output go; a
//! deployment with access logging to the pattern's log group comes in;
//! the distribution gets cache and origin-request policies; the CloudFront
//! log bucket is only created outside opt-in regions. A second,
//! log-less static site distribution serves the demo UI bucket.

use crate::config::StackConfig;
use crate::error::StackResult;
use crate::params::{StackParameters, LOG_RETENTION_PERIOD};
use sih_graph::prelude::*;
use sih_patterns::{
    CloudFrontToApiGatewayToLambda, CloudFrontToApiGatewayToLambdaInputs, CloudFrontToS3,
    CloudFrontToS3Inputs,
};

/// Regions that must be enabled before use; CloudFront cannot deliver
/// standard logs to buckets there
pub const OPT_IN_REGIONS: [&str; 4] = ["af-south-1", "ap-east-1", "eu-south-1", "me-south-1"];

const ACCESS_LOG_FORMAT: &str = "$context.identity.sourceIp $context.identity.caller \
$context.identity.user [$context.requestTime] \"$context.httpMethod $context.resourcePath \
$context.protocol\" $context.status $context.responseLength $context.requestId";

/// Resources and outputs a deployment would create, in template order
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RenderSummary {
    /// Logical ids of the emitted resources
    pub resources: Vec<String>,
    /// Logical ids of the emitted outputs
    pub outputs: Vec<String>,
}

/// Handles of the nodes other code may want to adjust after [`ImageHandlerStack::build`]
#[derive(Debug, Clone)]
pub struct ImageHandlerResources {
    /// Declared template parameters
    pub parameters: StackParameters,
    /// Execution role of the function
    pub function_role: NodeRef,
    /// The image handler function
    pub function: NodeRef,
    /// REST API fronting the function
    pub api: NodeRef,
    /// API Gateway account settings (CloudWatch role)
    pub account_config: NodeRef,
    /// Deployment with access logging
    pub deployment: NodeRef,
    /// CloudFront log bucket, only created outside opt-in regions
    pub logs_bucket: NodeRef,
    /// The image handler distribution
    pub distribution: NodeRef,
    /// The CloudFront → API Gateway → Lambda instance
    pub front_door: PatternInstance,
    /// The demo UI site
    pub static_site: PatternInstance,
}

/// Stack definition: environment, description and the REST API body
#[derive(Debug, Clone)]
pub struct ImageHandlerStack {
    context: StackContext,
    description: String,
    api_body: serde_json::Value,
}

struct Conditions {
    enable_signature: ConditionRef,
    is_not_opt_in: ConditionRef,
}

impl ImageHandlerStack {
    /// Stack for `context` serving `api_body`
    #[must_use]
    pub fn new(context: StackContext, api_body: serde_json::Value) -> Self {
        Self {
            context,
            description: StackConfig::default().description,
            api_body,
        }
    }

    /// Stack described by a loaded configuration
    ///
    /// # Errors
    ///
    /// `Config` when the configured API definition cannot be read.
    pub fn from_config(config: &StackConfig) -> StackResult<Self> {
        Ok(Self::new(config.to_context(), config.api_body()?).with_description(&config.description))
    }

    /// Replace the template description
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Fresh builder carrying this stack's context and description
    #[must_use]
    pub fn builder(&self) -> GraphBuilder {
        GraphBuilder::new(self.context.clone()).with_description(&self.description)
    }

    /// Build and finalize
    ///
    /// # Errors
    ///
    /// The first build or assembly error.
    pub fn assemble(&self) -> StackResult<Template> {
        let mut builder = self.builder();
        self.build(&mut builder)?;
        Ok(builder.finalize()?)
    }

    /// Assemble and evaluate the template for one deployment
    ///
    /// # Errors
    ///
    /// `Build` when assembly fails, `Render` when a condition cannot be
    /// evaluated in `env`.
    pub fn render(&self, env: &DeployEnvironment) -> StackResult<RenderSummary> {
        let template = self.assemble()?;
        let renderer = Renderer::new(&template, env)?;
        let owned =
            |ids: Vec<&str>| -> Vec<String> { ids.into_iter().map(str::to_string).collect() };
        Ok(RenderSummary {
            resources: owned(renderer.emitted_resources()),
            outputs: owned(renderer.emitted_outputs()),
        })
    }

    /// Declare the whole stack on `b` without finalizing
    ///
    /// # Errors
    ///
    /// The first builder operation that fails.
    pub fn build(&self, b: &mut GraphBuilder) -> BuildResult<ImageHandlerResources> {
        let parameters = StackParameters::declare(b)?;
        let conditions = define_conditions(b)?;

        let function_role = function_role(b)?;
        let policy = b.create(
            ResourceKind::IamPolicy,
            "ImageHandlerPolicy",
            props([
                ("PolicyDocument", self.function_policy_document()),
                (
                    "PolicyName",
                    Value::join([self.context.stack_name(), "ImageHandlerPolicy".into()]),
                ),
                ("Roles", Value::list([Value::Ref(function_role)])),
            ]),
        )?;
        b.suppress(policy, "W12", "rekognition:DetectFaces requires '*' resources.")?;

        let function = self.function(b, function_role, &parameters)?;
        let function_logs = b.create(
            ResourceKind::LogGroup,
            "ImageHandlerLogGroup",
            props([
                (
                    "LogGroupName",
                    Value::join(["/aws/lambda/".into(), Value::Ref(function)]),
                ),
                ("RetentionInDays", Value::param(LOG_RETENTION_PERIOD)),
            ]),
        )?;
        b.suppress(function_logs, "W84", "Used to store store function info")?;

        let front_door = b.instantiate(
            &CloudFrontToApiGatewayToLambda,
            "CloudFrontApiGatewayLambda",
            &CloudFrontToApiGatewayToLambdaInputs {
                existing_function: function,
                insert_http_security_headers: false,
            },
        )?;

        let api_logs = front_door.node("ApiAccessLogGroup")?;
        b.set_logical_id(api_logs, "ApiLogs")?;
        suppress_all(
            b,
            api_logs,
            &[
                ("W84", "Used to store store api log info, not using kms"),
                ("W86", "Log retention specified in CloudFromation parameters."),
            ],
        )?;

        for child in ["Endpoint", "UsagePlan", "Deployment", "Default", "DeploymentStage.prod"] {
            b.remove(front_door.handle(), child)?;
        }

        let api = front_door.node("RestApi")?;
        b.merge_properties(
            api,
            props([
                ("Body", self.api_body.clone().into()),
                ("Name", "ServerlessImageHandler".into()),
            ]),
        )?;
        b.set_logical_id(api, "ImageHandlerApi")?;

        b.create(
            ResourceKind::LambdaPermission,
            "ImageHandlerPermission",
            props([
                ("Action", "lambda:InvokeFunction".into()),
                ("FunctionName", Value::get_att(function, "Arn")),
                ("Principal", "apigateway.amazonaws.com".into()),
                (
                    "SourceArn",
                    self.context
                        .regional_arn("execute-api", [Value::Ref(api), "/*/*/*".into()]),
                ),
            ]),
        )?;

        b.set_logical_id(front_door.node("CloudWatchRole")?, "ApiLoggingRole")?;
        let account_config = front_door.node("LambdaRestApiAccount")?;
        b.set_logical_id(account_config, "ApiAccountConfig")?;

        let deployment = b.create(
            ResourceKind::ApiDeployment,
            "ImageHandlerApiDeployment",
            props([
                ("RestApiId", Value::Ref(api)),
                (
                    "StageDescription",
                    Value::map([(
                        "AccessLogSetting",
                        Value::map([
                            ("DestinationArn", Value::get_att(api_logs, "Arn")),
                            ("Format", ACCESS_LOG_FORMAT.into()),
                        ]),
                    )]),
                ),
                ("StageName", "image".into()),
            ]),
        )?;
        b.suppress(deployment, "W68", "The solution does not require the usage plan.")?;
        b.add_dependency(deployment, account_config)?;

        let logs_bucket = front_door.node("CloudFrontToApiGateway/CloudfrontLoggingBucket")?;
        b.attach_condition(logs_bucket, &conditions.is_not_opt_in)?;
        b.suppress(logs_bucket, "W35", "Used to store access logs for other buckets")?;
        b.set_logical_id(logs_bucket, "Logs")?;

        let logs_policy =
            front_door.node("CloudFrontToApiGateway/CloudfrontLoggingBucket/Policy")?;
        b.attach_condition(logs_policy, &conditions.is_not_opt_in)?;
        b.set_logical_id(logs_policy, "LogsBucketPolicy")?;

        let distribution = self.distribution(b, &front_door, api, logs_bucket, &conditions)?;
        let static_site = static_site(b)?;

        let secrets_policy = b.create(
            ResourceKind::IamPolicy,
            "SecretsManagerPolicy",
            props([
                (
                    "PolicyDocument",
                    policy_document([statement(
                        &["secretsmanager:GetSecretValue"],
                        [self.context.regional_arn(
                            "secretsmanager",
                            [
                                "secret:".into(),
                                parameters.secrets_manager_secret.clone(),
                                "*".into(),
                            ],
                        )],
                    )]),
                ),
                (
                    "PolicyName",
                    Value::join([self.context.stack_name(), "SecretsManagerPolicy".into()]),
                ),
                ("Roles", Value::list([Value::Ref(function_role)])),
            ]),
        )?;
        b.attach_condition(secrets_policy, &conditions.enable_signature)?;

        outputs(b, distribution, &parameters)?;

        tracing::info!(
            live = b.live_count(),
            parameters = b.parameters().count(),
            "image handler stack declared"
        );
        Ok(ImageHandlerResources {
            parameters,
            function_role,
            function,
            api,
            account_config,
            deployment,
            logs_bucket,
            distribution,
            front_door,
            static_site,
        })
    }

    fn function_policy_document(&self) -> Value {
        let ctx = &self.context;
        policy_document([
            statement(
                &["logs:CreateLogStream", "logs:CreateLogGroup", "logs:PutLogEvents"],
                [ctx.regional_arn("logs", ["log-group:/aws/lambda/*".into()])],
            ),
            statement(
                &["s3:GetObject", "s3:PutObject", "s3:ListBucket"],
                [ctx.global_arn("s3", ["*".into()])],
            ),
            statement(
                &["rekognition:DetectFaces", "rekognition:DetectModerationLabels"],
                ["*".into()],
            ),
        ])
    }

    fn function(
        &self,
        b: &mut GraphBuilder,
        role: NodeRef,
        p: &StackParameters,
    ) -> BuildResult<NodeRef> {
        let ctx = &self.context;
        let variables = Value::map([
            ("AUTO_WEBP", p.auto_webp.clone()),
            ("CORS_ENABLED", p.cors_enabled.clone()),
            ("CORS_ORIGIN", p.cors_origin.clone()),
            ("SOURCE_BUCKETS", p.source_buckets.clone()),
            ("REWRITE_MATCH_PATTERN", "".into()),
            ("REWRITE_SUBSTITUTION", "".into()),
            ("ENABLE_SIGNATURE", p.enable_signature.clone()),
            ("SECRETS_MANAGER", p.secrets_manager_secret.clone()),
            ("SECRET_KEY", p.secrets_manager_key.clone()),
            ("ENABLE_DEFAULT_FALLBACK_IMAGE", p.enable_default_fallback_image.clone()),
            ("DEFAULT_FALLBACK_IMAGE_BUCKET", p.fallback_image_bucket.clone()),
            ("DEFAULT_FALLBACK_IMAGE_KEY", p.fallback_image_key.clone()),
        ]);
        let function = b.create(
            ResourceKind::LambdaFunction,
            "ImageHandlerFunction",
            props([
                (
                    "Code",
                    Value::map([
                        (
                            "S3Bucket",
                            Value::join([
                                format!("{}-", ctx.code_bucket()).into(),
                                ctx.region(),
                            ]),
                        ),
                        ("S3Key", ctx.code_key("image-handler.zip").into()),
                    ]),
                ),
                (
                    "Description",
                    "Serverless Image Handler - Function for performing image edits and \
                     manipulations."
                        .into(),
                ),
                ("Environment", Value::map([("Variables", variables)])),
                ("Handler", "index.handler".into()),
                ("MemorySize", 1024u32.into()),
                ("Role", Value::get_att(role, "Arn")),
                ("Runtime", "nodejs12.x".into()),
                ("Timeout", 30u32.into()),
            ]),
        )?;
        b.suppress(
            function,
            "W58",
            "False alarm: The Lambda function does have the permission to write CloudWatch Logs.",
        )?;
        Ok(function)
    }

    fn distribution(
        &self,
        b: &mut GraphBuilder,
        front_door: &PatternInstance,
        api: NodeRef,
        logs_bucket: NodeRef,
        conditions: &Conditions,
    ) -> BuildResult<NodeRef> {
        let ctx = &self.context;
        let cache_key = Value::map([
            ("CookiesConfig", Value::map([("CookieBehavior", "none".into())])),
            ("EnableAcceptEncodingGzip", true.into()),
            (
                "HeadersConfig",
                Value::map([
                    ("HeaderBehavior", "whitelist".into()),
                    ("Headers", Value::strings(["origin", "accept"])),
                ]),
            ),
            (
                "QueryStringsConfig",
                Value::map([
                    ("QueryStringBehavior", "whitelist".into()),
                    ("QueryStrings", Value::strings(["signature"])),
                ]),
            ),
        ]);
        let cache_policy = b.create(
            ResourceKind::CachePolicy,
            "ImageHandlerCachePolicy",
            props([(
                "CachePolicyConfig",
                Value::map([
                    ("DefaultTTL", 86_400u32.into()),
                    ("MaxTTL", 31_536_000u32.into()),
                    ("MinTTL", 1u32.into()),
                    ("Name", stack_scoped_name(ctx, "ImageHandlerCachePolicy")),
                    ("ParametersInCacheKeyAndForwardedToOrigin", cache_key),
                ]),
            )]),
        )?;

        let origin_request_policy = b.create(
            ResourceKind::OriginRequestPolicy,
            "ImageHandlerOriginRequestPolicy",
            props([(
                "OriginRequestPolicyConfig",
                Value::map([
                    ("CookiesConfig", Value::map([("CookieBehavior", "none".into())])),
                    (
                        "HeadersConfig",
                        Value::map([
                            ("HeaderBehavior", "whitelist".into()),
                            ("Headers", Value::strings(["origin", "accept"])),
                        ]),
                    ),
                    ("Name", stack_scoped_name(ctx, "ImageHandlerOriginRequestPolicy")),
                    (
                        "QueryStringsConfig",
                        Value::map([
                            ("QueryStringBehavior", "whitelist".into()),
                            ("QueryStrings", Value::strings(["signature"])),
                        ]),
                    ),
                ]),
            )]),
        )?;

        let error_responses = (500u32..=504).map(|code| {
            Value::map([
                ("ErrorCachingMinTTL", 10u32.into()),
                ("ErrorCode", code.into()),
            ])
        });
        let logging = Value::when(
            &conditions.is_not_opt_in,
            Value::map([
                ("Bucket", Value::get_att(logs_bucket, "RegionalDomainName")),
                ("IncludeCookies", false.into()),
                ("Prefix", "image-handler-cf-logs/".into()),
            ]),
            Value::NoValue,
        );
        let config = Value::map([
            ("Comment", "Image handler distribution".into()),
            ("CustomErrorResponses", Value::list(error_responses)),
            (
                "DefaultCacheBehavior",
                Value::map([
                    ("AllowedMethods", Value::strings(["GET", "HEAD"])),
                    ("CachePolicyId", Value::Ref(cache_policy)),
                    ("OriginRequestPolicyId", Value::Ref(origin_request_policy)),
                    ("TargetOriginId", Value::Ref(api)),
                    ("ViewerProtocolPolicy", "https-only".into()),
                ]),
            ),
            ("Enabled", true.into()),
            ("HttpVersion", "http2".into()),
            ("Logging", logging),
            (
                "Origins",
                Value::list([Value::map([
                    (
                        "CustomOriginConfig",
                        Value::map([
                            ("HTTPSPort", 443u32.into()),
                            ("OriginProtocolPolicy", "https-only".into()),
                            ("OriginSSLProtocols", Value::strings(["TLSv1.1", "TLSv1.2"])),
                        ]),
                    ),
                    (
                        "DomainName",
                        Value::join([
                            Value::Ref(api),
                            ".execute-api.".into(),
                            ctx.region(),
                            ".amazonaws.com".into(),
                        ]),
                    ),
                    ("Id", Value::Ref(api)),
                    ("OriginPath", "/image".into()),
                ])]),
            ),
            ("PriceClass", "PriceClass_All".into()),
        ]);

        let distribution = front_door.node("CloudFrontToApiGateway/CloudFrontDistribution")?;
        b.override_properties(distribution, props([("DistributionConfig", config)]))?;
        b.set_logical_id(distribution, "ImageHandlerDistribution")?;
        Ok(distribution)
    }
}

fn define_conditions(b: &mut GraphBuilder) -> BuildResult<Conditions> {
    use crate::params::{CORS_ENABLED, ENABLE_DEFAULT_FALLBACK_IMAGE, ENABLE_SIGNATURE};

    let conditions = b.conditions_mut()?;
    conditions.equals("EnableCorsCondition", Operand::param(CORS_ENABLED), "Yes")?;
    let enable_signature =
        conditions.equals("EnableSignatureCondition", Operand::param(ENABLE_SIGNATURE), "Yes")?;
    conditions.equals(
        "EnableDefaultFallbackImageCondition",
        Operand::param(ENABLE_DEFAULT_FALLBACK_IMAGE),
        "Yes",
    )?;
    let is_opt_in = conditions.define(
        "IsOptInRegion",
        ConditionExpr::or(
            OPT_IN_REGIONS
                .iter()
                .map(|region| ConditionExpr::equals(*region, Pseudo::Region)),
        ),
    )?;
    let is_not_opt_in = conditions.negate("IsNotOptInRegion", &is_opt_in)?;
    Ok(Conditions {
        enable_signature,
        is_not_opt_in,
    })
}

fn function_role(b: &mut GraphBuilder) -> BuildResult<NodeRef> {
    let ctx = b.context().clone();
    let role = b.create(
        ResourceKind::IamRole,
        "ImageHandlerFunctionRole",
        props([
            (
                "AssumeRolePolicyDocument",
                policy_document([Value::map([
                    ("Action", "sts:AssumeRole".into()),
                    ("Effect", "Allow".into()),
                    (
                        "Principal",
                        Value::map([("Service", "lambda.amazonaws.com".into())]),
                    ),
                ])]),
            ),
            ("Path", "/".into()),
            (
                "RoleName",
                Value::join([
                    ctx.stack_name(),
                    "ImageHandlerFunctionRole-".into(),
                    ctx.region(),
                ]),
            ),
        ]),
    )?;
    b.suppress(
        role,
        "W28",
        "Resource name validated and found to pose no risk to updates that require \
         replacement of this resource.",
    )?;
    Ok(role)
}

/// Demo UI bucket behind its own distribution, without access logging
fn static_site(b: &mut GraphBuilder) -> BuildResult<PatternInstance> {
    let site = b.instantiate(
        &CloudFrontToS3,
        "CloudFrontToS3",
        &CloudFrontToS3Inputs {
            versioned: false,
            website_index_document: Some("index.html".into()),
            website_error_document: Some("index.html".into()),
            access_control: Some("Private".into()),
            insert_http_security_headers: false,
        },
    )?;
    b.remove_property(site.node("S3Bucket")?, "LoggingConfiguration")?;
    b.remove_property_at(
        site.node("CloudFrontDistribution")?,
        "DistributionConfig.Logging",
    )?;
    b.remove(site.handle(), "S3LoggingBucket")?;
    b.remove(site.handle(), "CloudfrontLoggingBucket")?;
    Ok(site)
}

fn outputs(
    b: &mut GraphBuilder,
    distribution: NodeRef,
    p: &StackParameters,
) -> BuildResult<()> {
    let outputs = [
        (
            "ApiEndpoint",
            Value::join([
                "https://".into(),
                Value::get_att(distribution, "DomainName"),
            ]),
            "Link to API endpoint for sending image requests to.",
        ),
        (
            "SourceBuckets",
            p.source_buckets.clone(),
            "Amazon S3 bucket location containing original image files.",
        ),
        (
            "CorsEnabled",
            p.cors_enabled.clone(),
            "Indicates whether Cross-Origin Resource Sharing (CORS) has been enabled for \
             the image handler API.",
        ),
        (
            "LogRetentionPeriod",
            p.log_retention_period.clone(),
            "Number of days for event logs from Lambda to be retained in CloudWatch.",
        ),
    ];
    for (name, value, description) in outputs {
        b.create(
            ResourceKind::Output,
            name,
            props([("Description", description.into()), ("Value", value)]),
        )?;
    }
    Ok(())
}

fn suppress_all(b: &mut GraphBuilder, node: NodeRef, rules: &[(&str, &str)]) -> BuildResult<()> {
    for (id, reason) in rules {
        b.suppress(node, id, reason)?;
    }
    Ok(())
}

fn statement<const N: usize, R>(actions: &[&str; N], resources: R) -> Value
where
    R: IntoIterator<Item = Value>,
{
    Value::map([
        ("Action", Value::strings(actions.iter().copied())),
        ("Effect", "Allow".into()),
        ("Resource", Value::list(resources)),
    ])
}

fn policy_document<I: IntoIterator<Item = Value>>(statements: I) -> Value {
    Value::map([
        ("Statement", Value::list(statements)),
        ("Version", "2012-10-17".into()),
    ])
}

fn stack_scoped_name(ctx: &StackContext, suffix: &str) -> Value {
    Value::join([
        ctx.stack_name(),
        "-".into(),
        ctx.region(),
        format!("-{suffix}").into(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stack() -> ImageHandlerStack {
        ImageHandlerStack::new(
            StackContext::new("solutions", "serverless-image-handler", "v5.1.0"),
            serde_json::json!({ "openapi": "3.0.1" }),
        )
    }

    #[test]
    fn statements_list_actions_and_resources() {
        let s = statement(&["s3:GetObject"], ["*".into()]).to_json(&|n| n.to_string());
        assert_eq!(
            s,
            serde_json::json!({ "Action": ["s3:GetObject"], "Effect": "Allow", "Resource": ["*"] })
        );
    }

    #[test]
    fn opt_in_conditions_are_registered() {
        let s = stack();
        let mut b = s.builder();
        s.build(&mut b).unwrap();
        let names: Vec<&str> = b.conditions().iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "EnableCorsCondition",
                "EnableSignatureCondition",
                "EnableDefaultFallbackImageCondition",
                "IsOptInRegion",
                "IsNotOptInRegion",
            ]
        );
    }

    #[test]
    fn pruned_front_door_children_are_gone() {
        let s = stack();
        let mut b = s.builder();
        let res = s.build(&mut b).unwrap();
        for child in ["Endpoint", "UsagePlan", "Deployment", "Default", "Default/ApiPermission"] {
            let node = res.front_door.node(child).unwrap();
            assert!(b.node(node).unwrap().is_tombstoned(), "{child} should be removed");
        }
        assert!(!b.node(res.account_config).unwrap().is_tombstoned());
    }

    #[test]
    fn code_location_uses_context() {
        let s = stack();
        let mut b = s.builder();
        let res = s.build(&mut b).unwrap();
        let code = b.node(res.function).unwrap().property("Code").unwrap();
        let json = code.to_json(&|n| n.to_string());
        assert_eq!(json["S3Key"], "serverless-image-handler/v5.1.0/image-handler.zip");
    }
}
