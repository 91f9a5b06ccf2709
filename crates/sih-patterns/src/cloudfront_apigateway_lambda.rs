//! CloudFront in front of a Lambda-backed REST API

use crate::cloudfront_apigateway::{CloudFrontToApiGateway, CloudFrontToApiGatewayInputs};
use crate::common::assume_role_policy;
use sih_graph::prelude::*;

const ACCESS_LOG_FORMAT: &str = "$context.identity.sourceIp $context.identity.caller \
$context.identity.user [$context.requestTime] \"$context.httpMethod $context.resourcePath \
$context.protocol\" $context.status $context.responseLength $context.requestId";

/// Inputs of [`CloudFrontToApiGatewayToLambda`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudFrontToApiGatewayToLambdaInputs {
    /// Function the REST API proxies to
    pub existing_function: NodeRef,
    /// Attach a viewer-response function setting security headers
    pub insert_http_security_headers: bool,
}

/// REST API proxying every request to a function, fronted by CloudFront
///
/// Exposed children:
///
/// | name | kind |
/// |---|---|
/// | `ApiAccessLogGroup` | log group for stage access logs |
/// | `RestApi` | the REST API |
/// | `CloudWatchRole` | role API Gateway logs with |
/// | `LambdaRestApiAccount` | account-level logging config |
/// | `Default` | the `ANY /` proxy method |
/// | `Default/ApiPermission` | invoke permission for the method |
/// | `Deployment` | initial deployment |
/// | `DeploymentStage.prod` | `prod` stage |
/// | `UsagePlan` | usage plan bound to the stage |
/// | `Endpoint` | output with the stage URL |
/// | `CloudFrontToApiGateway/*` | children of the nested distribution pattern |
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudFrontToApiGatewayToLambda;

impl CompositePattern for CloudFrontToApiGatewayToLambda {
    type Inputs = CloudFrontToApiGatewayToLambdaInputs;

    fn kind(&self) -> &'static str {
        "cloudfront-apigateway-lambda"
    }

    fn build(&self, scope: &mut PatternScope<'_>, inputs: &Self::Inputs) -> BuildResult<()> {
        let ctx = scope.context();
        let function = inputs.existing_function;

        let log_group = scope.create_exposed(ResourceKind::LogGroup, "ApiAccessLogGroup", props([]))?;

        let rest_api = scope.create_exposed(
            ResourceKind::RestApi,
            "RestApi",
            props([
                (
                    "EndpointConfiguration",
                    Value::map([("Types", Value::strings(["EDGE"]))]),
                ),
                ("Name", "LambdaRestApi".into()),
            ]),
        )?;

        let logs_arn = ctx.regional_arn("logs", ["*".into()]);
        let cloudwatch_role = scope.create_exposed(
            ResourceKind::IamRole,
            "CloudWatchRole",
            props([
                ("AssumeRolePolicyDocument", assume_role_policy("apigateway.amazonaws.com")),
                (
                    "Policies",
                    Value::list([Value::map([
                        ("PolicyName", "LambdaRestApiCloudWatchRolePolicy".into()),
                        (
                            "PolicyDocument",
                            Value::map([
                                (
                                    "Statement",
                                    Value::list([Value::map([
                                        (
                                            "Action",
                                            Value::strings([
                                                "logs:CreateLogGroup",
                                                "logs:CreateLogStream",
                                                "logs:DescribeLogGroups",
                                                "logs:DescribeLogStreams",
                                                "logs:PutLogEvents",
                                                "logs:GetLogEvents",
                                                "logs:FilterLogEvents",
                                            ]),
                                        ),
                                        ("Effect", "Allow".into()),
                                        ("Resource", logs_arn),
                                    ])]),
                                ),
                                ("Version", "2012-10-17".into()),
                            ]),
                        ),
                    ])]),
                ),
            ]),
        )?;

        let account = scope.create_exposed(
            ResourceKind::ApiAccount,
            "LambdaRestApiAccount",
            props([("CloudWatchRoleArn", Value::get_att(cloudwatch_role, "Arn"))]),
        )?;
        scope.add_dependency(account, rest_api)?;

        let invocation_uri = Value::join([
            "arn:".into(),
            ctx.partition(),
            ":apigateway:".into(),
            ctx.region(),
            ":lambda:path/2015-03-31/functions/".into(),
            Value::get_att(function, "Arn"),
            "/invocations".into(),
        ]);
        let method = scope.create_exposed(
            ResourceKind::ApiMethod,
            "Default",
            props([
                ("AuthorizationType", "NONE".into()),
                ("HttpMethod", "ANY".into()),
                (
                    "Integration",
                    Value::map([
                        ("IntegrationHttpMethod", "POST".into()),
                        ("Type", "AWS_PROXY".into()),
                        ("Uri", invocation_uri),
                    ]),
                ),
                ("ResourceId", Value::get_att(rest_api, "RootResourceId")),
                ("RestApiId", Value::Ref(rest_api)),
            ]),
        )?;
        scope.create_exposed(
            ResourceKind::LambdaPermission,
            "Default/ApiPermission",
            props([
                ("Action", "lambda:InvokeFunction".into()),
                ("FunctionName", Value::get_att(function, "Arn")),
                ("Principal", "apigateway.amazonaws.com".into()),
                (
                    "SourceArn",
                    ctx.regional_arn("execute-api", [Value::Ref(rest_api), "/*/*/".into()]),
                ),
            ]),
        )?;

        let deployment = scope.create_exposed(
            ResourceKind::ApiDeployment,
            "Deployment",
            props([
                ("Description", "Automatically created by the RestApi construct".into()),
                ("RestApiId", Value::Ref(rest_api)),
            ]),
        )?;
        scope.add_dependency(deployment, method)?;

        let stage = scope.create_exposed(
            ResourceKind::ApiStage,
            "DeploymentStage.prod",
            props([
                (
                    "AccessLogSetting",
                    Value::map([
                        ("DestinationArn", Value::get_att(log_group, "Arn")),
                        ("Format", ACCESS_LOG_FORMAT.into()),
                    ]),
                ),
                ("DeploymentId", Value::Ref(deployment)),
                (
                    "MethodSettings",
                    Value::list([Value::map([
                        ("DataTraceEnabled", false.into()),
                        ("HttpMethod", "*".into()),
                        ("LoggingLevel", "INFO".into()),
                        ("ResourcePath", "/*".into()),
                    ])]),
                ),
                ("RestApiId", Value::Ref(rest_api)),
                ("StageName", "prod".into()),
            ]),
        )?;
        scope.add_dependency(stage, account)?;

        scope.create_exposed(
            ResourceKind::UsagePlan,
            "UsagePlan",
            props([(
                "ApiStages",
                Value::list([Value::map([
                    ("ApiId", Value::Ref(rest_api)),
                    ("Stage", Value::Ref(stage)),
                ])]),
            )]),
        )?;

        scope.create_exposed(
            ResourceKind::Output,
            "Endpoint",
            props([(
                "Value",
                Value::join([
                    "https://".into(),
                    Value::Ref(rest_api),
                    ".execute-api.".into(),
                    ctx.region(),
                    ".".into(),
                    ctx.url_suffix(),
                    "/".into(),
                    Value::Ref(stage),
                    "/".into(),
                ]),
            )]),
        )?;

        let front = scope.instantiate(
            &CloudFrontToApiGateway,
            "CloudFrontToApiGateway",
            &CloudFrontToApiGatewayInputs {
                rest_api,
                stage,
                insert_http_security_headers: inputs.insert_http_security_headers,
            },
        )?;
        scope.expose_nested(&front);

        tracing::debug!(path = scope.path(), "cloudfront to api gateway to lambda built");
        Ok(())
    }
}
