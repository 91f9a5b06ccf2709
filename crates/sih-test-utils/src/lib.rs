//! Testing utilities for SIH workspace
//!
//! Shared fixtures and assertions.

#![allow(missing_docs)]

use sih_graph::{DeployEnvironment, StackContext, Template};
use sih_stack::{ImageHandlerStack, StackConfig};

pub const TEST_CODE_BUCKET: &str = "solutions";
pub const TEST_SOLUTION: &str = "serverless-image-handler";
pub const TEST_VERSION: &str = "v5.1.0";

pub fn test_context() -> StackContext {
    StackContext::new(TEST_CODE_BUCKET, TEST_SOLUTION, TEST_VERSION)
}

pub fn sample_api_body() -> serde_json::Value {
    serde_json::json!({
        "openapi": "3.0.1",
        "info": { "title": "ServerlessImageHandler", "version": "1.0" },
        "paths": { "/{proxy+}": { "x-amazon-apigateway-any-method": {} } }
    })
}

pub fn test_stack() -> ImageHandlerStack {
    ImageHandlerStack::new(test_context(), sample_api_body())
        .with_description(&StackConfig::default().description)
}

pub fn assemble_default_template() -> Template {
    test_stack().assemble().unwrap()
}

pub fn deploy_env(region: &str) -> DeployEnvironment {
    DeployEnvironment::new().with_region(region)
}

/// Panics unless `first` is emitted before `second`
pub fn assert_ordered(template: &Template, first: &str, second: &str) {
    let a = template
        .position(first)
        .unwrap_or_else(|| panic!("{first} not in template"));
    let b = template
        .position(second)
        .unwrap_or_else(|| panic!("{second} not in template"));
    assert!(a < b, "{first} (#{a}) should come before {second} (#{b})");
}

/// Logical ids of all resources with the given type
pub fn ids_of_type<'t>(template: &'t Template, type_name: &str) -> Vec<&'t str> {
    template
        .resources()
        .iter()
        .filter(|r| r.type_name() == type_name)
        .map(|r| r.logical_id())
        .collect()
}
