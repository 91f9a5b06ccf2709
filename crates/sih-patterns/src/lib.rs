//! SIH Patterns
//!
//! Composite patterns for the image handler stack. Each pattern builds its
//! children inside a [`sih_graph::PatternScope`] and exposes them by name so
//! the importing stack can prune or override them.
//!
//! - [`CloudFrontToApiGateway`]: distribution in front of a REST API stage
//! - [`CloudFrontToApiGatewayToLambda`]: Lambda-backed REST API plus the
//!   distribution above, nested under `CloudFrontToApiGateway/`
//! - [`CloudFrontToS3`]: distribution serving a private bucket
//!
//! # Example
//!
//! ```rust,ignore
//! use sih_patterns::{CloudFrontToApiGatewayToLambda, CloudFrontToApiGatewayToLambdaInputs};
//!
//! let front = builder.instantiate(
//!     &CloudFrontToApiGatewayToLambda,
//!     "CloudFrontApiGatewayLambda",
//!     &CloudFrontToApiGatewayToLambdaInputs {
//!         existing_function: function,
//!         insert_http_security_headers: false,
//!     },
//! )?;
//! builder.remove(front.handle(), "UsagePlan")?;
//! ```

mod cloudfront_apigateway;
mod cloudfront_apigateway_lambda;
mod cloudfront_s3;
mod common;

pub use cloudfront_apigateway::{CloudFrontToApiGateway, CloudFrontToApiGatewayInputs};
pub use cloudfront_apigateway_lambda::{
    CloudFrontToApiGatewayToLambda, CloudFrontToApiGatewayToLambdaInputs,
};
pub use cloudfront_s3::{CloudFrontToS3, CloudFrontToS3Inputs};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
