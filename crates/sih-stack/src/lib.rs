//! SIH Stack
//!
//! The serverless image handler stack on top of `sih-graph` and
//! `sih-patterns`:
//!
//! - [`StackConfig`]: build-time settings from TOML plus environment overrides
//! - [`StackParameters`]: the template parameters operators fill in at deploy time
//! - [`ImageHandlerStack`]: builds and assembles the template
//! - [`ImageUpload`]: writes base64 images to an [`ObjectStore`]
//!
//! # Example
//!
//! ```rust,ignore
//! use sih_stack::{ImageHandlerStack, StackConfig};
//!
//! let config = StackConfig::load("sih.toml".as_ref())?;
//! let template = ImageHandlerStack::from_config(&config)?.assemble()?;
//! println!("{}", template.to_string_pretty()?);
//! ```

pub mod config;
pub mod error;
pub mod params;
pub mod stack;
pub mod upload;

pub use config::{ConfigError, StackConfig};
pub use error::{StackError, StackResult};
pub use params::StackParameters;
pub use stack::{ImageHandlerResources, ImageHandlerStack, RenderSummary, OPT_IN_REGIONS};
pub use upload::{
    DirectoryObjectStore, ImageUpload, MemoryObjectStore, ObjectStore, PutObjectRequest,
    UploadError,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
