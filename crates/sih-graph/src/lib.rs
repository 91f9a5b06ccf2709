//! SIH Graph (sih-graph)
//!
//! Declarative resource-graph assembly for deployment templates:
//! 1. **Construction**: conditions, nodes, composite patterns, overrides,
//!    dependencies and suppressions are declared through [`GraphBuilder`]
//! 2. **Assembly**: [`GraphBuilder::finalize`] validates the graph and
//!    produces an ordered [`Template`]
//! 3. **Rendering**: [`Renderer`] evaluates conditions for one concrete
//!    deployment environment
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sih_graph::prelude::*;
//!
//! let mut builder = GraphBuilder::new(StackContext::default());
//! let a = builder.conditions_mut()?.equals("A", Pseudo::Region, "x")?;
//! let n1 = builder.create(ResourceKind::Bucket, "N1", props([]))?;
//! builder.attach_condition(n1, &a)?;
//!
//! let template = builder.finalize()?;
//! let env = DeployEnvironment::new().with_region("x");
//! assert!(Renderer::new(&template, &env)?.is_emitted("N1"));
//! ```

pub mod assembler;
pub mod builder;
pub mod condition;
pub mod context;
pub mod dag;
pub mod error;
pub mod node;
pub mod parameter;
pub mod pattern;
pub mod render;
pub mod suppression;
pub mod template;
pub mod value;

// Re-exports
pub use builder::GraphBuilder;
pub use condition::{ConditionExpr, ConditionRef, ConditionRegistry, Operand};
pub use context::StackContext;
pub use error::{BuildError, BuildResult};
pub use node::{NodeRef, ResourceKind, ResourceNode};
pub use parameter::{ParameterSpec, ParameterType};
pub use pattern::{CompositePattern, PatternHandle, PatternInstance, PatternScope};
pub use render::{DeployEnvironment, RenderError, Renderer};
pub use template::{EmittedOutput, EmittedResource, Template};
pub use value::{props, Properties, Pseudo, Value};

/// Everything needed to build and assemble a graph
pub mod prelude {
    pub use crate::builder::GraphBuilder;
    pub use crate::condition::{ConditionExpr, ConditionRef, ConditionRegistry, Operand};
    pub use crate::context::StackContext;
    pub use crate::error::{BuildError, BuildResult};
    pub use crate::node::{NodeRef, ResourceKind};
    pub use crate::parameter::ParameterSpec;
    pub use crate::pattern::{CompositePattern, PatternInstance, PatternScope};
    pub use crate::render::{DeployEnvironment, RenderError, Renderer};
    pub use crate::template::Template;
    pub use crate::value::{props, Properties, Pseudo, Value};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
