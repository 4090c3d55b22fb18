//! User-facing operations orchestrated across the ports.

pub mod resolver;
pub mod tryon;

pub use resolver::{ReferenceRequest, ResolveError, ValidationError};
pub use tryon::{TryOnError, TryOnOutcome, TryOnPipeline, TryOnRequest};
