//! FrameFit server library.
//!
//! All server-side code for the FrameFit catalog and virtual try-on service.
//!
//! ## Structure
//!
//! - `config` - Process configuration read once at startup
//! - `use_cases/` - Try-on orchestration (reference resolution, pipeline)
//! - `infrastructure/` - External dependency implementations (ports + adapters)
//! - `app` - Application composition

pub mod app;
pub mod config;
pub mod infrastructure;
pub mod prompt_templates;
pub mod use_cases;

/// End-to-end pipeline tests against a real embedded store.
#[cfg(test)]
mod e2e_tests;

pub use app::App;
