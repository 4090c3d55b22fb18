//! External dependency implementations (ports + adapters).

pub mod fetch;
pub mod gemini;
pub mod http;
pub mod persistence;
pub mod ports;
