//! Core library for fxkit
//!
//! This crate contains the plugin lifecycle orchestrator: sequential and concurrent
//! task execution with outcome aggregation, the three-stage lifecycle pipeline,
//! resource dependency resolution, the project lock, project settings, logging and
//! error handling.

pub mod builtin;
pub mod context;
pub mod dependencies;
pub mod errors;
pub mod executor;
pub mod lifecycle;
pub mod lock;
pub mod logging;
pub mod pipeline;
pub mod plugins;
pub mod settings;
pub mod solution;

// Re-export IndexSet for use by dependent crates (active plugin sets keep insertion order)
pub use indexmap::IndexSet;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
