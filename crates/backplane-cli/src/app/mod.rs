//! Application-level utilities for the Backplane CLI.
//!
//! This module provides:
//! - Config path resolution and loading
//! - The lazily-initialized application context (backends, registries)

mod context;
mod resolver;

// Re-export public API
pub use context::AppContext;
pub use resolver::resolve_config_path;
