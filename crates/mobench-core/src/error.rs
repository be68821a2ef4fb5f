//! Core configuration errors.
//!
//! Configuration errors are fatal at startup: they abort a run before any
//! task executes. Errors scoped to one task or one call live in the crates
//! that own those boundaries.

use thiserror::Error;

/// Startup-fatal configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A suite family key not present in the static table.
    #[error("Unknown suite family: '{0}' (known: mobile_world, android_world)")]
    UnknownSuiteFamily(String),

    /// Two task definitions share one name within a family.
    #[error("Duplicate task name '{name}' in suite family '{family}'")]
    DuplicateTaskName { family: String, name: String },
}
