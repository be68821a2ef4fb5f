//! MoBench Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Device transport
//! - Runtime specifics
//!
//! All types here represent the core business domain of MoBench: what a
//! benchmark task is, what an agent can do to a device, and what comes back.

pub mod action;
pub mod descriptor;
pub mod error;
pub mod eval;
pub mod observation;
pub mod phase;
pub mod suite;

// Re-export commonly used types
pub use action::{Action, ScrollDirection};
pub use descriptor::{TaskDescriptor, DEFAULT_SNAPSHOT};
pub use error::ConfigError;
pub use eval::EvaluationResult;
pub use observation::{Observation, Screenshot, ToolCallResult};
pub use phase::TaskPhase;
pub use suite::SuiteFamily;
