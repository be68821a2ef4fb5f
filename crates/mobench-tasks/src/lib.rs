//! Task definitions and the task lifecycle engine.
//!
//! A benchmark task is anything implementing the [`Task`] capability trait.
//! [`TaskRegistry`] resolves names to constructible tasks per suite family,
//! and [`TaskInstance`] enforces the lifecycle state machine while a task is
//! bound to a device.

pub mod definitions;
pub mod helpers;
pub mod lifecycle;
pub mod registry;
pub mod task;

pub use lifecycle::{LifecycleError, TaskInstance};
pub use registry::{TaskCtor, TaskRegistry};
pub use task::{Task, TaskError};
