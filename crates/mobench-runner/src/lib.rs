//! Benchmark runner: drives agents through task episodes.
//!
//! [`run_single_task`] owns one episode end to end; [`run_suite`] fans a
//! task list out over a pool of environments and folds the per-task records
//! into a [`RunReport`].

pub mod agent;
pub mod pool;
pub mod report;
pub mod runner;

pub use agent::{Agent, AgentError, Prediction, ReplayAgent};
pub use pool::run_suite;
pub use report::{RunReport, TaskRecord};
pub use runner::{run_single_task, EpisodeOutcome, RunnerConfig};
