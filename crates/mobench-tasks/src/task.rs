//! The task capability contract.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use mobench_controller::{ControllerError, DeviceController};
use mobench_core::{EvaluationResult, TaskDescriptor};

/// Errors raised from task setup, verification, or cleanup hooks.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Controller call failed underneath a hook.
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Setup hook could not establish the task's preconditions.
    #[error("Setup failed: {0}")]
    Setup(String),

    /// Verification logic could not run.
    #[error("Verification failed: {0}")]
    Verification(String),
}

/// Capability contract every benchmark task must satisfy.
///
/// Metadata methods are pure; the hooks receive the controller bound to the
/// environment the task runs on. A task definition carries no lifecycle
/// state — the engine wraps it in a
/// [`TaskInstance`](crate::lifecycle::TaskInstance) for that.
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique name within the task's suite family.
    fn name(&self) -> &'static str;

    /// Natural-language goal handed to the agent.
    fn goal(&self) -> &'static str;

    /// Applications the task touches. Non-empty.
    fn app_names(&self) -> BTreeSet<String>;

    /// Classification tags. Non-empty.
    fn tags(&self) -> BTreeSet<String>;

    /// Snapshot to restore before setup; `None` selects the default.
    fn snapshot(&self) -> Option<&'static str> {
        None
    }

    /// Simulated-user reply for `ask_user` actions during this task.
    fn ask_user_reply(&self) -> Option<String> {
        None
    }

    /// Establish task preconditions (inject data, toggle device state).
    /// Returning `Ok(false)` or `Err` marks setup as failed; the action loop
    /// is never entered.
    async fn setup(&mut self, _controller: &dyn DeviceController) -> Result<bool, TaskError> {
        Ok(true)
    }

    /// Read-only completion check. May block on external dependencies; the
    /// engine awaits it either way and normalizes the result.
    async fn check_success(
        &self,
        controller: &dyn DeviceController,
    ) -> Result<EvaluationResult, TaskError>;

    /// Release task-scoped resources. Must be safe to call even when
    /// [`setup`](Task::setup) never ran or failed.
    async fn cleanup(&mut self, _controller: &dyn DeviceController) -> Result<(), TaskError> {
        Ok(())
    }

    /// Immutable descriptor built from the metadata methods.
    fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            name: self.name().to_string(),
            goal: self.goal().to_string(),
            app_names: self.app_names(),
            tags: self.tags(),
            snapshot: self.snapshot().map(str::to_string),
        }
    }
}
