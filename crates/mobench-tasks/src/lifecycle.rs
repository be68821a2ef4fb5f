//! Task instance lifecycle enforcement.
//!
//! A `TaskInstance` binds one task definition to one environment and walks it
//! through `Uninit -> Initialized -> Evaluated -> TornDown`. Out-of-order
//! calls are rejected; teardown is idempotent.

use thiserror::Error;
use tracing::{info, warn};

use mobench_controller::{ControllerError, DeviceController};
use mobench_core::{EvaluationResult, TaskDescriptor, TaskPhase};

use crate::task::{Task, TaskError};

/// Lifecycle violations and escalated failures during lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// An operation was called in the wrong phase.
    #[error("Cannot {operation} task '{task}' in phase {phase:?}")]
    InvalidPhase {
        task: String,
        operation: &'static str,
        phase: TaskPhase,
    },

    /// Snapshot restore or another pre-setup step failed, so state isolation
    /// cannot be guaranteed.
    #[error("Setup failed for task '{task}': {reason}")]
    Setup { task: String, reason: String },

    /// Transport failure during a lifecycle operation.
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// One running binding of a task definition to an environment.
pub struct TaskInstance {
    task: Box<dyn Task>,
    descriptor: TaskDescriptor,
    phase: TaskPhase,
    steps: u32,
}

impl TaskInstance {
    /// Wrap a task definition; starts in [`TaskPhase::Uninit`].
    pub fn new(task: Box<dyn Task>) -> Self {
        let descriptor = task.descriptor();
        Self {
            task,
            descriptor,
            phase: TaskPhase::Uninit,
            steps: 0,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    /// The descriptor this instance was built from.
    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    /// Goal text for the agent.
    pub fn goal(&self) -> &str {
        &self.descriptor.goal
    }

    /// Number of action steps executed so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Count one executed action step.
    pub fn record_step(&mut self) {
        self.steps += 1;
    }

    /// Simulated-user reply for `ask_user` actions.
    pub fn ask_user_reply(&self) -> Option<String> {
        self.task.ask_user_reply()
    }

    /// Restore the task's snapshot, sync device time, clear the interaction
    /// cache, then run the setup hook.
    ///
    /// Returns `Ok(true)` when the instance is initialized, `Ok(false)` when
    /// the setup hook declined. Transport failures and snapshot rejections
    /// escalate as errors; in every non-`Ok(true)` outcome the instance stays
    /// `Uninit` and must not enter the action loop.
    pub async fn initialize(
        &mut self,
        controller: &dyn DeviceController,
    ) -> Result<bool, LifecycleError> {
        if self.phase != TaskPhase::Uninit {
            return Err(self.invalid_phase("initialize"));
        }

        let snapshot = self.descriptor.snapshot_name();
        info!(task = %self.descriptor.name, %snapshot, "Initializing task");

        let restored = controller.load_snapshot(snapshot).await?;
        if !restored.success {
            return Err(LifecycleError::Setup {
                task: self.descriptor.name.clone(),
                reason: format!(
                    "snapshot '{}' restore rejected: {}",
                    snapshot,
                    restored.message.unwrap_or_default()
                ),
            });
        }

        let synced = controller.sync_time().await?;
        if !synced.success {
            warn!(task = %self.descriptor.name, "Device time sync rejected");
        }

        controller.clear_answers().await;

        match self.task.setup(controller).await {
            Ok(true) => {
                self.phase = TaskPhase::Initialized;
                Ok(true)
            }
            Ok(false) => {
                warn!(task = %self.descriptor.name, "Setup hook declined");
                Ok(false)
            }
            Err(TaskError::Controller(error)) => Err(error.into()),
            Err(error) => Err(LifecycleError::Setup {
                task: self.descriptor.name.clone(),
                reason: error.to_string(),
            }),
        }
    }

    /// Run the task's completion check.
    ///
    /// Only legal once initialized. Verification errors are absorbed here
    /// into a zero score with the error text as reason; they never propagate
    /// past the task boundary.
    pub async fn evaluate(
        &mut self,
        controller: &dyn DeviceController,
    ) -> Result<EvaluationResult, LifecycleError> {
        if self.phase != TaskPhase::Initialized {
            return Err(self.invalid_phase("evaluate"));
        }

        let result = match self.task.check_success(controller).await {
            Ok(result) => result,
            Err(error) => {
                warn!(task = %self.descriptor.name, %error, "Evaluation raised");
                EvaluationResult::failure(error.to_string())
            }
        };

        self.phase = TaskPhase::Evaluated;
        info!(
            task = %self.descriptor.name,
            score = result.score,
            "Task evaluated"
        );
        Ok(result)
    }

    /// Release task-scoped resources. Safe to call from any phase, including
    /// after a failed initialize; a second call is a no-op.
    pub async fn tear_down(&mut self, controller: &dyn DeviceController) {
        if self.phase == TaskPhase::TornDown {
            return;
        }

        if let Err(error) = self.task.cleanup(controller).await {
            warn!(task = %self.descriptor.name, %error, "Cleanup hook failed");
        }
        controller.clear_answers().await;

        self.phase = TaskPhase::TornDown;
        info!(task = %self.descriptor.name, "Task torn down");
    }

    fn invalid_phase(&self, operation: &'static str) -> LifecycleError {
        LifecycleError::InvalidPhase {
            task: self.descriptor.name.clone(),
            operation,
            phase: self.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use mobench_controller::ScriptedController;

    use super::*;

    struct FakeTask {
        setup_ok: bool,
        cleanup_calls: u32,
    }

    impl FakeTask {
        fn boxed(setup_ok: bool) -> Box<dyn Task> {
            Box::new(Self {
                setup_ok,
                cleanup_calls: 0,
            })
        }
    }

    #[async_trait]
    impl Task for FakeTask {
        fn name(&self) -> &'static str {
            "FakeTask"
        }
        fn goal(&self) -> &'static str {
            "Fake goal"
        }
        fn app_names(&self) -> BTreeSet<String> {
            ["Messages".to_string()].into()
        }
        fn tags(&self) -> BTreeSet<String> {
            ["lang-en".to_string()].into()
        }
        async fn setup(&mut self, _controller: &dyn DeviceController) -> Result<bool, TaskError> {
            Ok(self.setup_ok)
        }
        async fn check_success(
            &self,
            _controller: &dyn DeviceController,
        ) -> Result<EvaluationResult, TaskError> {
            Ok(EvaluationResult::success("done"))
        }
        async fn cleanup(
            &mut self,
            _controller: &dyn DeviceController,
        ) -> Result<(), TaskError> {
            self.cleanup_calls += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let controller = ScriptedController::new("emulator-5554");
        let mut instance = TaskInstance::new(FakeTask::boxed(true));

        assert_eq!(instance.phase(), TaskPhase::Uninit);
        assert!(instance.initialize(&controller).await.unwrap());
        assert_eq!(instance.phase(), TaskPhase::Initialized);

        let result = instance.evaluate(&controller).await.unwrap();
        assert!(result.passed());
        assert_eq!(instance.phase(), TaskPhase::Evaluated);

        instance.tear_down(&controller).await;
        assert_eq!(instance.phase(), TaskPhase::TornDown);

        // Snapshot restored before setup.
        assert_eq!(controller.call_count("load_snapshot").await, 1);
        assert_eq!(controller.call_count("sync_time").await, 1);
    }

    #[tokio::test]
    async fn test_evaluate_before_initialize_rejected() {
        let controller = ScriptedController::new("emulator-5554");
        let mut instance = TaskInstance::new(FakeTask::boxed(true));
        let error = instance.evaluate(&controller).await.unwrap_err();
        assert!(matches!(
            error,
            LifecycleError::InvalidPhase {
                operation: "evaluate",
                phase: TaskPhase::Uninit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_setup_decline_keeps_uninit() {
        let controller = ScriptedController::new("emulator-5554");
        let mut instance = TaskInstance::new(FakeTask::boxed(false));
        assert!(!instance.initialize(&controller).await.unwrap());
        assert_eq!(instance.phase(), TaskPhase::Uninit);

        // Teardown is still safe after the failed initialize.
        instance.tear_down(&controller).await;
        assert_eq!(instance.phase(), TaskPhase::TornDown);
    }

    #[tokio::test]
    async fn test_tear_down_idempotent() {
        let controller = ScriptedController::new("emulator-5554");
        let mut instance = TaskInstance::new(FakeTask::boxed(true));
        instance.initialize(&controller).await.unwrap();

        instance.tear_down(&controller).await;
        let calls_after_first = controller.calls().await.len();
        instance.tear_down(&controller).await;
        assert_eq!(controller.calls().await.len(), calls_after_first);
    }

    #[tokio::test]
    async fn test_double_initialize_rejected() {
        let controller = ScriptedController::new("emulator-5554");
        let mut instance = TaskInstance::new(FakeTask::boxed(true));
        instance.initialize(&controller).await.unwrap();
        assert!(matches!(
            instance.initialize(&controller).await,
            Err(LifecycleError::InvalidPhase { .. })
        ));
    }

    #[tokio::test]
    async fn test_step_counter() {
        let mut instance = TaskInstance::new(FakeTask::boxed(true));
        instance.record_step();
        instance.record_step();
        assert_eq!(instance.steps(), 2);
    }
}
