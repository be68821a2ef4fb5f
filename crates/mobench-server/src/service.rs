//! Service layer: the §-operations behind the HTTP handlers.
//!
//! Each function owns its locking. Task initialization holds the registry
//! read guard for its entire duration so suite-family switching (registry
//! write) is serialized against it; everything touching one device goes
//! through that device's slot mutex.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use mobench_controller::ControllerError;
use mobench_core::{Action, EvaluationResult, Observation, Screenshot, SuiteFamily, TaskDescriptor};
use mobench_tasks::{LifecycleError, TaskRegistry};

use crate::dispatch::execute_action;
use crate::state::AppState;

/// Errors surfaced by the control-plane operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No task with that name in the current registry.
    #[error("Task not found: {0}")]
    UnknownTask(String),

    /// No device registered under that id.
    #[error("Device not found: {0}")]
    UnknownDevice(String),

    /// A step or lifecycle call arrived with no active task on the device.
    #[error("No active task on device '{0}'")]
    NoActiveTask(String),

    /// A second task was requested while one is active on the device.
    #[error("Device '{device}' is busy running task '{task}'")]
    DeviceBusy { device: String, task: String },

    /// Lifecycle violation or escalated setup failure.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Device transport failure.
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// Outcome of a suite-family switch request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SwitchOutcome {
    /// Whether the switch happened.
    pub switched: bool,

    /// The suite family in effect after the call.
    pub suite_family: String,

    /// Human-readable detail, set on rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}


/// Bind a device: verify it is registered and answering.
pub async fn init_device(state: &Arc<AppState>, device: &str) -> Result<(), ServiceError> {
    let slot = state
        .slot(device)
        .await
        .ok_or_else(|| ServiceError::UnknownDevice(device.to_string()))?;
    let controller = slot.lock().await.controller.clone();
    if !controller.check_health(1).await {
        return Err(ServiceError::Controller(ControllerError::Transport {
            device: device.to_string(),
            message: "device did not answer health probe".to_string(),
        }));
    }
    info!(device = %device, "Device bound");
    Ok(())
}

/// Capture the device screen.
pub async fn screenshot(state: &Arc<AppState>, device: &str) -> Result<Vec<u8>, ServiceError> {
    let slot = state
        .slot(device)
        .await
        .ok_or_else(|| ServiceError::UnknownDevice(device.to_string()))?;
    let controller = slot.lock().await.controller.clone();
    Ok(controller.screenshot().await?)
}

/// Initialize a task on a device.
///
/// Returns `Ok(true)` when the task is initialized and now occupies the
/// device, `Ok(false)` when the setup hook declined.
pub async fn task_init(
    state: &Arc<AppState>,
    device: &str,
    task_name: &str,
) -> Result<bool, ServiceError> {
    // Held for the whole initialize; serializes against suite switching.
    let registry = state.registry.read().await;

    let mut instance = registry
        .get_task(task_name)
        .ok_or_else(|| ServiceError::UnknownTask(task_name.to_string()))?;

    let slot = state
        .slot(device)
        .await
        .ok_or_else(|| ServiceError::UnknownDevice(device.to_string()))?;
    let mut slot = slot.lock().await;

    if let Some(active) = &slot.active {
        if active.phase().is_active() {
            return Err(ServiceError::DeviceBusy {
                device: device.to_string(),
                task: active.descriptor().name.clone(),
            });
        }
    }

    match instance.initialize(slot.controller.as_ref()).await {
        Ok(true) => {
            slot.active = Some(instance);
            info!(device = %device, task = %task_name, "Task initialized");
            Ok(true)
        }
        Ok(false) => {
            warn!(device = %device, task = %task_name, "Task setup declined");
            // The instance never occupies the slot; run its cleanup now.
            instance.tear_down(slot.controller.as_ref()).await;
            Ok(false)
        }
        Err(error) => {
            instance.tear_down(slot.controller.as_ref()).await;
            Err(error.into())
        }
    }
}

/// Evaluate the active task on a device.
pub async fn task_eval(
    state: &Arc<AppState>,
    device: &str,
) -> Result<EvaluationResult, ServiceError> {
    let slot = state
        .slot(device)
        .await
        .ok_or_else(|| ServiceError::UnknownDevice(device.to_string()))?;
    let mut slot = slot.lock().await;
    let controller = slot.controller.clone();
    let instance = slot
        .active
        .as_mut()
        .ok_or_else(|| ServiceError::NoActiveTask(device.to_string()))?;
    Ok(instance.evaluate(controller.as_ref()).await?)
}

/// Tear down the active task on a device. Idempotent: with no active task
/// this is a no-op ack.
pub async fn task_tear_down(state: &Arc<AppState>, device: &str) -> Result<(), ServiceError> {
    let slot = state
        .slot(device)
        .await
        .ok_or_else(|| ServiceError::UnknownDevice(device.to_string()))?;
    let mut slot = slot.lock().await;
    let controller = slot.controller.clone();
    if let Some(mut instance) = slot.active.take() {
        instance.tear_down(controller.as_ref()).await;
    }
    Ok(())
}

/// Execute one action against a device's active task and return the
/// resulting observation: a post-settle screenshot plus whatever the action
/// itself produced (a simulated user reply, for `ask_user`).
pub async fn step(
    state: &Arc<AppState>,
    device: &str,
    action: &Action,
) -> Result<Observation, ServiceError> {
    let slot = state
        .slot(device)
        .await
        .ok_or_else(|| ServiceError::UnknownDevice(device.to_string()))?;
    let mut slot = slot.lock().await;
    let controller = slot.controller.clone();

    let instance = slot
        .active
        .as_mut()
        .ok_or_else(|| ServiceError::NoActiveTask(device.to_string()))?;

    let ask_user_reply = instance.ask_user_reply();
    let outcome = execute_action(
        controller.as_ref(),
        action,
        ask_user_reply,
        state.settle_delay,
    )
    .await?;
    instance.record_step();
    if !outcome.response.success {
        warn!(
            device = %device,
            kind = action.kind(),
            message = ?outcome.response.message,
            "Action rejected by device"
        );
    }

    // Let the UI settle before capturing the screen.
    tokio::time::sleep(state.settle_delay).await;
    let png = controller.screenshot().await?;
    let mut observation = Observation::from_screenshot(Screenshot::from_png(&png));
    if let Some(reply) = outcome.ask_user_response {
        observation = observation.with_ask_user_response(reply);
    }
    Ok(observation)
}

/// Goal text for a registered task.
pub async fn task_goal(state: &Arc<AppState>, task_name: &str) -> Result<String, ServiceError> {
    let registry = state.registry.read().await;
    registry
        .descriptor(task_name)
        .map(|descriptor| descriptor.goal.clone())
        .ok_or_else(|| ServiceError::UnknownTask(task_name.to_string()))
}

/// Descriptor for a registered task.
pub async fn task_metadata(
    state: &Arc<AppState>,
    task_name: &str,
) -> Result<TaskDescriptor, ServiceError> {
    let registry = state.registry.read().await;
    registry
        .descriptor(task_name)
        .cloned()
        .ok_or_else(|| ServiceError::UnknownTask(task_name.to_string()))
}

/// All descriptors in name order.
pub async fn task_list(state: &Arc<AppState>) -> Vec<TaskDescriptor> {
    let registry = state.registry.read().await;
    registry.descriptors().cloned().collect()
}

/// Health of every registered device. True only when all answer.
pub async fn health(state: &Arc<AppState>) -> bool {
    let slots: Vec<_> = state.devices.read().await.values().cloned().collect();
    if slots.is_empty() {
        return false;
    }
    for slot in slots {
        let controller = slot.lock().await.controller.clone();
        if !controller.check_health(1).await {
            return false;
        }
    }
    true
}

/// Switch the active suite family.
///
/// Rejected (without mutating anything) when the target is unknown or any
/// device has an active task. The registry write guard is taken first, so a
/// switch never interleaves with an in-flight task initialization.
pub async fn switch_suite_family(
    state: &Arc<AppState>,
    target: &str,
) -> Result<SwitchOutcome, ServiceError> {
    let current = *state.suite_family.read().await;

    let Ok(target_family) = target.parse::<SuiteFamily>() else {
        return Ok(SwitchOutcome {
            switched: false,
            suite_family: current.to_string(),
            message: Some(format!("unknown suite family: {target}")),
        });
    };

    // Blocks until in-flight task inits release their read guards.
    let mut registry = state.registry.write().await;

    let slots: Vec<_> = state.devices.read().await.values().cloned().collect();
    for slot in slots {
        let slot = slot.lock().await;
        if let Some(active) = &slot.active {
            if active.phase().is_active() {
                warn!(
                    target = %target_family,
                    task = %active.descriptor().name,
                    "Suite switch rejected: device busy"
                );
                return Ok(SwitchOutcome {
                    switched: false,
                    suite_family: current.to_string(),
                    message: Some(format!(
                        "busy: task '{}' is active on device '{}'",
                        active.descriptor().name,
                        slot.controller.device_id()
                    )),
                });
            }
        }
    }

    if target_family == current {
        return Ok(SwitchOutcome {
            switched: false,
            suite_family: current.to_string(),
            message: Some("already on requested suite family".to_string()),
        });
    }

    // Discovery failures at switch time leave the old registry installed.
    let new_registry = match TaskRegistry::discover(target_family) {
        Ok(registry) => registry,
        Err(error) => {
            return Ok(SwitchOutcome {
                switched: false,
                suite_family: current.to_string(),
                message: Some(error.to_string()),
            });
        }
    };

    *registry = new_registry;
    *state.suite_family.write().await = target_family;
    info!(from = %current, to = %target_family, "Suite family switched");

    Ok(SwitchOutcome {
        switched: true,
        suite_family: target_family.to_string(),
        message: None,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use mobench_controller::{DeviceController, ScriptedController};
    use mobench_core::TaskPhase;
    use mobench_tasks::{Task, TaskError};

    use super::*;

    /// Cleanup counters for the fixed-constructor tasks below. Registry
    /// constructors are fn pointers, so the counters have to be statics.
    static DECLINE_CLEANUPS: AtomicU32 = AtomicU32::new(0);
    static EXPLODE_CLEANUPS: AtomicU32 = AtomicU32::new(0);

    struct DecliningTask;

    #[async_trait]
    impl Task for DecliningTask {
        fn name(&self) -> &'static str {
            "DecliningTask"
        }
        fn goal(&self) -> &'static str {
            "Setup always declines"
        }
        fn app_names(&self) -> BTreeSet<String> {
            ["Messages".to_string()].into()
        }
        fn tags(&self) -> BTreeSet<String> {
            ["lang-en".to_string()].into()
        }
        async fn setup(&mut self, _controller: &dyn DeviceController) -> Result<bool, TaskError> {
            Ok(false)
        }
        async fn check_success(
            &self,
            _controller: &dyn DeviceController,
        ) -> Result<EvaluationResult, TaskError> {
            Ok(EvaluationResult::failure("never ran"))
        }
        async fn cleanup(
            &mut self,
            _controller: &dyn DeviceController,
        ) -> Result<(), TaskError> {
            DECLINE_CLEANUPS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ExplodingTask;

    #[async_trait]
    impl Task for ExplodingTask {
        fn name(&self) -> &'static str {
            "ExplodingTask"
        }
        fn goal(&self) -> &'static str {
            "Setup always errors"
        }
        fn app_names(&self) -> BTreeSet<String> {
            ["Messages".to_string()].into()
        }
        fn tags(&self) -> BTreeSet<String> {
            ["lang-en".to_string()].into()
        }
        async fn setup(&mut self, _controller: &dyn DeviceController) -> Result<bool, TaskError> {
            Err(TaskError::Verification("setup blew up".to_string()))
        }
        async fn check_success(
            &self,
            _controller: &dyn DeviceController,
        ) -> Result<EvaluationResult, TaskError> {
            Ok(EvaluationResult::failure("never ran"))
        }
        async fn cleanup(
            &mut self,
            _controller: &dyn DeviceController,
        ) -> Result<(), TaskError> {
            EXPLODE_CLEANUPS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn install_registry(state: &Arc<AppState>, ctors: Vec<mobench_tasks::TaskCtor>) {
        let registry = TaskRegistry::from_ctors(SuiteFamily::AndroidWorld, ctors)
            .expect("test registry");
        *state.registry.write().await = registry;
    }

    async fn state_with_device() -> (Arc<AppState>, Arc<ScriptedController>) {
        let state = AppState::new(SuiteFamily::AndroidWorld).unwrap();
        let controller = Arc::new(ScriptedController::new("emulator-5554"));
        state.register_device(controller.clone()).await;
        (state, controller)
    }

    #[tokio::test]
    async fn test_task_init_eval_teardown_flow() {
        let (state, controller) = state_with_device().await;

        assert!(task_init(&state, "emulator-5554", "SimpleMessageTask")
            .await
            .unwrap());

        // Snapshot restored before the task ran.
        assert_eq!(controller.call_count("load_snapshot").await, 1);

        let result = task_eval(&state, "emulator-5554").await.unwrap();
        assert!(result.score >= 0.0 && result.score <= 1.0);

        task_tear_down(&state, "emulator-5554").await.unwrap();
        let slot = state.slot("emulator-5554").await.unwrap();
        assert!(slot.lock().await.active.is_none());
    }

    #[tokio::test]
    async fn test_step_without_task_rejected() {
        let (state, _) = state_with_device().await;
        let error = step(&state, "emulator-5554", &Action::NavigateHome)
            .await
            .unwrap_err();
        assert!(matches!(error, ServiceError::NoActiveTask(_)));
    }

    #[tokio::test]
    async fn test_step_after_teardown_rejected() {
        let (state, _) = state_with_device().await;
        task_init(&state, "emulator-5554", "SimpleMessageTask")
            .await
            .unwrap();
        step(&state, "emulator-5554", &Action::NavigateHome)
            .await
            .unwrap();
        task_tear_down(&state, "emulator-5554").await.unwrap();

        let error = step(&state, "emulator-5554", &Action::NavigateHome)
            .await
            .unwrap_err();
        assert!(matches!(error, ServiceError::NoActiveTask(_)));
    }

    #[tokio::test]
    async fn test_declined_init_runs_cleanup_and_frees_device() {
        let (state, _) = state_with_device().await;
        install_registry(&state, vec![|| Box::new(DecliningTask)]).await;

        let before = DECLINE_CLEANUPS.load(Ordering::SeqCst);
        let initialized = task_init(&state, "emulator-5554", "DecliningTask")
            .await
            .unwrap();
        assert!(!initialized);
        assert_eq!(DECLINE_CLEANUPS.load(Ordering::SeqCst), before + 1);

        // Nothing occupies the slot afterwards.
        let slot = state.slot("emulator-5554").await.unwrap();
        assert!(slot.lock().await.active.is_none());
    }

    #[tokio::test]
    async fn test_failed_init_runs_cleanup_and_frees_device() {
        let (state, _) = state_with_device().await;
        install_registry(&state, vec![|| Box::new(ExplodingTask)]).await;

        let before = EXPLODE_CLEANUPS.load(Ordering::SeqCst);
        let error = task_init(&state, "emulator-5554", "ExplodingTask")
            .await
            .unwrap_err();
        assert!(matches!(error, ServiceError::Lifecycle(_)));
        assert_eq!(EXPLODE_CLEANUPS.load(Ordering::SeqCst), before + 1);

        let slot = state.slot("emulator-5554").await.unwrap();
        assert!(slot.lock().await.active.is_none());
    }

    #[tokio::test]
    async fn test_second_task_while_busy_rejected() {
        let (state, _) = state_with_device().await;
        task_init(&state, "emulator-5554", "SimpleMessageTask")
            .await
            .unwrap();
        let error = task_init(&state, "emulator-5554", "SimpleAlarmTask")
            .await
            .unwrap_err();
        assert!(matches!(error, ServiceError::DeviceBusy { .. }));
    }

    #[tokio::test]
    async fn test_switch_rejected_while_task_active() {
        let (state, _) = state_with_device().await;
        task_init(&state, "emulator-5554", "SimpleMessageTask")
            .await
            .unwrap();

        let outcome = switch_suite_family(&state, "mobile_world").await.unwrap();
        assert!(!outcome.switched);
        assert!(outcome.message.unwrap().contains("busy"));
        // No registry mutation: the android_world task is still resolvable.
        assert!(task_goal(&state, "SimpleMessageTask").await.is_ok());
    }

    #[tokio::test]
    async fn test_switch_when_idle() {
        let (state, _) = state_with_device().await;
        let outcome = switch_suite_family(&state, "mobile_world").await.unwrap();
        assert!(outcome.switched);
        assert_eq!(outcome.suite_family, "mobile_world");
        assert!(task_goal(&state, "ScheduleLunchViaSmsTask").await.is_ok());
        assert!(task_goal(&state, "SimpleMessageTask").await.is_err());
    }

    #[tokio::test]
    async fn test_switch_unknown_family_rejected_without_mutation() {
        let (state, _) = state_with_device().await;
        let outcome = switch_suite_family(&state, "ios_world").await.unwrap();
        assert!(!outcome.switched);
        assert_eq!(outcome.suite_family, "android_world");
    }

    #[tokio::test]
    async fn test_switch_allowed_after_teardown() {
        let (state, _) = state_with_device().await;
        task_init(&state, "emulator-5554", "SimpleMessageTask")
            .await
            .unwrap();
        task_eval(&state, "emulator-5554").await.unwrap();
        task_tear_down(&state, "emulator-5554").await.unwrap();

        let outcome = switch_suite_family(&state, "mobile_world").await.unwrap();
        assert!(outcome.switched);
    }

    #[tokio::test]
    async fn test_ask_user_step_returns_task_reply() {
        let (state, _) = state_with_device().await;
        switch_suite_family(&state, "mobile_world").await.unwrap();
        task_init(&state, "emulator-5554", "ScheduleLunchViaSmsTask")
            .await
            .unwrap();

        let outcome = step(
            &state,
            "emulator-5554",
            &Action::AskUser {
                text: "Which date is correct?".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(outcome.ask_user_response.unwrap().contains("Oct 17"));
    }

    #[tokio::test]
    async fn test_eval_before_init_is_lifecycle_error() {
        let (state, _) = state_with_device().await;
        // No task active at all.
        let error = task_eval(&state, "emulator-5554").await.unwrap_err();
        assert!(matches!(error, ServiceError::NoActiveTask(_)));
    }

    #[tokio::test]
    async fn test_active_phase_tracked() {
        let (state, _) = state_with_device().await;
        task_init(&state, "emulator-5554", "SimpleMessageTask")
            .await
            .unwrap();
        let slot = state.slot("emulator-5554").await.unwrap();
        let phase = slot.lock().await.active.as_ref().unwrap().phase();
        assert_eq!(phase, TaskPhase::Initialized);
    }

    #[tokio::test]
    async fn test_unknown_device_and_task() {
        let (state, _) = state_with_device().await;
        assert!(matches!(
            task_init(&state, "emulator-9999", "SimpleMessageTask").await,
            Err(ServiceError::UnknownDevice(_))
        ));
        assert!(matches!(
            task_init(&state, "emulator-5554", "NoSuchTask").await,
            Err(ServiceError::UnknownTask(_))
        ));
    }

    #[tokio::test]
    async fn test_health_reflects_device_state() {
        let (state, controller) = state_with_device().await;
        assert!(health(&state).await);
        controller.set_healthy(false).await;
        assert!(!health(&state).await);
    }
}
