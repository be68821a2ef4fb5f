//! Scripted in-memory controller for tests.
//!
//! Records every call, returns canned shell output, and can be told to fail
//! health checks or reject commands. No device required.

use std::collections::HashMap;

use tokio::sync::Mutex;

use async_trait::async_trait;
use mobench_core::ScrollDirection;

use crate::error::{CommandResponse, ControllerError};
use crate::traits::{check_bounds, DeviceController};

/// In-memory [`DeviceController`] with scripted responses.
pub struct ScriptedController {
    device: String,
    width: u32,
    height: u32,
    healthy: Mutex<bool>,
    calls: Mutex<Vec<String>>,
    snapshots: Mutex<Vec<String>>,
    shell_responses: Mutex<HashMap<String, String>>,
    answers: Mutex<Vec<String>>,
}

impl ScriptedController {
    /// A healthy 1080x1920 controller.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            width: 1080,
            height: 1920,
            healthy: Mutex::new(true),
            calls: Mutex::new(Vec::new()),
            snapshots: Mutex::new(vec!["default_snapshot".to_string()]),
            shell_responses: Mutex::new(HashMap::new()),
            answers: Mutex::new(Vec::new()),
        }
    }

    /// Canned stdout for a shell command whose joined args start with `prefix`.
    pub async fn script_shell(&self, prefix: impl Into<String>, stdout: impl Into<String>) {
        self.shell_responses
            .lock()
            .await
            .insert(prefix.into(), stdout.into());
    }

    /// Mark the device unhealthy; `check_health` will exhaust its budget.
    pub async fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().await = healthy;
    }

    /// Every call recorded so far, e.g. `"tap 10 20"`.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    /// Number of recorded calls whose description starts with `prefix`.
    pub async fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    async fn record(&self, call: String) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl DeviceController for ScriptedController {
    fn device_id(&self) -> &str {
        &self.device
    }

    fn screen_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn tap(&self, x: u32, y: u32) -> Result<CommandResponse, ControllerError> {
        check_bounds(x, y, self.width, self.height)?;
        self.record(format!("tap {x} {y}")).await;
        Ok(CommandResponse::ok())
    }

    async fn double_tap(&self, x: u32, y: u32) -> Result<CommandResponse, ControllerError> {
        check_bounds(x, y, self.width, self.height)?;
        self.record(format!("double_tap {x} {y}")).await;
        Ok(CommandResponse::ok())
    }

    async fn long_press(
        &self,
        x: u32,
        y: u32,
        duration_ms: Option<u64>,
    ) -> Result<CommandResponse, ControllerError> {
        check_bounds(x, y, self.width, self.height)?;
        self.record(format!("long_press {x} {y} {duration_ms:?}"))
            .await;
        Ok(CommandResponse::ok())
    }

    async fn swipe(
        &self,
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    ) -> Result<CommandResponse, ControllerError> {
        check_bounds(start_x, start_y, self.width, self.height)?;
        check_bounds(end_x, end_y, self.width, self.height)?;
        self.record(format!("swipe {start_x} {start_y} {end_x} {end_y}"))
            .await;
        Ok(CommandResponse::ok())
    }

    async fn drag(
        &self,
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    ) -> Result<CommandResponse, ControllerError> {
        check_bounds(start_x, start_y, self.width, self.height)?;
        check_bounds(end_x, end_y, self.width, self.height)?;
        self.record(format!("drag {start_x} {start_y} {end_x} {end_y}"))
            .await;
        Ok(CommandResponse::ok())
    }

    async fn scroll(&self, direction: ScrollDirection) -> Result<CommandResponse, ControllerError> {
        self.record(format!("scroll {direction:?}")).await;
        Ok(CommandResponse::ok())
    }

    async fn input_text(&self, text: &str) -> Result<CommandResponse, ControllerError> {
        self.record(format!("input_text {text}")).await;
        Ok(CommandResponse::ok())
    }

    async fn keyboard_enter(&self) -> Result<CommandResponse, ControllerError> {
        self.record("keyboard_enter".to_string()).await;
        Ok(CommandResponse::ok())
    }

    async fn navigate_back(&self) -> Result<CommandResponse, ControllerError> {
        self.record("navigate_back".to_string()).await;
        Ok(CommandResponse::ok())
    }

    async fn navigate_home(&self) -> Result<CommandResponse, ControllerError> {
        self.record("navigate_home".to_string()).await;
        Ok(CommandResponse::ok())
    }

    async fn open_app(&self, app_name: &str) -> Result<CommandResponse, ControllerError> {
        self.record(format!("open_app {app_name}")).await;
        Ok(CommandResponse::ok())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ControllerError> {
        self.record("screenshot".to_string()).await;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn shell(&self, args: &[&str]) -> Result<CommandResponse, ControllerError> {
        let joined = args.join(" ");
        self.record(format!("shell {joined}")).await;
        let responses = self.shell_responses.lock().await;
        let stdout = responses
            .iter()
            .find(|(prefix, _)| joined.starts_with(prefix.as_str()))
            .map(|(_, stdout)| stdout.clone())
            .unwrap_or_default();
        Ok(CommandResponse::ok_with(stdout))
    }

    async fn list_snapshots(&self) -> Result<Vec<String>, ControllerError> {
        Ok(self.snapshots.lock().await.clone())
    }

    async fn save_snapshot(&self, name: &str) -> Result<CommandResponse, ControllerError> {
        self.record(format!("save_snapshot {name}")).await;
        self.snapshots.lock().await.push(name.to_string());
        Ok(CommandResponse::ok())
    }

    async fn load_snapshot(&self, name: &str) -> Result<CommandResponse, ControllerError> {
        self.record(format!("load_snapshot {name}")).await;
        Ok(CommandResponse::ok())
    }

    async fn delete_snapshot(&self, name: &str) -> Result<CommandResponse, ControllerError> {
        self.record(format!("delete_snapshot {name}")).await;
        self.snapshots.lock().await.retain(|s| s != name);
        Ok(CommandResponse::ok())
    }

    async fn sync_time(&self) -> Result<CommandResponse, ControllerError> {
        self.record("sync_time".to_string()).await;
        Ok(CommandResponse::ok())
    }

    async fn record_answer(&self, text: &str) {
        self.answers.lock().await.push(text.to_string());
    }

    async fn last_answer(&self) -> Option<String> {
        self.answers.lock().await.last().cloned()
    }

    async fn clear_answers(&self) {
        self.answers.lock().await.clear();
    }

    async fn check_health(&self, _retry_budget: u32) -> bool {
        *self.healthy.lock().await
    }
}
