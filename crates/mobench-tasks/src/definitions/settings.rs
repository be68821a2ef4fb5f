//! Settings tasks.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::info;

use mobench_controller::DeviceController;
use mobench_core::EvaluationResult;

use crate::task::{Task, TaskError};

/// Enable WiFi on the device.
pub struct WifiEnableTask;

#[async_trait]
impl Task for WifiEnableTask {
    fn name(&self) -> &'static str {
        "WifiEnableTask"
    }

    fn goal(&self) -> &'static str {
        "Turn on WiFi"
    }

    fn app_names(&self) -> BTreeSet<String> {
        ["Settings".to_string()].into()
    }

    fn tags(&self) -> BTreeSet<String> {
        ["lang-en".to_string()].into()
    }

    async fn setup(&mut self, controller: &dyn DeviceController) -> Result<bool, TaskError> {
        // The task starts from a known-off state.
        info!("Disabling WiFi before task start");
        let response = controller.shell(&["svc", "wifi", "disable"]).await?;
        Ok(response.success)
    }

    async fn check_success(
        &self,
        controller: &dyn DeviceController,
    ) -> Result<EvaluationResult, TaskError> {
        let response = controller
            .shell(&["settings", "get", "global", "wifi_on"])
            .await?;

        if !response.success {
            return Err(TaskError::Verification(format!(
                "WiFi state query rejected: {}",
                response.message.unwrap_or_default()
            )));
        }

        match response.message.as_deref().map(str::trim) {
            Some("1") => Ok(EvaluationResult::success("WiFi enabled successfully")),
            _ => Ok(EvaluationResult::failure(
                "WiFi not enabled or task not completed",
            )),
        }
    }
}

/// Set the screen brightness to its maximum value.
pub struct BrightnessTask;

#[async_trait]
impl Task for BrightnessTask {
    fn name(&self) -> &'static str {
        "BrightnessTask"
    }

    fn goal(&self) -> &'static str {
        "Set the screen brightness to maximum"
    }

    fn app_names(&self) -> BTreeSet<String> {
        ["Settings".to_string()].into()
    }

    fn tags(&self) -> BTreeSet<String> {
        ["lang-en".to_string()].into()
    }

    async fn setup(&mut self, controller: &dyn DeviceController) -> Result<bool, TaskError> {
        let response = controller
            .shell(&["settings", "put", "system", "screen_brightness", "64"])
            .await?;
        Ok(response.success)
    }

    async fn check_success(
        &self,
        controller: &dyn DeviceController,
    ) -> Result<EvaluationResult, TaskError> {
        let response = controller
            .shell(&["settings", "get", "system", "screen_brightness"])
            .await?;

        if !response.success {
            return Err(TaskError::Verification(format!(
                "Brightness query rejected: {}",
                response.message.unwrap_or_default()
            )));
        }

        match response.message.as_deref().map(str::trim) {
            Some("255") => Ok(EvaluationResult::success("Brightness at maximum")),
            other => Ok(EvaluationResult::failure(format!(
                "Brightness is {:?}, expected 255",
                other.unwrap_or("unset")
            ))),
        }
    }
}
