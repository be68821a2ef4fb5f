//! The device-action contract.

use async_trait::async_trait;

use mobench_core::ScrollDirection;

use crate::error::{CommandResponse, ControllerError};

/// Synchronous-facing interface to one controllable device.
///
/// Each controller owns exactly one environment. Gesture coordinates are
/// validated against [`screen_size`](DeviceController::screen_size);
/// out-of-range coordinates return [`ControllerError::OutOfBounds`] rather
/// than being clamped. Every method distinguishes transport failure (`Err`)
/// from device-side rejection (`Ok` with `success == false`).
#[async_trait]
pub trait DeviceController: Send + Sync {
    /// Device identifier (e.g. `emulator-5554`).
    fn device_id(&self) -> &str;

    /// Reported screen dimensions in pixels, `(width, height)`.
    fn screen_size(&self) -> (u32, u32);

    // --- Gestures ---

    /// Single tap.
    async fn tap(&self, x: u32, y: u32) -> Result<CommandResponse, ControllerError>;

    /// Double tap.
    async fn double_tap(&self, x: u32, y: u32) -> Result<CommandResponse, ControllerError>;

    /// Long press, with an optional hold duration in milliseconds.
    async fn long_press(
        &self,
        x: u32,
        y: u32,
        duration_ms: Option<u64>,
    ) -> Result<CommandResponse, ControllerError>;

    /// Swipe between two points.
    async fn swipe(
        &self,
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    ) -> Result<CommandResponse, ControllerError>;

    /// Drag between two points (hold, move, release).
    async fn drag(
        &self,
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    ) -> Result<CommandResponse, ControllerError>;

    /// Directional scroll from the screen center.
    async fn scroll(&self, direction: ScrollDirection) -> Result<CommandResponse, ControllerError>;

    // --- Text & keys ---

    /// Type text into the focused field.
    async fn input_text(&self, text: &str) -> Result<CommandResponse, ControllerError>;

    /// Press enter.
    async fn keyboard_enter(&self) -> Result<CommandResponse, ControllerError>;

    /// Hardware back.
    async fn navigate_back(&self) -> Result<CommandResponse, ControllerError>;

    /// Hardware home.
    async fn navigate_home(&self) -> Result<CommandResponse, ControllerError>;

    /// Launch an application by display name.
    async fn open_app(&self, app_name: &str) -> Result<CommandResponse, ControllerError>;

    // --- Observation ---

    /// Capture the current screen as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, ControllerError>;

    /// Run a raw shell command on the device and return stdout.
    /// Verification helpers use this for app-state queries.
    async fn shell(&self, args: &[&str]) -> Result<CommandResponse, ControllerError>;

    // --- Snapshots ---

    /// List saved snapshots.
    async fn list_snapshots(&self) -> Result<Vec<String>, ControllerError>;

    /// Save the current device state under a name.
    async fn save_snapshot(&self, name: &str) -> Result<CommandResponse, ControllerError>;

    /// Restore a saved snapshot. Runs before every task initialize on a
    /// shared environment to guarantee state isolation.
    async fn load_snapshot(&self, name: &str) -> Result<CommandResponse, ControllerError>;

    /// Delete a saved snapshot.
    async fn delete_snapshot(&self, name: &str) -> Result<CommandResponse, ControllerError>;

    /// Synchronize device clock with the host, so time-sensitive
    /// verification (calendar events, alarms) sees a known baseline.
    async fn sync_time(&self) -> Result<CommandResponse, ControllerError>;

    // --- Interaction cache ---

    /// Record the agent's `answer` text for verification logic to read.
    async fn record_answer(&self, text: &str);

    /// Last recorded `answer` text, if any.
    async fn last_answer(&self) -> Option<String>;

    /// Clear the interaction cache (done on task initialize).
    async fn clear_answers(&self);

    // --- Health ---

    /// Poll until the device responds or the retry budget is exhausted.
    /// Returns `true` when healthy. Used to admit or evict an environment
    /// from the runner pool.
    async fn check_health(&self, retry_budget: u32) -> bool;
}

/// Validate gesture coordinates against screen bounds.
pub(crate) fn check_bounds(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<(), ControllerError> {
    if x >= width || y >= height {
        return Err(ControllerError::OutOfBounds {
            x,
            y,
            width,
            height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_rejects_out_of_range() {
        assert!(check_bounds(10, 10, 1080, 1920).is_ok());
        assert!(matches!(
            check_bounds(1080, 10, 1080, 1920),
            Err(ControllerError::OutOfBounds { .. })
        ));
        assert!(matches!(
            check_bounds(10, 1920, 1080, 1920),
            Err(ControllerError::OutOfBounds { .. })
        ));
    }
}
