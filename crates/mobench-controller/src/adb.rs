//! ADB-backed controller for one emulator instance.
//!
//! Every call shells out to the `adb` binary with a per-call timeout.
//! Non-zero exit codes are device-side rejections; spawn failures and
//! timeouts are transport errors.

use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use async_trait::async_trait;
use mobench_core::ScrollDirection;

use crate::error::{CommandResponse, ControllerError};
use crate::traits::{check_bounds, DeviceController};

/// Default hold duration for a long press.
const DEFAULT_LONG_PRESS_MS: u64 = 800;

/// Known application display names and their package names.
const APP_PACKAGES: &[(&str, &str)] = &[
    ("Messages", "org.fossify.messages"),
    ("Contacts", "org.fossify.contacts"),
    ("Calendar", "org.fossify.calendar"),
    ("Clock", "org.fossify.clock"),
    ("Settings", "com.android.settings"),
    ("Camera", "com.android.camera2"),
    ("Files", "com.android.documentsui"),
    ("Chrome", "com.android.chrome"),
];

/// Controller for one device reachable through `adb -s <device>`.
pub struct AdbController {
    adb_path: String,
    device: String,
    width: u32,
    height: u32,
    call_timeout: Duration,
    answers: Mutex<Vec<String>>,
}

impl AdbController {
    /// Connect to a device and read its screen dimensions.
    pub async fn connect(
        adb_path: impl Into<String>,
        device: impl Into<String>,
        call_timeout: Duration,
    ) -> Result<Self, ControllerError> {
        let mut controller = Self {
            adb_path: adb_path.into(),
            device: device.into(),
            width: 0,
            height: 0,
            call_timeout,
            answers: Mutex::new(Vec::new()),
        };

        let response = controller.adb(&["shell", "wm", "size"]).await?;
        let output = response.message.unwrap_or_default();
        let (width, height) = parse_wm_size(&output).ok_or_else(|| ControllerError::Transport {
            device: controller.device.clone(),
            message: format!("Could not parse screen size from '{}'", output.trim()),
        })?;
        controller.width = width;
        controller.height = height;

        info!(
            device = %controller.device,
            width,
            height,
            "Connected to device"
        );
        Ok(controller)
    }

    /// Run an adb command against this device with the call timeout applied.
    async fn adb(&self, args: &[&str]) -> Result<CommandResponse, ControllerError> {
        debug!(device = %self.device, ?args, "adb call");

        let future = Command::new(&self.adb_path)
            .arg("-s")
            .arg(&self.device)
            .args(args)
            .output();

        let output = tokio::time::timeout(self.call_timeout, future)
            .await
            .map_err(|_| ControllerError::Timeout {
                device: self.device.clone(),
                operation: args.join(" "),
                timeout_ms: self.call_timeout.as_millis() as u64,
            })?
            .map_err(ControllerError::Spawn)?;

        if output.status.success() {
            Ok(CommandResponse::ok_with(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            ))
        } else {
            // The device answered but refused the command.
            Ok(CommandResponse::rejected(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ))
        }
    }

    /// Like [`adb`](Self::adb) but returns raw stdout bytes (screenshots).
    async fn adb_raw(&self, args: &[&str]) -> Result<Vec<u8>, ControllerError> {
        let future = Command::new(&self.adb_path)
            .arg("-s")
            .arg(&self.device)
            .args(args)
            .output();

        let output = tokio::time::timeout(self.call_timeout, future)
            .await
            .map_err(|_| ControllerError::Timeout {
                device: self.device.clone(),
                operation: args.join(" "),
                timeout_ms: self.call_timeout.as_millis() as u64,
            })?
            .map_err(ControllerError::Spawn)?;

        if !output.status.success() {
            return Err(ControllerError::Transport {
                device: self.device.clone(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output.stdout)
    }

    fn bounds(&self, x: u32, y: u32) -> Result<(), ControllerError> {
        check_bounds(x, y, self.width, self.height)
    }
}

/// Parse `wm size` output like `Physical size: 1080x1920`.
fn parse_wm_size(output: &str) -> Option<(u32, u32)> {
    let dims = output.lines().find_map(|line| {
        let (_, tail) = line.split_once(':')?;
        let (w, h) = tail.trim().split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    })?;
    Some(dims)
}

#[async_trait]
impl DeviceController for AdbController {
    fn device_id(&self) -> &str {
        &self.device
    }

    fn screen_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn tap(&self, x: u32, y: u32) -> Result<CommandResponse, ControllerError> {
        self.bounds(x, y)?;
        self.adb(&["shell", "input", "tap", &x.to_string(), &y.to_string()])
            .await
    }

    async fn double_tap(&self, x: u32, y: u32) -> Result<CommandResponse, ControllerError> {
        self.bounds(x, y)?;
        let first = self.tap(x, y).await?;
        if !first.success {
            return Ok(first);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.tap(x, y).await
    }

    async fn long_press(
        &self,
        x: u32,
        y: u32,
        duration_ms: Option<u64>,
    ) -> Result<CommandResponse, ControllerError> {
        self.bounds(x, y)?;
        let duration = duration_ms.unwrap_or(DEFAULT_LONG_PRESS_MS);
        let (xs, ys, ds) = (x.to_string(), y.to_string(), duration.to_string());
        self.adb(&["shell", "input", "swipe", &xs, &ys, &xs, &ys, &ds])
            .await
    }

    async fn swipe(
        &self,
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    ) -> Result<CommandResponse, ControllerError> {
        self.bounds(start_x, start_y)?;
        self.bounds(end_x, end_y)?;
        self.adb(&[
            "shell",
            "input",
            "swipe",
            &start_x.to_string(),
            &start_y.to_string(),
            &end_x.to_string(),
            &end_y.to_string(),
            "300",
        ])
        .await
    }

    async fn drag(
        &self,
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    ) -> Result<CommandResponse, ControllerError> {
        self.bounds(start_x, start_y)?;
        self.bounds(end_x, end_y)?;
        self.adb(&[
            "shell",
            "input",
            "draganddrop",
            &start_x.to_string(),
            &start_y.to_string(),
            &end_x.to_string(),
            &end_y.to_string(),
            "800",
        ])
        .await
    }

    async fn scroll(&self, direction: ScrollDirection) -> Result<CommandResponse, ControllerError> {
        let (cx, cy) = (self.width / 2, self.height / 2);
        let (dx, dy) = direction.swipe_vector();
        let distance = (self.height / 4) as i32;
        let end_x = (cx as i32 + dx * distance).clamp(0, self.width as i32 - 1) as u32;
        let end_y = (cy as i32 + dy * distance).clamp(0, self.height as i32 - 1) as u32;
        self.swipe(cx, cy, end_x, end_y).await
    }

    async fn input_text(&self, text: &str) -> Result<CommandResponse, ControllerError> {
        // `input text` cannot carry spaces unescaped.
        let escaped = text.replace(' ', "%s");
        self.adb(&["shell", "input", "text", &escaped]).await
    }

    async fn keyboard_enter(&self) -> Result<CommandResponse, ControllerError> {
        self.adb(&["shell", "input", "keyevent", "KEYCODE_ENTER"])
            .await
    }

    async fn navigate_back(&self) -> Result<CommandResponse, ControllerError> {
        self.adb(&["shell", "input", "keyevent", "KEYCODE_BACK"])
            .await
    }

    async fn navigate_home(&self) -> Result<CommandResponse, ControllerError> {
        self.adb(&["shell", "input", "keyevent", "KEYCODE_HOME"])
            .await
    }

    async fn open_app(&self, app_name: &str) -> Result<CommandResponse, ControllerError> {
        let package = APP_PACKAGES
            .iter()
            .find(|(name, _)| *name == app_name)
            .map(|(_, package)| *package);

        let Some(package) = package else {
            warn!(device = %self.device, app = %app_name, "Unknown app name");
            return Ok(CommandResponse::rejected(format!(
                "Unknown app: {app_name}"
            )));
        };

        self.adb(&[
            "shell",
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ControllerError> {
        self.adb_raw(&["exec-out", "screencap", "-p"]).await
    }

    async fn shell(&self, args: &[&str]) -> Result<CommandResponse, ControllerError> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        self.adb(&full).await
    }

    async fn list_snapshots(&self) -> Result<Vec<String>, ControllerError> {
        let response = self.adb(&["emu", "avd", "snapshot", "list"]).await?;
        let names = response
            .message
            .unwrap_or_default()
            .lines()
            .filter_map(|line| {
                let name = line.trim();
                (!name.is_empty() && !name.starts_with("OK")).then(|| name.to_string())
            })
            .collect();
        Ok(names)
    }

    async fn save_snapshot(&self, name: &str) -> Result<CommandResponse, ControllerError> {
        info!(device = %self.device, snapshot = %name, "Saving snapshot");
        self.adb(&["emu", "avd", "snapshot", "save", name]).await
    }

    async fn load_snapshot(&self, name: &str) -> Result<CommandResponse, ControllerError> {
        info!(device = %self.device, snapshot = %name, "Loading snapshot");
        self.adb(&["emu", "avd", "snapshot", "load", name]).await
    }

    async fn delete_snapshot(&self, name: &str) -> Result<CommandResponse, ControllerError> {
        self.adb(&["emu", "avd", "snapshot", "delete", name]).await
    }

    async fn sync_time(&self) -> Result<CommandResponse, ControllerError> {
        let now = chrono::Utc::now().format("%m%d%H%M%Y.%S").to_string();
        self.adb(&["shell", "date", "-u", &now]).await
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

    async fn check_health(&self, retry_budget: u32) -> bool {
        let mut delay = Duration::from_millis(500);
        for attempt in 0..=retry_budget {
            match self.adb(&["get-state"]).await {
                Ok(response)
                    if response.success
                        && response.message.as_deref().map(str::trim) == Some("device") =>
                {
                    return true;
                }
                Ok(response) => {
                    debug!(
                        device = %self.device,
                        attempt,
                        state = ?response.message,
                        "Device not ready"
                    );
                }
                Err(error) => {
                    warn!(device = %self.device, attempt, %error, "Health probe failed");
                }
            }
            if attempt < retry_budget {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(5));
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wm_size() {
        assert_eq!(
            parse_wm_size("Physical size: 1080x1920\n"),
            Some((1080, 1920))
        );
        assert_eq!(
            parse_wm_size("Physical size: 1080x1920\nOverride size: 720x1280\n"),
            Some((1080, 1920))
        );
        assert_eq!(parse_wm_size("garbage"), None);
    }

    #[test]
    fn test_scroll_direction_vectors() {
        // Scrolling down moves content up: the gesture swipes toward the top.
        assert_eq!(ScrollDirection::Down.swipe_vector(), (0, -1));
        assert_eq!(ScrollDirection::Up.swipe_vector(), (0, 1));
    }
}
