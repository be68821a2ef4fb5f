//! Controller errors and command responses.

use thiserror::Error;

/// Transport-level and caller-level controller errors.
///
/// Ordinary device-side rejections are *not* errors; they come back as a
/// rejected [`CommandResponse`]. An `Err` from a controller method means the
/// call itself failed (unreachable device, timeout) or the caller handed in
/// an invalid request.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The device transport failed.
    #[error("Transport failure on device '{device}': {message}")]
    Transport { device: String, message: String },

    /// The call did not complete within its timeout.
    #[error("Timed out after {timeout_ms}ms running '{operation}' on device '{device}'")]
    Timeout {
        device: String,
        operation: String,
        timeout_ms: u64,
    },

    /// Coordinates outside the reported screen bounds. Caller error; the
    /// controller never silently clamps.
    #[error("Coordinates ({x}, {y}) outside screen bounds {width}x{height}")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Failed to spawn the underlying transport process.
    #[error("Failed to spawn device transport: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Device-side outcome of one accepted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    /// Whether the device accepted and performed the command.
    pub success: bool,

    /// Device-side detail, mostly useful on rejection.
    pub message: Option<String>,
}

impl CommandResponse {
    /// A successful, silent response.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// A successful response carrying output.
    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    /// A device-side rejection (not a transport error).
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}
