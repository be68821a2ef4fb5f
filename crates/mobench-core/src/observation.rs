//! Observations returned by the environment after each step.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

/// A PNG screenshot carried as raw bytes, base64-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    /// Base64-encoded PNG data.
    pub b64_png: String,
}

impl Screenshot {
    /// Wrap raw PNG bytes.
    pub fn from_png(bytes: &[u8]) -> Self {
        Self {
            b64_png: BASE64.encode(bytes),
        }
    }

    /// Decode back into PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>, base64::DecodeError> {
        // Tolerate data-URL prefixes from older servers.
        let raw = match self.b64_png.rsplit_once(',') {
            Some((_, tail)) => tail,
            None => self.b64_png.as_str(),
        };
        BASE64.decode(raw)
    }

    /// An empty placeholder screenshot.
    pub fn empty() -> Self {
        Self {
            b64_png: String::new(),
        }
    }
}

/// Result of one tool invocation, folded into the observation.
///
/// Failures (unknown tool, transport fault, tool-side error) are data here,
/// never propagated errors: the agent loop reads them and continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolCallResult {
    /// The tool ran and produced a payload.
    Success {
        name: String,
        content: serde_json::Value,
    },
    /// The tool could not be invoked or reported an error.
    Failure { name: String, message: String },
}

impl ToolCallResult {
    /// Returns true if the invocation failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Tool name the result belongs to.
    pub fn tool_name(&self) -> &str {
        match self {
            Self::Success { name, .. } | Self::Failure { name, .. } => name,
        }
    }
}

/// The environment's response to one action.
///
/// A screenshot is always present; `tool_call` and `ask_user_response` are
/// populated only when the triggering action produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Current screen.
    pub screenshot: Screenshot,

    /// Tool result when the last action was `mcp`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallResult>,

    /// Simulated user reply when the last action was `ask_user`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask_user_response: Option<String>,
}

impl Observation {
    /// Observation carrying only a screenshot.
    pub fn from_screenshot(screenshot: Screenshot) -> Self {
        Self {
            screenshot,
            tool_call: None,
            ask_user_response: None,
        }
    }

    /// Attach a tool-call result.
    pub fn with_tool_call(mut self, result: ToolCallResult) -> Self {
        self.tool_call = Some(result);
        self
    }

    /// Attach a simulated user reply.
    pub fn with_ask_user_response(mut self, reply: impl Into<String>) -> Self {
        self.ask_user_response = Some(reply.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_roundtrip() {
        let bytes = [0x89u8, b'P', b'N', b'G', 0x0d, 0x0a];
        let shot = Screenshot::from_png(&bytes);
        assert_eq!(shot.to_png().unwrap(), bytes);
    }

    #[test]
    fn test_screenshot_strips_data_url_prefix() {
        let shot = Screenshot {
            b64_png: format!("data:image/png;base64,{}", BASE64.encode(b"abc")),
        };
        assert_eq!(shot.to_png().unwrap(), b"abc");
    }

    #[test]
    fn test_observation_optional_fields_omitted() {
        let obs = Observation::from_screenshot(Screenshot::empty());
        let json = serde_json::to_value(&obs).unwrap();
        assert!(json.get("tool_call").is_none());
        assert!(json.get("ask_user_response").is_none());
    }

    #[test]
    fn test_tool_call_failure_is_data() {
        let result = ToolCallResult::Failure {
            name: "unknown_tool".to_string(),
            message: "no such tool".to_string(),
        };
        assert!(result.is_failure());
        assert_eq!(result.tool_name(), "unknown_tool");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
    }
}
