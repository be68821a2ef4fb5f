//! Agent-issued device actions.
//!
//! `Action` is the tagged union carried on the wire between the agent loop
//! and the environment-side dispatcher. The `action_type` tag and the
//! per-kind payload fields are the step API contract.

use serde::{Deserialize, Serialize};

/// Scroll direction for the `scroll` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// Direction the gesture itself travels (scrolling down swipes up).
    pub fn swipe_vector(&self) -> (i32, i32) {
        match self {
            Self::Up => (0, 1),
            Self::Down => (0, -1),
            Self::Left => (1, 0),
            Self::Right => (-1, 0),
        }
    }
}

/// One agent-issued command against the device or the tool plane.
///
/// Serialized with an internal `action_type` tag so the wire payload matches
/// the environment server's step endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum Action {
    /// Single tap at screen coordinates.
    Click { x: u32, y: u32 },

    /// Double tap at screen coordinates.
    DoubleTap { x: u32, y: u32 },

    /// Long press; `duration_ms` defaults device-side when omitted.
    LongPress {
        x: u32,
        y: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },

    /// Swipe between two points.
    Swipe {
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    },

    /// Drag between two points (slow swipe with a hold).
    Drag {
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    },

    /// Directional scroll from the screen center.
    Scroll { direction: ScrollDirection },

    /// Type text into the focused field.
    InputText { text: String },

    /// Launch an application by display name.
    OpenApp { app_name: String },

    /// Hardware back.
    NavigateBack,

    /// Hardware home.
    NavigateHome,

    /// Press enter on the soft keyboard.
    KeyboardEnter,

    /// Do nothing for one step (lets animations settle).
    Wait,

    /// Ask the simulated user a question; the reply comes back in the
    /// observation.
    AskUser { text: String },

    /// Record a final answer for verification logic to read.
    Answer { text: String },

    /// Invoke an externally hosted tool by name.
    Mcp {
        action_name: String,
        action_json: serde_json::Value,
    },

    /// Terminal action: the agent believes the task is complete.
    Finished,
}

impl Action {
    /// Stable kind name, matching the wire tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::DoubleTap { .. } => "double_tap",
            Self::LongPress { .. } => "long_press",
            Self::Swipe { .. } => "swipe",
            Self::Drag { .. } => "drag",
            Self::Scroll { .. } => "scroll",
            Self::InputText { .. } => "input_text",
            Self::OpenApp { .. } => "open_app",
            Self::NavigateBack => "navigate_back",
            Self::NavigateHome => "navigate_home",
            Self::KeyboardEnter => "keyboard_enter",
            Self::Wait => "wait",
            Self::AskUser { .. } => "ask_user",
            Self::Answer { .. } => "answer",
            Self::Mcp { .. } => "mcp",
            Self::Finished => "finished",
        }
    }

    /// Returns true for the terminal `finished` action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_tag() {
        let action = Action::Click { x: 10, y: 20 };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action_type"], "click");
        assert_eq!(json["x"], 10);
        assert_eq!(json["y"], 20);
    }

    #[test]
    fn test_action_roundtrip_mcp() {
        let action = Action::Mcp {
            action_name: "search_web".to_string(),
            action_json: serde_json::json!({ "query": "lunch places" }),
        };
        let json = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_long_press_omits_missing_duration() {
        let action = Action::LongPress {
            x: 1,
            y: 2,
            duration_ms: None,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert!(json.get("duration_ms").is_none());
    }

    #[test]
    fn test_finished_is_terminal() {
        assert!(Action::Finished.is_terminal());
        assert!(!Action::Wait.is_terminal());
    }

    #[test]
    fn test_kind_matches_tag() {
        let action = Action::NavigateHome;
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action_type"], action.kind());
    }
}
