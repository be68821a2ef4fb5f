//! Task instance lifecycle phases.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of one task instance bound to an environment.
///
/// Transitions are strictly `Uninit -> Initialized -> Evaluated -> TornDown`;
/// no phase is skipped or revisited, except that teardown is reachable from
/// any phase (a failed setup still gets torn down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPhase {
    /// Created but not yet initialized on a device.
    #[default]
    Uninit,
    /// Snapshot restored and setup hook succeeded.
    Initialized,
    /// Evaluation has produced a score.
    Evaluated,
    /// Terminal: resources released.
    TornDown,
}

impl TaskPhase {
    /// Whether the forward transition `self -> next` is legal.
    pub fn can_transition(&self, next: TaskPhase) -> bool {
        matches!(
            (self, next),
            (Self::Uninit, Self::Initialized)
                | (Self::Initialized, Self::Evaluated)
                | (Self::Uninit, Self::TornDown)
                | (Self::Initialized, Self::TornDown)
                | (Self::Evaluated, Self::TornDown)
        )
    }

    /// Returns true once the instance occupies its environment
    /// (initialized but not yet torn down).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initialized | Self::Evaluated)
    }

    /// Returns true for the terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TornDown)
    }
}
