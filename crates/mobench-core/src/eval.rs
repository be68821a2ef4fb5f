//! Task evaluation results.

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one task: a score in `[0, 1]` plus an optional
/// human-readable reason.
///
/// This is the single evaluation shape for the whole engine; verification
/// code constructs it directly instead of returning a bare score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Completion score, always within the closed interval `[0, 1]`.
    pub score: f64,

    /// Optional explanation of the score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EvaluationResult {
    /// Create a result, clamping the score into `[0, 1]`.
    pub fn new(score: f64, reason: Option<String>) -> Self {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        Self { score, reason }
    }

    /// Full-score result with a reason.
    pub fn success(reason: impl Into<String>) -> Self {
        Self::new(1.0, Some(reason.into()))
    }

    /// Zero-score result with a reason.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::new(0.0, Some(reason.into()))
    }

    /// Returns true for a full score.
    pub fn passed(&self) -> bool {
        self.score >= 1.0
    }
}
