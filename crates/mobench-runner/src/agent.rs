//! Agent seam and the replay agent.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use mobench_core::{Action, Observation};

/// Errors an agent can raise while predicting.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Replay trace could not be read.
    #[error("Failed to read action trace: {0}")]
    Io(#[from] std::io::Error),

    /// Replay trace line did not parse as an action.
    #[error("Invalid action on trace line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Model-side prediction failure.
    #[error("Prediction failed: {0}")]
    Predict(String),
}

/// One predicted step.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Why the agent chose this action. Logged, not interpreted.
    pub rationale: String,

    /// The action to execute.
    pub action: Action,
}

/// The policy driving an episode.
#[async_trait]
pub trait Agent: Send {
    /// Reset internal state for a new episode with this goal.
    async fn reset(&mut self, goal: &str);

    /// Predict the next action from the latest observation.
    async fn predict(&mut self, observation: &Observation) -> Result<Prediction, AgentError>;
}

#[derive(Deserialize)]
struct TraceLine {
    #[serde(default)]
    rationale: String,
    #[serde(flatten)]
    action: Action,
}

/// Replays a recorded action trace, one JSON action per line.
///
/// When the trace runs out it emits `finished`, so a short trace still
/// terminates its episode cleanly.
#[derive(Debug, Clone)]
pub struct ReplayAgent {
    trace: Vec<Prediction>,
    cursor: usize,
}

impl ReplayAgent {
    /// Build from an in-memory action list.
    pub fn from_actions(actions: Vec<Action>) -> Self {
        Self {
            trace: actions
                .into_iter()
                .map(|action| Prediction {
                    rationale: String::new(),
                    action,
                })
                .collect(),
            cursor: 0,
        }
    }

    /// Load a JSONL trace file.
    pub fn from_jsonl(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let text = std::fs::read_to_string(path)?;
        let mut trace = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed: TraceLine =
                serde_json::from_str(line).map_err(|e| AgentError::Parse {
                    line: index + 1,
                    message: e.to_string(),
                })?;
            trace.push(Prediction {
                rationale: parsed.rationale,
                action: parsed.action,
            });
        }
        Ok(Self { trace, cursor: 0 })
    }
}

#[async_trait]
impl Agent for ReplayAgent {
    async fn reset(&mut self, _goal: &str) {
        self.cursor = 0;
    }

    async fn predict(&mut self, _observation: &Observation) -> Result<Prediction, AgentError> {
        let prediction = match self.trace.get(self.cursor) {
            Some(prediction) => prediction.clone(),
            None => Prediction {
                rationale: "trace exhausted".to_string(),
                action: Action::Finished,
            },
        };
        self.cursor += 1;
        Ok(prediction)
    }
}
