//! Per-task records and the suite report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one task episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task that was run.
    pub task_name: String,

    /// Final score in `[0.0, 1.0]`.
    pub score: f64,

    /// Failure or partial-credit explanation, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Actions executed during the episode.
    pub steps: u32,
}

impl TaskRecord {
    /// A zero-score record for an episode that never produced a result.
    pub fn failed(task_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            score: 0.0,
            reason: Some(reason.into()),
            steps: 0,
        }
    }
}

/// Aggregate result of a suite run. Holds exactly one record per task.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Unique id for this run.
    pub run_id: Uuid,

    /// When the run finished.
    pub finished_at: DateTime<Utc>,

    /// One record per scheduled task.
    pub records: Vec<TaskRecord>,
}

impl RunReport {
    /// Build a report from collected records, sorted by task name.
    pub fn new(mut records: Vec<TaskRecord>) -> Self {
        records.sort_by(|a, b| a.task_name.cmp(&b.task_name));
        Self {
            run_id: Uuid::new_v4(),
            finished_at: Utc::now(),
            records,
        }
    }

    /// Mean score across all records; zero for an empty run.
    pub fn mean_score(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.records.iter().map(|r| r.score).sum::<f64>() / self.records.len() as f64
    }

    /// Number of records with a passing score.
    pub fn passed(&self) -> usize {
        self.records.iter().filter(|r| r.score >= 1.0).count()
    }

    /// Total number of records.
    pub fn total(&self) -> usize {
        self.records.len()
    }
}
