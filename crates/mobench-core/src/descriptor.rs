//! Immutable task metadata, fixed at registration time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Snapshot loaded before a task that does not name its own baseline.
pub const DEFAULT_SNAPSHOT: &str = "default_snapshot";

/// Static metadata for one task, built once when the registry is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Unique task name within its suite family.
    pub name: String,

    /// Natural-language goal handed to the agent.
    pub goal: String,

    /// Applications the task touches.
    pub app_names: BTreeSet<String>,

    /// Classification tags (language, interaction style, tool usage).
    pub tags: BTreeSet<String>,

    /// Device snapshot to restore before setup; `None` means the default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

impl TaskDescriptor {
    /// Snapshot identifier to restore, falling back to [`DEFAULT_SNAPSHOT`].
    pub fn snapshot_name(&self) -> &str {
        self.snapshot.as_deref().unwrap_or(DEFAULT_SNAPSHOT)
    }

    /// Whether the task spans more than one application.
    pub fn is_cross_app(&self) -> bool {
        self.app_names.len() > 1
    }

    /// Whether the task carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
