//! Task lifecycle statuses and the transition state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task within a pipeline run.
///
/// Transitions are one-directional; a task never re-enters an earlier
/// state. A retried task is modeled as a new task identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task observed but not yet submitted for execution.
    #[default]
    New,
    /// Task submitted to an executor, awaiting a slot.
    Submitted,
    /// Task actively executing.
    Running,
    /// Task completed successfully.
    Completed,
    /// Task failed.
    Failed,
    /// Task result was found in the cache; the task never ran.
    Cached,
    /// Task was aborted by the engine or the user.
    Aborted,
}

impl TaskStatus {
    /// Returns true if the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cached | Self::Aborted
        )
    }

    /// Returns true if the status is still active (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if a task in this status may move to `next`.
    ///
    /// `Cached` is reachable directly from `New`/`Submitted` (cache hit,
    /// the task never runs); `Aborted` from any non-terminal status.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match self {
            Self::New => matches!(next, Self::Submitted | Self::Cached | Self::Aborted),
            Self::Submitted => matches!(next, Self::Running | Self::Cached | Self::Aborted),
            Self::Running => matches!(
                next,
                Self::Completed | Self::Failed | Self::Cached | Self::Aborted
            ),
            _ => false,
        }
    }

    /// All statuses, in lifecycle order. Used for stable iteration when
    /// rendering counts.
    pub const ALL: [TaskStatus; 7] = [
        Self::New,
        Self::Submitted,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Cached,
        Self::Aborted,
    ];

    /// Lowercase label for metric/log output.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cached => "cached",
            Self::Aborted => "aborted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cached.is_terminal());
        assert!(TaskStatus::Aborted.is_terminal());
        assert!(TaskStatus::New.is_active());
        assert!(TaskStatus::Running.is_active());
    }

    #[test]
    fn test_forward_edges_only() {
        assert!(TaskStatus::New.can_transition_to(TaskStatus::Submitted));
        assert!(TaskStatus::Submitted.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));

        // No backward edges, no re-entry.
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Submitted));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::New));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn test_cache_hit_skips_execution() {
        assert!(TaskStatus::New.can_transition_to(TaskStatus::Cached));
        assert!(TaskStatus::Submitted.can_transition_to(TaskStatus::Cached));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Cached));
    }

    #[test]
    fn test_serde_screaming_snake_case() {
        let json = serde_json::to_string(&TaskStatus::Submitted).unwrap();
        assert_eq!(json, "\"SUBMITTED\"");
        let status: TaskStatus = serde_json::from_str("\"CACHED\"").unwrap();
        assert_eq!(status, TaskStatus::Cached);
    }
}
