//! Core domain errors.

use crate::ids::{RunId, TaskId};
use crate::status::TaskStatus;
use thiserror::Error;

/// Core domain errors for Flowmon.
///
/// Failures are scoped to a single event or query; none of these should
/// abort the aggregate for a whole run, let alone the hosting process.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Transition from an unrecorded or already-vacated status.
    #[error("Unknown transition for task {task_id}: expected {expected:?}, event claims {actual:?}")]
    UnknownTaskTransition {
        task_id: TaskId,
        expected: Option<TaskStatus>,
        actual: Option<TaskStatus>,
    },

    /// Negative delta on a cumulative metric, or a value outside any
    /// physically sensible range.
    #[error("Invalid value for metric {field}: {value}")]
    InvalidMetric { field: &'static str, value: f64 },

    /// Query for a run with no aggregate.
    #[error("No such run: {0}")]
    UnknownRun(RunId),

    /// Wire payload version unsupported by this build.
    #[error("Unsupported snapshot schema version {found} (this build supports up to {supported})")]
    SchemaVersionMismatch { found: u16, supported: u16 },

    /// Envelope encode/decode failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
