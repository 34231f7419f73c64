//! Task lifecycle events delivered by the transport.

use crate::ids::{RunId, TaskId};
use crate::status::TaskStatus;
use crate::usage::ResourceUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task state-change notification, optionally carrying resource
/// metrics.
///
/// Delivery is at-least-once for terminal events; the aggregator is
/// idempotent against duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Run this event belongs to.
    pub run_id: RunId,

    /// Task this event belongs to.
    pub task_id: TaskId,

    /// Status the task is entering.
    pub new_status: TaskStatus,

    /// Status the task is leaving. Absent on first observation.
    pub previous_status: Option<TaskStatus>,

    /// Resource metrics payload, typically attached to terminal events.
    pub usage: Option<ResourceUsage>,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Create a new event.
    pub fn new(
        run_id: RunId,
        task_id: TaskId,
        new_status: TaskStatus,
        previous_status: Option<TaskStatus>,
        usage: Option<ResourceUsage>,
    ) -> Self {
        Self {
            run_id,
            task_id,
            new_status,
            previous_status,
            usage,
            timestamp: Utc::now(),
        }
    }

    /// First observation of a task, entering at `New`.
    pub fn task_created(run_id: RunId, task_id: TaskId) -> Self {
        Self::new(run_id, task_id, TaskStatus::New, None, None)
    }

    /// A plain status change with no metrics payload.
    pub fn status_change(
        run_id: RunId,
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Self {
        Self::new(run_id, task_id, to, Some(from), None)
    }

    /// A terminal completion carrying the task's final usage report.
    pub fn completion(
        run_id: RunId,
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
        usage: ResourceUsage,
    ) -> Self {
        Self::new(run_id, task_id, to, Some(from), Some(usage))
    }
}
