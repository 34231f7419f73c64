//! Per-run progress aggregator.
//!
//! One `RunAggregator` exists per monitored pipeline run. Many reporters
//! mutate it concurrently; every logical transition (decrement old slot +
//! increment new slot) and every usage fold happens as one unit under the
//! run's write lock, so readers never observe a half-applied transition.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use flowmon_core::{
    ProgressError, ProgressEvent, ProgressState, ResourceUsage, RunId, SnapshotEnvelope, TaskId,
    TaskStatus,
};

/// Lock-protected aggregate for one run, plus bookkeeping that never
/// leaves the aggregator: the last known status per task and the set of
/// tasks whose cumulative usage has already been folded.
#[derive(Debug, Default)]
struct RunProgress {
    state: ProgressState,
    tasks: HashMap<TaskId, TaskStatus>,
    usage_folded: HashSet<TaskId>,
}

impl RunProgress {
    /// Apply one status transition as an atomic unit.
    ///
    /// Anomalous events (stale `previous`, illegal edge, usage of a
    /// vacated slot) are rejected without touching any status slot; the
    /// anomaly counter is the only thing that moves.
    fn apply_transition(
        &mut self,
        run_id: &RunId,
        task_id: &TaskId,
        previous: Option<TaskStatus>,
        new_status: TaskStatus,
    ) -> Result<(), ProgressError> {
        match self.tasks.get(task_id).copied() {
            None => {
                if previous.is_some() {
                    self.state.record_anomaly();
                    warn!(
                        run_id = %run_id,
                        task_id = %task_id,
                        claimed = ?previous,
                        "transition references a task never observed"
                    );
                    return Err(ProgressError::UnknownTaskTransition {
                        task_id: task_id.clone(),
                        expected: None,
                        actual: previous,
                    });
                }
                // First sight: the task enters at New.
                self.state.task_count.increment(TaskStatus::New, 1);
                self.tasks.insert(task_id.clone(), TaskStatus::New);
                if new_status == TaskStatus::New {
                    return Ok(());
                }
                // The event skipped ahead of registration; move the task
                // on if the edge is legal, otherwise leave it at New.
                self.move_task(run_id, task_id, TaskStatus::New, new_status)
            }
            Some(recorded) => {
                if recorded == new_status {
                    debug!(
                        run_id = %run_id,
                        task_id = %task_id,
                        status = recorded.as_label(),
                        "duplicate transition delivery; ignoring"
                    );
                    return Ok(());
                }
                if let Some(prev) = previous {
                    if prev != recorded {
                        self.state.record_anomaly();
                        warn!(
                            run_id = %run_id,
                            task_id = %task_id,
                            recorded = recorded.as_label(),
                            claimed = prev.as_label(),
                            "transition claims a status the task does not occupy"
                        );
                        return Err(ProgressError::UnknownTaskTransition {
                            task_id: task_id.clone(),
                            expected: Some(recorded),
                            actual: Some(prev),
                        });
                    }
                }
                self.move_task(run_id, task_id, recorded, new_status)
            }
        }
    }

    /// Decrement the old slot and increment the new one, updating the
    /// task's recorded status. Caller has established that `from` is the
    /// task's current status.
    fn move_task(
        &mut self,
        run_id: &RunId,
        task_id: &TaskId,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<(), ProgressError> {
        if !from.can_transition_to(to) {
            self.state.record_anomaly();
            warn!(
                run_id = %run_id,
                task_id = %task_id,
                from = from.as_label(),
                to = to.as_label(),
                "illegal status transition"
            );
            return Err(ProgressError::UnknownTaskTransition {
                task_id: task_id.clone(),
                expected: Some(from),
                actual: Some(to),
            });
        }
        if self.state.task_count.increment(from, -1) {
            self.state.record_anomaly();
        }
        self.state.task_count.increment(to, 1);
        self.tasks.insert(task_id.clone(), to);
        Ok(())
    }

    /// Fold a resource report for `task_id`.
    ///
    /// Cumulative metrics fold at most once per task; gauges fold
    /// last-write-wins on every accepted report. The transport delivers
    /// terminal reports at-least-once, so the second delivery of the same
    /// report must leave the aggregate unchanged.
    fn apply_usage(
        &mut self,
        run_id: &RunId,
        task_id: &TaskId,
        usage: &ResourceUsage,
    ) -> Result<(), ProgressError> {
        if !self.tasks.contains_key(task_id) {
            self.state.record_anomaly();
            warn!(
                run_id = %run_id,
                task_id = %task_id,
                "usage report for a task never observed"
            );
            return Err(ProgressError::UnknownTaskTransition {
                task_id: task_id.clone(),
                expected: None,
                actual: None,
            });
        }
        let result = if self.usage_folded.contains(task_id) {
            debug!(
                run_id = %run_id,
                task_id = %task_id,
                "cumulative usage already folded; applying gauges only"
            );
            self.state.resources.fold_gauges(usage)
        } else {
            self.state.resources.fold(usage).map(|()| {
                self.usage_folded.insert(task_id.clone());
            })
        };
        if let Err(e) = &result {
            self.state.record_anomaly();
            warn!(run_id = %run_id, task_id = %task_id, error = %e, "rejected usage report");
        }
        result
    }
}

/// The mutator for one run's progress aggregate.
pub struct RunAggregator {
    run_id: RunId,
    inner: RwLock<RunProgress>,
}

impl RunAggregator {
    /// Create an empty aggregate for `run_id`.
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            inner: RwLock::new(RunProgress::default()),
        }
    }

    /// The run this aggregator belongs to.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Apply one lifecycle event: the status transition, then the usage
    /// fold when the event carries a payload.
    pub async fn apply(&self, event: &ProgressEvent) -> Result<(), ProgressError> {
        let mut inner = self.inner.write().await;
        inner.apply_transition(
            &self.run_id,
            &event.task_id,
            event.previous_status,
            event.new_status,
        )?;
        if let Some(usage) = &event.usage {
            inner.apply_usage(&self.run_id, &event.task_id, usage)?;
        }
        Ok(())
    }

    /// Apply a status transition with no metrics payload.
    pub async fn apply_transition(
        &self,
        task_id: &TaskId,
        previous: Option<TaskStatus>,
        new_status: TaskStatus,
    ) -> Result<(), ProgressError> {
        self.inner
            .write()
            .await
            .apply_transition(&self.run_id, task_id, previous, new_status)
    }

    /// Fold a resource report for a task already observed in this run.
    pub async fn apply_usage(
        &self,
        task_id: &TaskId,
        usage: &ResourceUsage,
    ) -> Result<(), ProgressError> {
        self.inner
            .write()
            .await
            .apply_usage(&self.run_id, task_id, usage)
    }

    /// Consistent point-in-time snapshot of the aggregate.
    ///
    /// Runs concurrently with mutations; the read lock guarantees no
    /// transition is observed half-applied.
    pub async fn snapshot(&self) -> SnapshotEnvelope {
        let inner = self.inner.read().await;
        SnapshotEnvelope::new(self.run_id.clone(), Utc::now(), inner.state.clone())
    }
}
