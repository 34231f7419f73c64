//! The per-run progress aggregate: status counts and resource totals.

use crate::error::ProgressError;
use crate::status::TaskStatus;
use crate::usage::ResourceUsage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Mapping from [`TaskStatus`] to a running count, with default-zero read
/// semantics. Keys are never removed once created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCounter {
    counts: HashMap<TaskStatus, u64>,
}

impl StatusCounter {
    /// Current count for `status`, or 0 if never observed. Absence of a
    /// key is a valid, common state, not an error.
    pub fn get(&self, status: TaskStatus) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    /// Add `delta` to the count for `status`.
    ///
    /// A negative result is a logic error: it panics in debug builds and
    /// clamps to 0 with a warning in release builds. Returns true when
    /// clamping occurred so the caller can record the anomaly.
    pub fn increment(&mut self, status: TaskStatus, delta: i64) -> bool {
        let current = self.counts.entry(status).or_insert(0);
        if delta >= 0 {
            *current = current.saturating_add(delta as u64);
            return false;
        }
        let dec = delta.unsigned_abs();
        if dec > *current {
            debug_assert!(
                false,
                "status count underflow: {status:?} at {current} decremented by {dec}"
            );
            warn!(
                status = status.as_label(),
                count = *current,
                delta,
                "status count would go negative; clamping to 0"
            );
            *current = 0;
            true
        } else {
            *current -= dec;
            false
        }
    }

    /// Sum of all counts. Equals the number of distinct tasks ever
    /// observed, since a task occupies exactly one status slot.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterate over observed (status, count) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (TaskStatus, u64)> + '_ {
        self.counts.iter().map(|(s, c)| (*s, *c))
    }
}

/// Running resource totals for a run.
///
/// Cumulative fields only grow; gauges hold the last reported value. The
/// per-field split lives in [`crate::usage::MetricField::is_cumulative`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAccumulator {
    /// Total CPUs requested across tasks (cumulative).
    pub total_cpus: u64,
    /// Total CPU time in milliseconds (cumulative).
    pub cpu_time: u64,
    /// Last reported CPU load percentage (gauge).
    pub cpu_load: f64,
    /// Last reported resident set size in bytes (gauge).
    pub memory_rss: u64,
    /// Last reported memory request in bytes (gauge).
    pub memory_req: u64,
    /// Total bytes read (cumulative).
    pub read_bytes: u64,
    /// Total bytes written (cumulative).
    pub write_bytes: u64,
    /// Total voluntary context switches (cumulative).
    pub vol_ctx_switch: u64,
    /// Total involuntary context switches (cumulative).
    pub inv_ctx_switch: u64,
}

impl ResourceAccumulator {
    /// Fold a validated usage report into the totals.
    ///
    /// The payload is validated as a whole before anything is applied, so
    /// an invalid report never leaves a partial fold behind.
    pub fn fold(&mut self, usage: &ResourceUsage) -> Result<(), ProgressError> {
        usage.validate()?;
        self.total_cpus += usage.cpus as u64;
        self.cpu_time += usage.cpu_time as u64;
        self.read_bytes += usage.read_bytes as u64;
        self.write_bytes += usage.write_bytes as u64;
        self.vol_ctx_switch += usage.vol_ctx_switch as u64;
        self.inv_ctx_switch += usage.inv_ctx_switch as u64;
        self.cpu_load = usage.cpu_load;
        self.memory_rss = usage.memory_rss as u64;
        self.memory_req = usage.memory_req as u64;
        Ok(())
    }

    /// Fold only the gauge fields (last-write-wins).
    ///
    /// Used when the cumulative part of a report was already applied for
    /// the task and must not be added again.
    pub fn fold_gauges(&mut self, usage: &ResourceUsage) -> Result<(), ProgressError> {
        usage.validate()?;
        self.cpu_load = usage.cpu_load;
        self.memory_rss = usage.memory_rss as u64;
        self.memory_req = usage.memory_req as u64;
        Ok(())
    }
}

/// The live aggregate for one pipeline run.
///
/// Created empty at run start, mutated as task events arrive, discarded
/// once the run is finalized. Snapshots handed to readers are clones and
/// do not reflect subsequent mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Per-status task counts.
    pub task_count: StatusCounter,

    /// Aggregate resource consumption.
    #[serde(flatten)]
    pub resources: ResourceAccumulator,

    /// Tolerated consistency violations (rejected transitions, clamped
    /// counters, usage for unseen tasks).
    #[serde(default)]
    pub anomalies: u64,
}

impl ProgressState {
    /// Tasks observed but not yet submitted.
    pub fn pending(&self) -> u64 {
        self.task_count.get(TaskStatus::New)
    }

    /// Tasks submitted and waiting to run.
    pub fn submitted(&self) -> u64 {
        self.task_count.get(TaskStatus::Submitted)
    }

    /// Tasks currently executing.
    pub fn running(&self) -> u64 {
        self.task_count.get(TaskStatus::Running)
    }

    /// Tasks completed successfully.
    pub fn succeeded(&self) -> u64 {
        self.task_count.get(TaskStatus::Completed)
    }

    /// Tasks that failed.
    pub fn failed(&self) -> u64 {
        self.task_count.get(TaskStatus::Failed)
    }

    /// Tasks satisfied from the cache.
    pub fn cached(&self) -> u64 {
        self.task_count.get(TaskStatus::Cached)
    }

    /// Tasks aborted before reaching another terminal state.
    pub fn aborted(&self) -> u64 {
        self.task_count.get(TaskStatus::Aborted)
    }

    /// Total tasks ever observed for the run.
    pub fn total_tasks(&self) -> u64 {
        self.task_count.total()
    }

    /// Record one tolerated consistency violation.
    pub fn record_anomaly(&mut self) {
        self.anomalies += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_defaults_to_zero() {
        let counter = StatusCounter::default();
        assert_eq!(counter.get(TaskStatus::Running), 0);
        assert_eq!(counter.total(), 0);
    }

    #[test]
    fn test_counter_increment_and_total() {
        let mut counter = StatusCounter::default();
        counter.increment(TaskStatus::New, 3);
        counter.increment(TaskStatus::New, -1);
        counter.increment(TaskStatus::Running, 1);
        assert_eq!(counter.get(TaskStatus::New), 2);
        assert_eq!(counter.get(TaskStatus::Running), 1);
        assert_eq!(counter.total(), 3);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "status count underflow"))]
    fn test_counter_never_goes_negative() {
        let mut counter = StatusCounter::default();
        counter.increment(TaskStatus::Failed, 1);
        let clamped = counter.increment(TaskStatus::Failed, -2);
        // Release builds clamp and report; debug builds panic above.
        assert!(clamped);
        assert_eq!(counter.get(TaskStatus::Failed), 0);
    }

    #[test]
    fn test_fold_mixes_semantics_correctly() {
        let mut acc = ResourceAccumulator::default();
        let usage = ResourceUsage {
            cpus: 2,
            cpu_time: 100,
            cpu_load: 85.0,
            memory_rss: 1024,
            memory_req: 2048,
            read_bytes: 10,
            ..Default::default()
        };
        acc.fold(&usage).unwrap();
        acc.fold(&usage).unwrap();

        // Cumulative fields add up.
        assert_eq!(acc.cpu_time, 200);
        assert_eq!(acc.total_cpus, 4);
        assert_eq!(acc.read_bytes, 20);
        // Gauges hold the last value.
        assert_eq!(acc.cpu_load, 85.0);
        assert_eq!(acc.memory_rss, 1024);
        assert_eq!(acc.memory_req, 2048);
    }

    #[test]
    fn test_invalid_report_leaves_no_partial_fold() {
        let mut acc = ResourceAccumulator::default();
        let usage = ResourceUsage {
            cpu_time: 50,
            write_bytes: -7,
            ..Default::default()
        };
        assert!(acc.fold(&usage).is_err());
        assert_eq!(acc, ResourceAccumulator::default());
    }

    #[test]
    fn test_derived_accessors_default_to_zero() {
        let state = ProgressState::default();
        assert_eq!(state.pending(), 0);
        assert_eq!(state.succeeded(), 0);
        assert_eq!(state.total_tasks(), 0);
    }
}
