//! Run registry: one progress aggregate per pipeline run.
//!
//! The registry lock is held only long enough to fetch or insert the
//! per-run `Arc`; all counter mutation happens under the run's own lock,
//! so independent runs never contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use flowmon_core::{ProgressError, ProgressEvent, RunId, SnapshotEnvelope};

use crate::aggregator::RunAggregator;
use crate::config::AggregatorConfig;

/// Registry of live run aggregates, keyed by `RunId`.
///
/// Runs are created explicitly on their first event and torn down via
/// [`ProgressRegistry::finalize`].
pub struct ProgressRegistry {
    config: AggregatorConfig,
    runs: RwLock<HashMap<RunId, Arc<RunAggregator>>>,
}

impl ProgressRegistry {
    /// Create an empty registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(AggregatorConfig::default())
    }

    /// Create an empty registry with the given configuration.
    pub fn with_config(config: AggregatorConfig) -> Self {
        Self {
            config,
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Apply one lifecycle event, creating the run's aggregate on first
    /// sight.
    pub async fn apply(&self, event: &ProgressEvent) -> Result<(), ProgressError> {
        let aggregator = self.aggregator_for(&event.run_id).await;
        aggregator.apply(event).await
    }

    /// Fetch the aggregator for `run_id`, creating it if absent.
    pub async fn aggregator_for(&self, run_id: &RunId) -> Arc<RunAggregator> {
        // Fast path: the run already exists.
        if let Some(aggregator) = self.runs.read().await.get(run_id) {
            return aggregator.clone();
        }

        let mut runs = self.runs.write().await;
        if let Some(aggregator) = runs.get(run_id) {
            return aggregator.clone();
        }
        if self.config.max_tracked_runs > 0 && runs.len() >= self.config.max_tracked_runs {
            // Soft limit: backpressure belongs to the transport.
            warn!(
                run_id = %run_id,
                tracked = runs.len(),
                max = self.config.max_tracked_runs,
                "tracked run count exceeds configured limit"
            );
        }
        info!(run_id = %run_id, "creating progress aggregate");
        let aggregator = Arc::new(RunAggregator::new(run_id.clone()));
        runs.insert(run_id.clone(), aggregator.clone());
        aggregator
    }

    /// Fetch the aggregator for `run_id` without creating it.
    pub async fn get(&self, run_id: &RunId) -> Option<Arc<RunAggregator>> {
        self.runs.read().await.get(run_id).cloned()
    }

    /// Consistent snapshot of one run's aggregate.
    pub async fn snapshot(&self, run_id: &RunId) -> Result<SnapshotEnvelope, ProgressError> {
        let aggregator = self
            .get(run_id)
            .await
            .ok_or_else(|| ProgressError::UnknownRun(run_id.clone()))?;
        Ok(aggregator.snapshot().await)
    }

    /// Snapshots of every live run, ordered by run id for stable output.
    pub async fn snapshots(&self) -> Vec<SnapshotEnvelope> {
        let aggregators: Vec<Arc<RunAggregator>> =
            self.runs.read().await.values().cloned().collect();
        let mut snapshots = Vec::with_capacity(aggregators.len());
        for aggregator in aggregators {
            snapshots.push(aggregator.snapshot().await);
        }
        snapshots.sort_by(|a, b| a.run_id.as_str().cmp(b.run_id.as_str()));
        snapshots
    }

    /// Tear down a completed run: remove its aggregate and return the
    /// final snapshot for persistence.
    pub async fn finalize(&self, run_id: &RunId) -> Result<SnapshotEnvelope, ProgressError> {
        let aggregator = self
            .runs
            .write()
            .await
            .remove(run_id)
            .ok_or_else(|| ProgressError::UnknownRun(run_id.clone()))?;
        let snapshot = aggregator.snapshot().await;
        info!(
            run_id = %run_id,
            tasks = snapshot.state.total_tasks(),
            anomalies = snapshot.state.anomalies,
            "finalized progress aggregate"
        );
        Ok(snapshot)
    }

    /// Number of live runs.
    pub async fn run_count(&self) -> usize {
        self.runs.read().await.len()
    }
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmon_core::{ResourceUsage, TaskId, TaskStatus};

    #[tokio::test]
    async fn test_run_created_on_first_event() {
        let registry = ProgressRegistry::new();
        assert_eq!(registry.run_count().await, 0);

        let event = ProgressEvent::task_created(RunId::new("run-1"), TaskId::new("t0"));
        registry.apply(&event).await.unwrap();

        assert_eq!(registry.run_count().await, 1);
        let snap = registry.snapshot(&RunId::new("run-1")).await.unwrap();
        assert_eq!(snap.state.pending(), 1);
    }

    #[tokio::test]
    async fn test_unknown_run_is_an_error_not_a_crash() {
        let registry = ProgressRegistry::new();
        let err = registry.snapshot(&RunId::new("nope")).await.unwrap_err();
        assert!(matches!(err, ProgressError::UnknownRun(_)));
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let registry = ProgressRegistry::new();
        registry
            .apply(&ProgressEvent::task_created(
                RunId::new("run-a"),
                TaskId::new("t0"),
            ))
            .await
            .unwrap();
        registry
            .apply(&ProgressEvent::task_created(
                RunId::new("run-b"),
                TaskId::new("t0"),
            ))
            .await
            .unwrap();

        // An anomaly in run-a leaves run-b untouched.
        let bad = ProgressEvent::status_change(
            RunId::new("run-a"),
            TaskId::new("ghost"),
            TaskStatus::Running,
            TaskStatus::Completed,
        );
        assert!(registry.apply(&bad).await.is_err());

        let a = registry.snapshot(&RunId::new("run-a")).await.unwrap();
        let b = registry.snapshot(&RunId::new("run-b")).await.unwrap();
        assert_eq!(a.state.anomalies, 1);
        assert_eq!(b.state.anomalies, 0);
        assert_eq!(b.state.pending(), 1);
    }

    #[tokio::test]
    async fn test_finalize_removes_run_and_returns_snapshot() {
        let registry = ProgressRegistry::new();
        let run_id = RunId::new("run-1");
        let task_id = TaskId::new("t0");

        registry
            .apply(&ProgressEvent::task_created(run_id.clone(), task_id.clone()))
            .await
            .unwrap();
        registry
            .apply(&ProgressEvent::status_change(
                run_id.clone(),
                task_id.clone(),
                TaskStatus::New,
                TaskStatus::Cached,
            ))
            .await
            .unwrap();

        let snapshot = registry.finalize(&run_id).await.unwrap();
        assert_eq!(snapshot.state.cached(), 1);
        assert_eq!(registry.run_count().await, 0);

        // After teardown the run is gone for readers too.
        assert!(matches!(
            registry.snapshot(&run_id).await,
            Err(ProgressError::UnknownRun(_))
        ));
        // And for finalize itself.
        assert!(registry.finalize(&run_id).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_events_across_runs() {
        let registry = Arc::new(ProgressRegistry::new());
        let mut handles = Vec::new();

        for r in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let run_id = RunId::new(format!("run-{r}"));
                for t in 0..16 {
                    let task_id = TaskId::new(format!("t{t}"));
                    registry
                        .apply(&ProgressEvent::task_created(run_id.clone(), task_id.clone()))
                        .await
                        .unwrap();
                    registry
                        .apply(&ProgressEvent::status_change(
                            run_id.clone(),
                            task_id.clone(),
                            TaskStatus::New,
                            TaskStatus::Submitted,
                        ))
                        .await
                        .unwrap();
                    registry
                        .apply(&ProgressEvent::status_change(
                            run_id.clone(),
                            task_id.clone(),
                            TaskStatus::Submitted,
                            TaskStatus::Running,
                        ))
                        .await
                        .unwrap();
                    registry
                        .apply(&ProgressEvent::completion(
                            run_id.clone(),
                            task_id,
                            TaskStatus::Running,
                            TaskStatus::Completed,
                            ResourceUsage {
                                cpu_time: 5,
                                ..Default::default()
                            },
                        ))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.run_count().await, 8);
        for r in 0..8 {
            let snap = registry.snapshot(&RunId::new(format!("run-{r}"))).await.unwrap();
            assert_eq!(snap.state.succeeded(), 16);
            assert_eq!(snap.state.resources.cpu_time, 80);
            assert_eq!(snap.state.anomalies, 0);
        }
    }

    #[tokio::test]
    async fn test_soft_run_limit_still_creates() {
        let registry = ProgressRegistry::with_config(AggregatorConfig {
            max_tracked_runs: 1,
        });
        registry
            .apply(&ProgressEvent::task_created(
                RunId::new("run-a"),
                TaskId::new("t0"),
            ))
            .await
            .unwrap();
        // Over the limit: warns but does not reject.
        registry
            .apply(&ProgressEvent::task_created(
                RunId::new("run-b"),
                TaskId::new("t0"),
            ))
            .await
            .unwrap();
        assert_eq!(registry.run_count().await, 2);
    }
}
