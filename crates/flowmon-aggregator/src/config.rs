//! Aggregator configuration.

/// Aggregator configuration.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Soft limit on concurrently tracked runs; 0 means unbounded.
    /// Exceeding it logs a warning but never rejects events, since
    /// backpressure belongs to the upstream transport.
    pub max_tracked_runs: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_tracked_runs: 0,
        }
    }
}
