//! Flowmon Aggregation Service
//!
//! This crate provides the mutating side of Flowmon: per-run progress
//! aggregators, the run registry keyed by `RunId`, and metrics rendering
//! on top of the `flowmon-core` domain types.

pub mod aggregator;
pub mod config;
pub mod metrics;
pub mod registry;

pub use aggregator::RunAggregator;
pub use config::AggregatorConfig;
pub use registry::ProgressRegistry;
