//! Flowmon Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/transport
//! - Database
//! - Runtime specifics
//!
//! All types here represent the progress-aggregation domain of Flowmon:
//! task lifecycle statuses, per-run progress state, resource usage
//! payloads, and the versioned wire envelope for snapshots.

pub mod error;
pub mod event;
pub mod ids;
pub mod progress;
pub mod status;
pub mod usage;
pub mod wire;

// Re-export commonly used types
pub use error::ProgressError;
pub use event::ProgressEvent;
pub use ids::{RunId, TaskId};
pub use progress::{ProgressState, ResourceAccumulator, StatusCounter};
pub use status::TaskStatus;
pub use usage::{MetricField, ResourceUsage};
pub use wire::{SnapshotEnvelope, SCHEMA_VERSION};
