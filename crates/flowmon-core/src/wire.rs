//! Versioned wire envelope for progress snapshots.
//!
//! Snapshots cross process and deployment boundaries (persistence,
//! dashboards), so the serialized form carries an explicit schema version.
//! Evolution is additive only: new fields get `#[serde(default)]`, old
//! fields are never repurposed. A payload newer than this build is
//! rejected; older payloads decode with defaults.

use crate::error::ProgressError;
use crate::ids::RunId;
use crate::progress::ProgressState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version stamped on every encoded snapshot.
pub const SCHEMA_VERSION: u16 = 1;

/// A point-in-time progress snapshot in its wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    /// Wire schema version.
    pub version: u16,

    /// Run the snapshot belongs to.
    pub run_id: RunId,

    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,

    /// The aggregate state.
    pub state: ProgressState,
}

impl SnapshotEnvelope {
    /// Wrap a snapshot, stamping the current schema version.
    pub fn new(run_id: RunId, taken_at: DateTime<Utc>, state: ProgressState) -> Self {
        Self {
            version: SCHEMA_VERSION,
            run_id,
            taken_at,
            state,
        }
    }

    /// Encode to JSON.
    pub fn encode(&self) -> Result<String, ProgressError> {
        serde_json::to_string(self).map_err(|e| ProgressError::Serialization(e.to_string()))
    }

    /// Decode from JSON, rejecting payloads newer than this build.
    pub fn decode(json: &str) -> Result<Self, ProgressError> {
        let envelope: Self =
            serde_json::from_str(json).map_err(|e| ProgressError::Serialization(e.to_string()))?;
        if envelope.version > SCHEMA_VERSION {
            return Err(ProgressError::SchemaVersionMismatch {
                found: envelope.version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(envelope)
    }
}
