//! Resource usage payloads reported by tasks.
//!
//! Every metric field is either *cumulative* (a running total since task
//! start, folded additively, reported once per task) or a *gauge* (an
//! instantaneous value, folded last-write-wins). The split is encoded in
//! [`MetricField::is_cumulative`] so the two can never be silently mixed:
//! adding a gauge double-counts, overwriting a cumulative undercounts.

use crate::error::ProgressError;
use serde::{Deserialize, Serialize};

/// The metric fields a task may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    /// CPUs requested by the task.
    Cpus,
    /// CPU time consumed, in milliseconds.
    CpuTime,
    /// CPU load percentage.
    CpuLoad,
    /// Resident set size, in bytes.
    MemoryRss,
    /// Memory requested, in bytes.
    MemoryReq,
    /// Bytes read from storage.
    ReadBytes,
    /// Bytes written to storage.
    WriteBytes,
    /// Voluntary context switches.
    VolCtxSwitch,
    /// Involuntary context switches.
    InvCtxSwitch,
}

impl MetricField {
    /// True for cumulative-since-start counters (folded additively);
    /// false for gauges (folded last-write-wins).
    pub fn is_cumulative(&self) -> bool {
        match self {
            Self::Cpus
            | Self::CpuTime
            | Self::ReadBytes
            | Self::WriteBytes
            | Self::VolCtxSwitch
            | Self::InvCtxSwitch => true,
            Self::CpuLoad | Self::MemoryRss | Self::MemoryReq => false,
        }
    }

    /// Field name as it appears on the wire and in metric output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpus => "cpus",
            Self::CpuTime => "cpu_time",
            Self::CpuLoad => "cpu_load",
            Self::MemoryRss => "memory_rss",
            Self::MemoryReq => "memory_req",
            Self::ReadBytes => "read_bytes",
            Self::WriteBytes => "write_bytes",
            Self::VolCtxSwitch => "vol_ctx_switch",
            Self::InvCtxSwitch => "inv_ctx_switch",
        }
    }
}

/// Resource metrics payload attached to a task lifecycle event.
///
/// Fields are signed as delivered by the transport; validation happens at
/// fold time. All fields default so partial payloads decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// CPUs requested by the task (cumulative).
    #[serde(default)]
    pub cpus: i64,

    /// CPU time in milliseconds (cumulative).
    #[serde(default)]
    pub cpu_time: i64,

    /// CPU load percentage (gauge).
    #[serde(default)]
    pub cpu_load: f64,

    /// Resident set size in bytes (gauge).
    #[serde(default)]
    pub memory_rss: i64,

    /// Memory requested in bytes (gauge).
    #[serde(default)]
    pub memory_req: i64,

    /// Bytes read (cumulative).
    #[serde(default)]
    pub read_bytes: i64,

    /// Bytes written (cumulative).
    #[serde(default)]
    pub write_bytes: i64,

    /// Voluntary context switches (cumulative).
    #[serde(default)]
    pub vol_ctx_switch: i64,

    /// Involuntary context switches (cumulative).
    #[serde(default)]
    pub inv_ctx_switch: i64,
}

impl ResourceUsage {
    /// Validate the whole payload before any of it is folded.
    ///
    /// A negative value on any field, or a non-finite `cpu_load`, rejects
    /// the report as a whole so a partial fold is never applied.
    pub fn validate(&self) -> Result<(), ProgressError> {
        let signed = [
            (MetricField::Cpus, self.cpus),
            (MetricField::CpuTime, self.cpu_time),
            (MetricField::MemoryRss, self.memory_rss),
            (MetricField::MemoryReq, self.memory_req),
            (MetricField::ReadBytes, self.read_bytes),
            (MetricField::WriteBytes, self.write_bytes),
            (MetricField::VolCtxSwitch, self.vol_ctx_switch),
            (MetricField::InvCtxSwitch, self.inv_ctx_switch),
        ];
        for (field, value) in signed {
            if value < 0 {
                return Err(ProgressError::InvalidMetric {
                    field: field.name(),
                    value: value as f64,
                });
            }
        }
        if !self.cpu_load.is_finite() || self.cpu_load < 0.0 {
            return Err(ProgressError::InvalidMetric {
                field: MetricField::CpuLoad.name(),
                value: self.cpu_load,
            });
        }
        Ok(())
    }
}
