//! Prometheus metrics collection and formatting.
//!
//! This module renders registry state in Prometheus text exposition
//! format for scrape-style consumers.

use std::fmt::Write;

use flowmon_core::{SnapshotEnvelope, TaskStatus};

use crate::registry::ProgressRegistry;

/// Collect all metrics from the registry and format as Prometheus text.
pub async fn collect_metrics(registry: &ProgressRegistry) -> String {
    let snapshots = registry.snapshots().await;
    let mut output = String::new();

    collect_task_metrics(&snapshots, &mut output);
    collect_resource_metrics(&snapshots, &mut output);

    output
}

/// Per-run task counts by status.
fn collect_task_metrics(snapshots: &[SnapshotEnvelope], output: &mut String) {
    writeln!(
        output,
        "# HELP flowmon_tasks Number of tasks by status per run"
    )
    .ok();
    writeln!(output, "# TYPE flowmon_tasks gauge").ok();
    for snapshot in snapshots {
        for status in TaskStatus::ALL {
            writeln!(
                output,
                "flowmon_tasks{{run_id=\"{}\",status=\"{}\"}} {}",
                snapshot.run_id,
                status.as_label(),
                snapshot.state.task_count.get(status)
            )
            .ok();
        }
    }
}

/// Per-run cumulative resource totals and anomaly counts.
fn collect_resource_metrics(snapshots: &[SnapshotEnvelope], output: &mut String) {
    let counters: [(&str, &str, fn(&SnapshotEnvelope) -> u64); 5] = [
        (
            "flowmon_cpu_time_ms",
            "Total CPU time consumed per run in milliseconds",
            |s| s.state.resources.cpu_time,
        ),
        (
            "flowmon_read_bytes",
            "Total bytes read per run",
            |s| s.state.resources.read_bytes,
        ),
        (
            "flowmon_write_bytes",
            "Total bytes written per run",
            |s| s.state.resources.write_bytes,
        ),
        (
            "flowmon_total_cpus",
            "Total CPUs requested per run",
            |s| s.state.resources.total_cpus,
        ),
        (
            "flowmon_anomalies",
            "Tolerated consistency violations per run",
            |s| s.state.anomalies,
        ),
    ];

    for (name, help, value) in counters {
        writeln!(output).ok();
        writeln!(output, "# HELP {name} {help}").ok();
        writeln!(output, "# TYPE {name} counter").ok();
        for snapshot in snapshots {
            writeln!(
                output,
                "{name}{{run_id=\"{}\"}} {}",
                snapshot.run_id,
                value(snapshot)
            )
            .ok();
        }
    }
}
