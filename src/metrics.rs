// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Two kinds of metrics live here:
//!
//! - **Per-snapshot backup gauges**, owned by a [`MetricRegistry`] that is
//!   built once at startup and handed to the orchestrator as
//!   `Arc<dyn BackupMetrics>`. Tests substitute a recording fake.
//! - **Engine telemetry** (cycle counts, outcomes, state) emitted through free
//!   functions, like every other daemon built on the `metrics` facade.
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `snapshot_archiver_`:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track durations
//!
//! # Backup Gauges
//!
//! | Series | Value |
//! |--------|-------|
//! | `snapshot_archiver_backup_start_time{snapshot}` | Unix seconds the export started |
//! | `snapshot_archiver_backup_end_time{snapshot}` | Unix seconds the export ended |
//! | `snapshot_archiver_backup_success{snapshot}` | 1 on success, 0 on failure |
//!
//! One series per snapshot ever exported; series are never removed.

use metrics::{counter, describe_gauge, gauge, histogram, Gauge};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// Label carrying the snapshot identifier.
pub const SNAPSHOT_LABEL: &str = "snapshot";

/// The per-snapshot gauge series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupSeries {
    StartTime,
    EndTime,
    Success,
}

impl BackupSeries {
    /// All series, in registration order.
    pub const ALL: [BackupSeries; 3] = [Self::StartTime, Self::EndTime, Self::Success];

    /// Short series name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartTime => "backup_start_time",
            Self::EndTime => "backup_end_time",
            Self::Success => "backup_success",
        }
    }

    /// Fully qualified metric name.
    pub fn metric_name(&self) -> &'static str {
        match self {
            Self::StartTime => "snapshot_archiver_backup_start_time",
            Self::EndTime => "snapshot_archiver_backup_end_time",
            Self::Success => "snapshot_archiver_backup_success",
        }
    }

    /// Help text.
    pub fn description(&self) -> &'static str {
        match self {
            Self::StartTime => "Timestamp of when the backup has been started",
            Self::EndTime => "Timestamp of when the backup has ended",
            Self::Success => "Status of the backup",
        }
    }
}

impl fmt::Display for BackupSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Sink for per-snapshot backup gauges.
///
/// Only [`set_gauge`](Self::set_gauge) is required; the other methods are the
/// vocabulary the orchestrator uses.
pub trait BackupMetrics: Send + Sync {
    /// Set `series{snapshot=snapshot_id}` to `value`.
    fn set_gauge(&self, series: BackupSeries, snapshot_id: &str, value: f64);

    /// Record that an export started now.
    fn record_start(&self, snapshot_id: &str) {
        self.set_gauge(BackupSeries::StartTime, snapshot_id, now_unix_secs());
    }

    /// Record that an export ended now.
    fn record_end(&self, snapshot_id: &str) {
        self.set_gauge(BackupSeries::EndTime, snapshot_id, now_unix_secs());
    }

    /// Record the export result.
    fn record_success(&self, snapshot_id: &str, success: bool) {
        let value = if success { 1.0 } else { 0.0 };
        self.set_gauge(BackupSeries::Success, snapshot_id, value);
    }
}

/// Current wall clock time as fractional Unix seconds.
pub fn now_unix_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Get-or-create registry of backup gauges.
///
/// The first access to a `(series, snapshot)` pair registers a gauge with the
/// installed recorder; later accesses reuse the cached handle. Gauge writes
/// are atomic, so the scrape endpoint can read while the engine writes.
pub struct MetricRegistry {
    gauges: Mutex<HashMap<(BackupSeries, String), Gauge>>,
}

impl MetricRegistry {
    /// Create a registry and describe the backup series.
    ///
    /// Install the metrics recorder first, or the descriptions are lost.
    pub fn new() -> Self {
        for series in BackupSeries::ALL {
            describe_gauge!(series.metric_name(), series.description());
        }
        Self {
            gauges: Mutex::new(HashMap::new()),
        }
    }

    /// Get the gauge for a series and snapshot, registering it on first use.
    pub fn gauge(&self, series: BackupSeries, snapshot_id: &str) -> Gauge {
        let mut gauges = self.gauges.lock().unwrap_or_else(|e| e.into_inner());
        gauges
            .entry((series, snapshot_id.to_string()))
            .or_insert_with(|| {
                gauge!(series.metric_name(), SNAPSHOT_LABEL => snapshot_id.to_string())
            })
            .clone()
    }

    /// Number of registered `(series, snapshot)` pairs.
    pub fn len(&self) -> usize {
        self.gauges.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no gauge has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupMetrics for MetricRegistry {
    fn set_gauge(&self, series: BackupSeries, snapshot_id: &str, value: f64) {
        self.gauge(series, snapshot_id).set(value);
    }
}

// =============================================================================
// Engine Metrics
// =============================================================================

/// Record a completed reconciliation cycle.
pub fn record_cycle_complete(
    source_count: usize,
    archived_count: usize,
    pending_count: usize,
    duration: Duration,
) {
    counter!("snapshot_archiver_cycles_total").increment(1);
    gauge!("snapshot_archiver_source_snapshots").set(source_count as f64);
    gauge!("snapshot_archiver_archived_snapshots").set(archived_count as f64);
    gauge!("snapshot_archiver_pending_snapshots").set(pending_count as f64);
    histogram!("snapshot_archiver_cycle_duration_seconds").record(duration.as_secs_f64());
}

/// Record a cycle that failed during listing.
pub fn record_cycle_failed(phase: &str) {
    counter!("snapshot_archiver_cycle_failures_total", "phase" => phase.to_string()).increment(1);
}

/// Record the outcome of one export.
pub fn record_export_outcome(outcome: &str, attached: bool, duration: Duration) {
    let attached = if attached { "true" } else { "false" };
    counter!(
        "snapshot_archiver_exports_total",
        "outcome" => outcome.to_string(),
        "attached" => attached
    )
    .increment(1);
    histogram!("snapshot_archiver_export_duration_seconds", "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}

/// Record one export task status poll.
pub fn record_export_poll(status: &str) {
    counter!("snapshot_archiver_export_polls_total", "status" => status.to_string()).increment(1);
}

/// Gauge for engine state.
pub fn set_engine_state(state: &str) {
    // Encode state as numeric for alerting
    let value = match state {
        "Created" => 0.0,
        "Listing" => 1.0,
        "Exporting" => 2.0,
        "Sleeping" => 3.0,
        "Stopped" => 4.0,
        "Failed" => 5.0,
        _ => -1.0,
    };
    gauge!("snapshot_archiver_engine_state").set(value);
}
