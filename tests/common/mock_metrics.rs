// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Recording backup metrics sink.

use snapshot_archiver::{BackupMetrics, BackupSeries};
use std::collections::HashMap;
use std::sync::Mutex;

/// A recorded gauge write.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeWrite {
    pub series: BackupSeries,
    pub snapshot_id: String,
    pub value: f64,
}

/// Records every gauge write; keeps the last value per series and snapshot.
#[derive(Default)]
pub struct RecordingMetrics {
    writes: Mutex<Vec<GaugeWrite>>,
    values: Mutex<HashMap<(BackupSeries, String), f64>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a gauge, if it was ever set.
    pub fn value(&self, series: BackupSeries, snapshot_id: &str) -> Option<f64> {
        self.values
            .lock()
            .unwrap()
            .get(&(series, snapshot_id.to_string()))
            .copied()
    }

    /// `backup_success` for a snapshot.
    pub fn success(&self, snapshot_id: &str) -> Option<f64> {
        self.value(BackupSeries::Success, snapshot_id)
    }

    pub fn has_start(&self, snapshot_id: &str) -> bool {
        self.value(BackupSeries::StartTime, snapshot_id).is_some()
    }

    pub fn has_end(&self, snapshot_id: &str) -> bool {
        self.value(BackupSeries::EndTime, snapshot_id).is_some()
    }

    /// All writes in order.
    pub fn writes(&self) -> Vec<GaugeWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// Writes touching one snapshot, in order.
    pub fn writes_for(&self, snapshot_id: &str) -> Vec<BackupSeries> {
        self.writes()
            .into_iter()
            .filter(|w| w.snapshot_id == snapshot_id)
            .map(|w| w.series)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.lock().unwrap().is_empty()
    }
}

impl BackupMetrics for RecordingMetrics {
    fn set_gauge(&self, series: BackupSeries, snapshot_id: &str, value: f64) {
        self.writes.lock().unwrap().push(GaugeWrite {
            series,
            snapshot_id: snapshot_id.to_string(),
            value,
        });
        self.values
            .lock()
            .unwrap()
            .insert((series, snapshot_id.to_string()), value);
    }
}
