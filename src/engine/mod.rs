// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reconciliation loop.
//!
//! Each cycle:
//! 1. Lists automated snapshots from the source
//! 2. Lists snapshots already archived in the destination bucket
//! 3. Diffs the two
//! 4. Exports every pending snapshot, one at a time
//! 5. Sleeps for the refresh interval
//!
//! # Sequential Exports
//!
//! Exports never overlap. The export service rate-limits tasks per account
//! and region, so a cycle with N pending snapshots takes roughly N export
//! durations.
//!
//! # Errors
//!
//! Listing errors end [`ArchiveEngine::run`] with the error and the daemon
//! exits for its supervisor to restart it. Export errors are recorded per
//! snapshot by the orchestrator and never reach this level. Shutdown stops the
//! loop cleanly, even mid-poll; the export task keeps running remotely and is
//! attached to on the next start. No new export is submitted after shutdown
//! is requested.

mod types;

pub use types::{CycleStats, EngineState};

use crate::backend::{ArchiveInventory, ExportService, SnapshotSource};
use crate::config::ArchiverConfig;
use crate::diff::snapshots_to_export;
use crate::error::{ArchiveError, Result};
use crate::metrics::{self, BackupMetrics};
use crate::orchestrator::{shutdown_requested, ExportOrchestrator};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, Instrument};

/// The external systems the engine works against.
#[derive(Clone)]
pub struct Backends {
    pub source: Arc<dyn SnapshotSource>,
    pub archive: Arc<dyn ArchiveInventory>,
    pub exports: Arc<dyn ExportService>,
}

/// The archive engine: runs reconciliation cycles until shutdown.
pub struct ArchiveEngine {
    destination: String,
    kms_key: String,
    identity: String,
    refresh_interval: Duration,

    source: Arc<dyn SnapshotSource>,
    archive: Arc<dyn ArchiveInventory>,
    orchestrator: ExportOrchestrator,

    /// Engine state (broadcast to watchers)
    state_tx: watch::Sender<EngineState>,
    state_rx: watch::Receiver<EngineState>,

    shutdown_rx: watch::Receiver<bool>,
}

impl ArchiveEngine {
    /// Create an engine.
    ///
    /// # Arguments
    /// * `config` - Validated daemon configuration
    /// * `identity` - Resolved export role, reused for every export
    /// * `backends` - Source, archive and export service
    /// * `backup_metrics` - Sink for per-snapshot gauges
    /// * `shutdown_rx` - Set to `true` to stop the engine
    pub fn new(
        config: &ArchiverConfig,
        identity: impl Into<String>,
        backends: Backends,
        backup_metrics: Arc<dyn BackupMetrics>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        config.validate()?;
        let refresh_interval = config.refresh_interval_duration()?;
        let poll = config.poll.policy()?;

        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        let orchestrator = ExportOrchestrator::new(
            Arc::clone(&backends.source),
            backends.exports,
            backup_metrics,
            poll,
            shutdown_rx.clone(),
        );

        Ok(Self {
            destination: config.destination_bucket.clone(),
            kms_key: config.kms_key.clone(),
            identity: identity.into(),
            refresh_interval,
            source: backends.source,
            archive: backends.archive,
            orchestrator,
            state_tx,
            state_rx,
            shutdown_rx,
        })
    }

    /// Get current engine state.
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    /// Destination bucket.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Pause between cycles.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    fn set_state(&self, state: EngineState) {
        let _ = self.state_tx.send(state);
        metrics::set_engine_state(&state.to_string());
    }

    /// Run cycles until shutdown or a listing error.
    ///
    /// Returns `Ok(())` after shutdown, or the listing error that ended the run.
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            destination = %self.destination,
            refresh_interval_secs = self.refresh_interval.as_secs(),
            "Starting archive engine"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(_) => {}
                Err(ArchiveError::Shutdown) => break,
                Err(e) => {
                    error!(error = %e, "Reconciliation cycle failed");
                    self.set_state(EngineState::Failed);
                    return Err(e);
                }
            }

            self.set_state(EngineState::Sleeping);
            debug!(
                refresh_interval_secs = self.refresh_interval.as_secs(),
                "Sleeping until next cycle"
            );

            tokio::select! {
                biased;

                _ = shutdown_requested(&mut shutdown_rx) => break,
                _ = tokio::time::sleep(self.refresh_interval) => {}
            }
        }

        self.set_state(EngineState::Stopped);
        info!("Archive engine stopped");
        Ok(())
    }

    /// Run one reconciliation cycle.
    ///
    /// Fails only on listing errors or shutdown.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let span = info_span!("cycle", destination = %self.destination);
        self.run_cycle_inner().instrument(span).await
    }

    async fn run_cycle_inner(&self) -> Result<CycleStats> {
        let cycle_start = Instant::now();
        self.set_state(EngineState::Listing);

        let source_ids = self.source.list_snapshots().await.inspect_err(|_| {
            metrics::record_cycle_failed("source");
        })?;
        let archived_ids = self
            .archive
            .list_archived(&self.destination)
            .await
            .inspect_err(|_| {
                metrics::record_cycle_failed("archive");
            })?;

        let pending = snapshots_to_export(&source_ids, &archived_ids);
        let mut stats = CycleStats {
            source_snapshots: source_ids.len(),
            archived_snapshots: archived_ids.len(),
            pending: pending.len(),
            ..Default::default()
        };

        info!(
            source = stats.source_snapshots,
            archived = stats.archived_snapshots,
            pending = stats.pending,
            "Snapshot inventories listed"
        );

        if !pending.is_empty() {
            self.set_state(EngineState::Exporting);
        }

        for (done, snapshot_id) in pending.iter().enumerate() {
            if *self.shutdown_rx.borrow() {
                info!(
                    remaining = pending.len() - done,
                    "Shutdown requested, leaving remaining snapshots for the next run"
                );
                return Err(ArchiveError::Shutdown);
            }
            let outcome = self
                .orchestrator
                .export_snapshot(&self.destination, snapshot_id, &self.identity, &self.kms_key)
                .await?;
            stats.record(&outcome);
        }

        let duration = cycle_start.elapsed();
        metrics::record_cycle_complete(
            stats.source_snapshots,
            stats.archived_snapshots,
            stats.pending,
            duration,
        );

        if stats.pending > 0 {
            info!(
                succeeded = stats.succeeded,
                unsuccessful = stats.unsuccessful(),
                skipped = stats.skipped,
                attached = stats.attached,
                duration_ms = duration.as_millis() as u64,
                "Reconciliation cycle complete"
            );
        } else {
            debug!("Reconciliation cycle complete, archive up to date");
        }

        Ok(stats)
    }
}
