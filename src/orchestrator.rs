// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Export orchestration for a single snapshot.
//!
//! # Lifecycle
//!
//! ```text
//!  describe_snapshot ──(gone)──────────────────────────────► Skipped (no metrics)
//!         │
//!         ▼
//!  backup_start_time
//!         │
//!  start_export ──(AlreadyExists)──┐
//!         │ (ok)                   │ attach
//!         ▼                        ▼
//!  wait_for_export ◄───────────────┘
//!         │
//!         ├─ COMPLETE / task vanished ──► backup_success = 1
//!         ├─ any other terminal status ─► backup_success = 0
//!         ├─ max_wait exceeded ─────────► backup_success = 0
//!         └─ submit/poll error, panic ──► backup_success = 0
//!         │
//!         ▼
//!  backup_end_time (always, once started)
//! ```
//!
//! # Idempotency
//!
//! Tasks are named after the snapshot they export. If a previous cycle, an
//! interrupted process or a second daemon already submitted the export, the
//! service rejects the new submission with [`SubmitError::AlreadyExists`](crate::error::SubmitError::AlreadyExists) and
//! we poll the existing task instead. No duplicate export is ever started.
//!
//! # Failure Isolation
//!
//! Nothing about one snapshot can abort the cycle: every error and panic in
//! the lookup/submit/poll phases becomes [`ExportOutcome::Failed`]. The only
//! error that escapes is [`ArchiveError::Shutdown`].

use crate::backend::{ExportRequest, ExportService, ExportStatus, SnapshotInfo, SnapshotSource};
use crate::config::PollPolicy;
use crate::error::{ArchiveError, Result};
use crate::metrics::{self, BackupMetrics};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Result of [`ExportOrchestrator::export_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The snapshot disappeared before the export started. Nothing recorded.
    Skipped,
    /// The export completed (or its task is gone, nothing left to wait for).
    Succeeded { attached: bool },
    /// The export failed, was canceled, or could not be submitted.
    Failed { attached: bool, reason: String },
    /// The task was still running after `max_wait`.
    TimedOut { attached: bool, waited: Duration },
}

impl ExportOutcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
        }
    }

    /// Whether `backup_success` was set to 1.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Whether we attached to a task submitted by someone else.
    pub fn attached(&self) -> bool {
        match self {
            Self::Skipped => false,
            Self::Succeeded { attached }
            | Self::Failed { attached, .. }
            | Self::TimedOut { attached, .. } => *attached,
        }
    }
}

/// Result of polling one export task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    /// The task no longer exists. Treated as resolved.
    Vanished,
    /// The task reached a terminal status.
    Terminal(ExportStatus),
    /// The task was still pending when `max_wait` ran out.
    TimedOut { waited: Duration },
}

/// Drives the export of one snapshot end-to-end and records its outcome.
pub struct ExportOrchestrator {
    source: Arc<dyn SnapshotSource>,
    exports: Arc<dyn ExportService>,
    metrics: Arc<dyn BackupMetrics>,
    poll: PollPolicy,
    shutdown_rx: watch::Receiver<bool>,
}

impl ExportOrchestrator {
    /// Create an orchestrator.
    ///
    /// Setting `shutdown_rx` to `true` interrupts polling with
    /// [`ArchiveError::Shutdown`].
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        exports: Arc<dyn ExportService>,
        metrics: Arc<dyn BackupMetrics>,
        poll: PollPolicy,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            exports,
            metrics,
            poll,
            shutdown_rx,
        }
    }

    /// Polling settings in use.
    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Export one snapshot to `destination`.
    ///
    /// Never fails for per-snapshot reasons; see [`ExportOutcome`]. Returns
    /// `Err(ArchiveError::Shutdown)` if shutdown was requested before or
    /// during the export. Nothing is submitted once shutdown is requested.
    #[instrument(skip_all, fields(snapshot_id = %snapshot_id))]
    pub async fn export_snapshot(
        &self,
        destination: &str,
        snapshot_id: &str,
        identity: &str,
        kms_key: &str,
    ) -> Result<ExportOutcome> {
        if *self.shutdown_rx.borrow() {
            return Err(ArchiveError::Shutdown);
        }

        let snapshot = match self.lookup_snapshot(snapshot_id).await {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => {
                debug!("Snapshot no longer exists, skipping");
                return Ok(ExportOutcome::Skipped);
            }
            Err(e) => Err(e),
        };

        info!(destination = %destination, "Backing up snapshot");
        let started = Instant::now();
        self.metrics.record_start(snapshot_id);

        // Set by attempt_export, read back if it panics
        let attached = AtomicBool::new(false);
        let attempt = AssertUnwindSafe(self.attempt_export(
            snapshot,
            snapshot_id,
            destination,
            identity,
            kms_key,
            &attached,
        ))
        .catch_unwind()
        .await;

        let outcome = match attempt {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(ArchiveError::Shutdown)) => {
                warn!("Shutdown requested while waiting for export, task keeps running");
                self.metrics.record_end(snapshot_id);
                return Err(ArchiveError::Shutdown);
            }
            Ok(Err(e)) => ExportOutcome::Failed {
                attached: attached.load(Ordering::SeqCst),
                reason: e.to_string(),
            },
            Err(panic) => ExportOutcome::Failed {
                attached: attached.load(Ordering::SeqCst),
                reason: format!("panic during export: {}", panic_message(&panic)),
            },
        };

        self.metrics.record_success(snapshot_id, outcome.is_success());
        match &outcome {
            ExportOutcome::Succeeded { attached } => {
                info!(attached, "Snapshot successfully backed up");
            }
            ExportOutcome::Failed { attached, reason } => {
                error!(attached, error = %reason, "Failed to backup snapshot");
            }
            ExportOutcome::TimedOut { attached, waited } => {
                error!(
                    attached,
                    waited_secs = waited.as_secs(),
                    "Gave up waiting for export task"
                );
            }
            ExportOutcome::Skipped => {}
        }

        self.metrics.record_end(snapshot_id);
        metrics::record_export_outcome(outcome.label(), outcome.attached(), started.elapsed());
        Ok(outcome)
    }

    /// Look up a snapshot. A panicking source counts as a lookup error.
    async fn lookup_snapshot(&self, snapshot_id: &str) -> Result<Option<SnapshotInfo>> {
        let lookup = AssertUnwindSafe(async { self.source.describe_snapshot(snapshot_id).await })
            .catch_unwind()
            .await;

        match lookup {
            Ok(result) => result,
            Err(panic) => Err(ArchiveError::snapshot_source(
                "describe_snapshot",
                format!("panic during lookup: {}", panic_message(&panic)),
            )),
        }
    }

    /// Submit (or attach to) the export task and wait for it.
    async fn attempt_export(
        &self,
        snapshot: Result<SnapshotInfo>,
        snapshot_id: &str,
        destination: &str,
        identity: &str,
        kms_key: &str,
        attached_flag: &AtomicBool,
    ) -> Result<ExportOutcome> {
        let snapshot = snapshot?;
        let request = ExportRequest {
            task_id: snapshot_id.to_string(),
            source_ref: snapshot.source_ref,
            destination: destination.to_string(),
            identity: identity.to_string(),
            kms_key: kms_key.to_string(),
        };

        let (task_id, attached) = match self.exports.start_export(&request).await {
            Ok(task_id) => {
                debug!(task_id = %task_id, "Export task submitted");
                (task_id, false)
            }
            Err(e) if e.is_already_exists() => {
                info!("Export task already exists, attaching to it");
                attached_flag.store(true, Ordering::SeqCst);
                (request.task_id.clone(), true)
            }
            Err(e) => return Err(e.into()),
        };

        let polled = match self.wait_for_export(&task_id).await {
            Ok(polled) => polled,
            Err(ArchiveError::Shutdown) => return Err(ArchiveError::Shutdown),
            Err(e) => {
                return Ok(ExportOutcome::Failed {
                    attached,
                    reason: e.to_string(),
                })
            }
        };

        Ok(match polled {
            PollResult::Vanished => ExportOutcome::Succeeded { attached },
            PollResult::Terminal(status) if status.is_complete() => {
                ExportOutcome::Succeeded { attached }
            }
            PollResult::Terminal(status) => ExportOutcome::Failed {
                attached,
                reason: format!("export task {task_id} ended with status {status}"),
            },
            PollResult::TimedOut { waited } => ExportOutcome::TimedOut { attached, waited },
        })
    }

    /// Poll an export task until it is no longer pending.
    ///
    /// Sleeps [`PollPolicy::interval`] between checks. Without `max_wait` this
    /// waits as long as the task runs.
    pub async fn wait_for_export(&self, task_id: &str) -> Result<PollResult> {
        let started = Instant::now();
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            let status = match self.exports.describe_export(task_id).await? {
                Some(status) => status,
                None => {
                    debug!(task_id = %task_id, "Export task not found, nothing to wait for");
                    return Ok(PollResult::Vanished);
                }
            };
            metrics::record_export_poll(&status.to_string());

            if !status.is_pending() {
                info!(task_id = %task_id, status = %status, "Export task ended");
                return Ok(PollResult::Terminal(status));
            }

            let waited = started.elapsed();
            if let Some(max_wait) = self.poll.max_wait {
                if waited >= max_wait {
                    return Ok(PollResult::TimedOut { waited });
                }
            }

            debug!(
                task_id = %task_id,
                status = %status,
                waited_secs = waited.as_secs(),
                "Export task still running"
            );

            tokio::select! {
                biased;

                _ = shutdown_requested(&mut shutdown_rx) => {
                    return Err(ArchiveError::Shutdown);
                }
                _ = tokio::time::sleep(self.poll.interval) => {}
            }
        }
    }
}

/// Resolve once shutdown has been requested.
///
/// Never resolves if the sender is gone, since then nobody can request it.
pub(crate) async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let requested = shutdown_rx.wait_for(|stop| *stop).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
