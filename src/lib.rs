// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Snapshot Archiver
//!
//! A daemon that keeps an object storage bucket in step with a database
//! service's automated snapshots, exporting every snapshot the bucket is
//! missing.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          snapshot-archiver                           │
//! │                                                                      │
//! │  ┌────────────────┐   ┌───────────────────┐                          │
//! │  │ SnapshotSource │   │ ArchiveInventory  │                          │
//! │  │ (RDS)          │   │ (S3 prefixes)     │                          │
//! │  └───────┬────────┘   └─────────┬─────────┘                          │
//! │          └──────────┬───────────┘                                    │
//! │                     ▼                                                │
//! │            snapshots_to_export ──► ExportOrchestrator ──► ExportService
//! │                                          │                 (RDS tasks)
//! │                                          ▼                           │
//! │                                   MetricRegistry                     │
//! │                                   (backup_* gauges, /metrics)        │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ArchiveEngine`] runs one reconciliation cycle, sleeps for the refresh
//! interval and repeats until shutdown.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use snapshot_archiver::{ArchiveEngine, ArchiverConfig, Backends, MetricRegistry};
//! use snapshot_archiver::aws::{RdsExportService, RdsSnapshotSource, S3ArchiveInventory};
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> snapshot_archiver::Result<()> {
//!     let config = ArchiverConfig {
//!         destination_bucket: "db-archive".into(),
//!         kms_key: "alias/db-archive".into(),
//!         ..Default::default()
//!     };
//!     let sdk = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
//!     let backends = Backends {
//!         source: Arc::new(RdsSnapshotSource::new(&sdk)),
//!         archive: Arc::new(S3ArchiveInventory::new(&sdk)),
//!         exports: Arc::new(RdsExportService::new(&sdk)),
//!     };
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     let engine = ArchiveEngine::new(
//!         &config,
//!         "arn:aws:iam::123456789012:role/snapshot-archiver",
//!         backends,
//!         Arc::new(MetricRegistry::new()),
//!         shutdown_rx,
//!     )?;
//!     engine.run().await
//! }
//! ```

pub mod aws;
pub mod backend;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod orchestrator;

// Re-exports for convenience
pub use backend::{
    ArchiveInventory, ExportRequest, ExportService, ExportStatus, IdentityProvider, SnapshotInfo,
    SnapshotSource, StaticIdentity,
};
pub use config::{ArchiverConfig, PollConfig, PollPolicy};
pub use diff::snapshots_to_export;
pub use engine::{ArchiveEngine, Backends, CycleStats, EngineState};
pub use error::{ArchiveError, Result, SubmitError};
pub use metrics::{BackupMetrics, BackupSeries, MetricRegistry};
pub use orchestrator::{ExportOrchestrator, ExportOutcome, PollResult};
