//! Shared test utilities for integration and chaos tests.
//!
//! This module provides:
//! - Mock RDS (snapshot source + export tasks) and archive bucket
//! - Recording backup metrics
//! - Builders wiring them into an orchestrator or engine

#![allow(dead_code)]

pub mod mock_metrics;
pub mod mock_rds;

pub use mock_metrics::*;
pub use mock_rds::*;

use snapshot_archiver::{
    ArchiveEngine, ArchiverConfig, Backends, ExportOrchestrator, PollPolicy,
};
use std::sync::Arc;
use tokio::sync::watch;

pub const BUCKET: &str = "db-archive";
pub const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/snapshot-archiver";
pub const KMS_KEY: &str = "alias/db-archive";

/// An orchestrator wired to shared mocks.
pub struct OrchestratorHarness {
    pub rds: Arc<MockRds>,
    pub metrics: Arc<RecordingMetrics>,
    pub orchestrator: ExportOrchestrator,
    pub shutdown_tx: watch::Sender<bool>,
}

impl OrchestratorHarness {
    pub fn new(rds: MockRds, poll: PollPolicy) -> Self {
        let rds = Arc::new(rds);
        let metrics = Arc::new(RecordingMetrics::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let orchestrator = ExportOrchestrator::new(
            rds.clone(),
            rds.clone(),
            metrics.clone(),
            poll,
            shutdown_rx,
        );
        Self {
            rds,
            metrics,
            orchestrator,
            shutdown_tx,
        }
    }

    /// Another orchestrator sharing the same mocks, like a second daemon.
    pub fn sibling(&self) -> ExportOrchestrator {
        ExportOrchestrator::new(
            self.rds.clone(),
            self.rds.clone(),
            self.metrics.clone(),
            self.orchestrator.poll_policy(),
            self.shutdown_tx.subscribe(),
        )
    }
}

/// An engine wired to shared mocks.
pub struct EngineHarness {
    pub rds: Arc<MockRds>,
    pub archive: Arc<MockArchive>,
    pub metrics: Arc<RecordingMetrics>,
    pub engine: Arc<ArchiveEngine>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl EngineHarness {
    pub fn new(rds: MockRds, archive: MockArchive) -> Self {
        Self::with_config(rds, archive, ArchiverConfig::for_testing(BUCKET))
    }

    pub fn with_config(rds: MockRds, archive: MockArchive, config: ArchiverConfig) -> Self {
        let rds = Arc::new(rds);
        let archive = Arc::new(archive);
        let metrics = Arc::new(RecordingMetrics::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let backends = Backends {
            source: rds.clone(),
            archive: archive.clone(),
            exports: rds.clone(),
        };
        let engine = ArchiveEngine::new(&config, ROLE_ARN, backends, metrics.clone(), shutdown_rx)
            .expect("valid test config");
        Self {
            rds,
            archive,
            metrics,
            engine: Arc::new(engine),
            shutdown_tx,
        }
    }
}
