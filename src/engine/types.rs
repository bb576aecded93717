// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine state types.
//!
//! # State Transitions
//!
//! ```text
//!            run()
//! Created ──────────► Listing ──(list error)──► Failed
//!                        │
//!                        ▼
//!                    Exporting ──(shutdown)──┐
//!                        │                   │
//!                        ▼                   ▼
//!                    Sleeping ──(shutdown)─► Stopped
//!                        │
//!                        └──(interval)──► Listing
//! ```

use crate::orchestrator::ExportOutcome;

/// State of the archive engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Engine created but `run()` not called yet.
    Created,
    /// Listing source snapshots and the destination archive.
    Listing,
    /// Exporting pending snapshots one at a time.
    Exporting,
    /// Waiting for the next cycle.
    Sleeping,
    /// Shutdown completed.
    Stopped,
    /// A listing error ended the run.
    Failed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Created => write!(f, "Created"),
            EngineState::Listing => write!(f, "Listing"),
            EngineState::Exporting => write!(f, "Exporting"),
            EngineState::Sleeping => write!(f, "Sleeping"),
            EngineState::Stopped => write!(f, "Stopped"),
            EngineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Statistics from one reconciliation cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    /// Snapshots listed in the source
    pub source_snapshots: usize,
    /// Snapshots already in the archive
    pub archived_snapshots: usize,
    /// Snapshots that needed exporting this cycle
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Snapshots that vanished before their export started
    pub skipped: usize,
    /// Exports that attached to an existing task
    pub attached: usize,
}

impl CycleStats {
    /// Count one export outcome.
    pub fn record(&mut self, outcome: &ExportOutcome) {
        match outcome {
            ExportOutcome::Skipped => self.skipped += 1,
            ExportOutcome::Succeeded { .. } => self.succeeded += 1,
            ExportOutcome::Failed { .. } => self.failed += 1,
            ExportOutcome::TimedOut { .. } => self.timed_out += 1,
        }
        if outcome.attached() {
            self.attached += 1;
        }
    }

    /// Number of exports that ran and did not succeed.
    pub fn unsuccessful(&self) -> usize {
        self.failed + self.timed_out
    }
}
