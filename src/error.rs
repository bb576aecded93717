// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the snapshot archiver.
//!
//! Errors are categorized by the collaborator they came from (snapshot source,
//! destination archive, export service, identity provider) and carry enough
//! context to identify the snapshot or bucket involved.
//!
//! # Error Categories
//!
//! | Error Type | Fatal | Description |
//! |------------|-------|-------------|
//! | `Source` | Yes | Listing or describing snapshots failed |
//! | `Archive` | Yes | Listing the destination bucket failed |
//! | `Identity` | Yes | Export role could not be resolved at startup |
//! | `Config` | Yes | Configuration invalid |
//! | `Metrics` | Yes | Metrics exporter could not be installed |
//! | `Export` | No | One snapshot's export failed (recorded, loop continues) |
//! | `Shutdown` | No | Operator requested shutdown |
//!
//! # Fatal Errors
//!
//! Use [`ArchiveError::is_fatal()`] to decide whether the daemon should exit.
//! Fatal errors surface from the listing phase of a cycle or from startup; the
//! daemon relies on its supervisor to restart it. Per-snapshot failures never
//! escape the orchestrator, so they are not fatal.
//!
//! Export submission has its own classification, [`SubmitError`], so the
//! "task already exists" case can be matched structurally.

use thiserror::Error;

/// Result type alias for archiver operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors that can occur while archiving snapshots.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Snapshot source (RDS) call failed.
    #[error("Snapshot source error ({operation}): {message}")]
    Source { operation: String, message: String },

    /// Destination archive (S3) listing failed.
    #[error("Archive error ({location}): {message}")]
    Archive { location: String, message: String },

    /// Export task call failed for one snapshot.
    #[error("Export error ({task_id}): {message}")]
    Export { task_id: String, message: String },

    /// The export role could not be resolved.
    #[error("Identity error ({role}): {message}")]
    Identity { role: String, message: String },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics exporter setup failed.
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Shutdown in progress.
    ///
    /// Always propagates; never recorded as an export failure.
    #[error("Shutdown in progress")]
    Shutdown,
}

impl ArchiveError {
    /// Create a snapshot source error.
    pub fn snapshot_source(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Source {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Create a destination archive error.
    pub fn archive(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Archive {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Create an export error for a task.
    pub fn export(task_id: impl Into<String>, message: impl ToString) -> Self {
        Self::Export {
            task_id: task_id.into(),
            message: message.to_string(),
        }
    }

    /// Create an identity resolution error.
    pub fn identity(role: impl Into<String>, message: impl ToString) -> Self {
        Self::Identity {
            role: role.into(),
            message: message.to_string(),
        }
    }

    /// Check if this error should terminate the daemon.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Source { .. } => true,
            Self::Archive { .. } => true,
            Self::Identity { .. } => true,
            Self::Config(_) => true,
            Self::Metrics(_) => true,
            Self::Export { .. } => false, // Recorded per snapshot
            Self::Shutdown => false,
        }
    }

    /// Check if this is a shutdown signal rather than a failure.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

/// Why an export submission was rejected.
///
/// The export service names tasks after the snapshot they export, so a second
/// submission for the same snapshot is rejected with [`SubmitError::AlreadyExists`].
/// Callers attach to the existing task instead of treating that as a failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// A task with this identifier already exists (running or finished).
    #[error("export task {task_id} already exists")]
    AlreadyExists { task_id: String },

    /// Any other rejection (quota, permissions, invalid key, network).
    #[error("export submission for {task_id} failed: {message}")]
    Other { task_id: String, message: String },
}

impl SubmitError {
    /// Create a non-conflict submission error.
    pub fn other(task_id: impl Into<String>, message: impl ToString) -> Self {
        Self::Other {
            task_id: task_id.into(),
            message: message.to_string(),
        }
    }

    /// Check if this rejection means the task is already there to attach to.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

impl From<SubmitError> for ArchiveError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::AlreadyExists { task_id } => {
                Self::export(task_id, "export task already exists")
            }
            SubmitError::Other { task_id, message } => Self::Export { task_id, message },
        }
    }
}
