// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collaborator traits.
//!
//! The archiver talks to four external systems. Each is behind a narrow trait
//! so the reconciliation logic can be driven by in-memory fakes in tests and by
//! the AWS adapters in [`crate::aws`] in production:
//!
//! | Trait | Production | Purpose |
//! |-------|------------|---------|
//! | [`SnapshotSource`] | RDS | List automated snapshots, look one up |
//! | [`ArchiveInventory`] | S3 | List snapshots already archived |
//! | [`ExportService`] | RDS export tasks | Submit and poll exports |
//! | [`IdentityProvider`] | IAM | Resolve the export role once |
//!
//! # Example
//!
//! ```rust,no_run
//! use snapshot_archiver::backend::{ArchiveInventory, BoxFuture};
//!
//! struct StaticArchive(Vec<String>);
//!
//! impl ArchiveInventory for StaticArchive {
//!     fn list_archived(&self, _location: &str) -> BoxFuture<'_, Vec<String>> {
//!         let ids = self.0.clone();
//!         Box::pin(async move { Ok(ids) })
//!     }
//! }
//! ```

use crate::error::{Result, SubmitError};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Boxed future for export submission, which has its own error classification.
pub type SubmitFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<String, SubmitError>> + Send + 'a>>;

/// A snapshot as seen by the source system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Snapshot identifier, without any system prefix.
    pub id: String,
    /// Opaque reference the export service needs to read the snapshot (an ARN).
    pub source_ref: String,
}

/// Everything the export service needs to start one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Task identifier. Always the snapshot identifier, which makes
    /// resubmission idempotent.
    pub task_id: String,
    /// Snapshot reference from [`SnapshotInfo::source_ref`].
    pub source_ref: String,
    /// Destination bucket.
    pub destination: String,
    /// Role the export service assumes to write to the destination.
    pub identity: String,
    /// Key used to encrypt the exported data.
    pub kms_key: String,
}

/// Status of an export task.
///
/// `Starting` and `InProgress` are pending; everything else is terminal.
/// Only [`ExportStatus::Complete`] counts as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Starting,
    InProgress,
    Complete,
    Failed,
    Canceling,
    Canceled,
    /// A status this crate doesn't know about. Treated as terminal.
    Other(String),
}

impl ExportStatus {
    /// Parse a status string as reported by the export service.
    ///
    /// Matching ignores case and accepts `-`/space as `_`.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "STARTING" => Self::Starting,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETE" => Self::Complete,
            "FAILED" => Self::Failed,
            "CANCELING" => Self::Canceling,
            "CANCELED" => Self::Canceled,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// The task is still running; poll again later.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Starting | Self::InProgress)
    }

    /// The task finished and the data is in the destination.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "STARTING"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Failed => write!(f, "FAILED"),
            Self::Canceling => write!(f, "CANCELING"),
            Self::Canceled => write!(f, "CANCELED"),
            Self::Other(raw) => write!(f, "{}", raw),
        }
    }
}

impl From<&str> for ExportStatus {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// Source of exportable snapshots.
pub trait SnapshotSource: Send + Sync {
    /// List identifiers of every automated snapshot currently known.
    fn list_snapshots(&self) -> BoxFuture<'_, Vec<String>>;

    /// Look up one snapshot by identifier.
    ///
    /// Returns `Ok(None)` if the snapshot no longer exists (deleted by
    /// retention between listing and export).
    fn describe_snapshot(&self, snapshot_id: &str) -> BoxFuture<'_, Option<SnapshotInfo>>;
}

/// Destination archive listing.
pub trait ArchiveInventory: Send + Sync {
    /// List snapshot identifiers already archived at `location`, one per
    /// top-level grouping. An empty location yields an empty list.
    fn list_archived(&self, location: &str) -> BoxFuture<'_, Vec<String>>;
}

/// Export task service.
pub trait ExportService: Send + Sync {
    /// Submit a new export task named `request.task_id`.
    ///
    /// Returns the identifier of the created task, or
    /// [`SubmitError::AlreadyExists`] if a task with that name exists.
    fn start_export(&self, request: &ExportRequest) -> SubmitFuture<'_>;

    /// Get the current status of a task.
    ///
    /// Returns `Ok(None)` if no task with that identifier exists.
    fn describe_export(&self, task_id: &str) -> BoxFuture<'_, Option<ExportStatus>>;
}

/// Resolves the role used to authorize exports.
pub trait IdentityProvider: Send + Sync {
    /// Resolve a role name to a reference usable in [`ExportRequest::identity`].
    fn resolve_role(&self, role_name: &str) -> BoxFuture<'_, String>;
}

/// Identity provider that returns a fixed reference.
///
/// For tests and for deployments where the role ARN is known up front.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub String);

impl IdentityProvider for StaticIdentity {
    fn resolve_role(&self, role_name: &str) -> BoxFuture<'_, String> {
        tracing::debug!(role = %role_name, identity = %self.0, "Using static identity");
        let identity = self.0.clone();
        Box::pin(async move { Ok(identity) })
    }
}
