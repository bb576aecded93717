// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory snapshot service and archive bucket.
//!
//! `MockRds` plays both the snapshot source and the export service, like the
//! real RDS API does. Export tasks follow a scripted status sequence: each
//! poll pops the next status, and the last one sticks.

use snapshot_archiver::backend::{
    ArchiveInventory, BoxFuture, ExportRequest, ExportService, ExportStatus, SnapshotInfo,
    SnapshotSource, SubmitFuture,
};
use snapshot_archiver::{ArchiveError, SubmitError};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Scripted export task.
#[derive(Debug, Clone)]
struct MockTask {
    statuses: VecDeque<ExportStatus>,
}

impl MockTask {
    fn new(statuses: Vec<ExportStatus>) -> Self {
        assert!(!statuses.is_empty(), "a task needs at least one status");
        Self {
            statuses: statuses.into(),
        }
    }

    fn poll(&mut self) -> ExportStatus {
        if self.statuses.len() > 1 {
            self.statuses.pop_front().unwrap_or(ExportStatus::Complete)
        } else {
            self.statuses[0].clone()
        }
    }
}

/// Mock RDS: snapshot listing, lookup and export tasks.
///
/// # Example
/// ```rust,ignore
/// let rds = MockRds::with_snapshots(&["snap-a", "snap-b"]);
/// rds.seed_task("snap-b", vec![ExportStatus::InProgress, ExportStatus::Complete]).await;
///
/// // Use in tests...
///
/// assert_eq!(rds.submitted().await.len(), 1);
/// ```
pub struct MockRds {
    /// Listed snapshots, in listing order
    snapshots: RwLock<Vec<String>>,
    /// Snapshots that still list but no longer describe
    vanished: RwLock<Vec<String>>,
    /// Export tasks by identifier
    tasks: RwLock<HashMap<String, MockTask>>,
    /// Statuses a newly submitted task walks through
    default_script: RwLock<Vec<ExportStatus>>,
    /// Successful submissions
    submissions: RwLock<Vec<ExportRequest>>,
    submit_attempts: AtomicUsize,
    polls: AtomicUsize,
    fail_list: AtomicBool,
    fail_describe: AtomicBool,
    fail_poll: AtomicBool,
    submit_error: RwLock<Option<String>>,
    panic_on_submit: AtomicBool,
    panic_on_poll: AtomicBool,
}

impl MockRds {
    /// Create a mock with no snapshots. New tasks go IN_PROGRESS then COMPLETE.
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(Vec::new()),
            vanished: RwLock::new(Vec::new()),
            tasks: RwLock::new(HashMap::new()),
            default_script: RwLock::new(vec![ExportStatus::InProgress, ExportStatus::Complete]),
            submissions: RwLock::new(Vec::new()),
            submit_attempts: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            fail_list: AtomicBool::new(false),
            fail_describe: AtomicBool::new(false),
            fail_poll: AtomicBool::new(false),
            submit_error: RwLock::new(None),
            panic_on_submit: AtomicBool::new(false),
            panic_on_poll: AtomicBool::new(false),
        }
    }

    /// Create a mock listing the given snapshots.
    pub fn with_snapshots(ids: &[&str]) -> Self {
        let mock = Self::new();
        *mock.snapshots.try_write().expect("fresh lock") =
            ids.iter().map(|s| s.to_string()).collect();
        mock
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Make a snapshot disappear between listing and lookup.
    pub async fn vanish_snapshot(&self, id: &str) {
        self.vanished.write().await.push(id.to_string());
    }

    /// Create an export task as if someone else had already submitted it.
    pub async fn seed_task(&self, task_id: &str, statuses: Vec<ExportStatus>) {
        self.tasks
            .write()
            .await
            .insert(task_id.to_string(), MockTask::new(statuses));
    }

    /// Replace the remaining statuses of an existing task.
    pub async fn set_task_status(&self, task_id: &str, statuses: Vec<ExportStatus>) {
        self.seed_task(task_id, statuses).await;
    }

    /// Delete a task, so polling it returns "not found".
    pub async fn remove_task(&self, task_id: &str) {
        self.tasks.write().await.remove(task_id);
    }

    /// Statuses newly submitted tasks walk through.
    pub async fn set_default_script(&self, statuses: Vec<ExportStatus>) {
        *self.default_script.write().await = statuses;
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_describe(&self, fail: bool) {
        self.fail_describe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_poll(&self, fail: bool) {
        self.fail_poll.store(fail, Ordering::SeqCst);
    }

    /// Reject every submission with a non-conflict error.
    pub async fn reject_submissions(&self, message: &str) {
        *self.submit_error.write().await = Some(message.to_string());
    }

    pub fn panic_on_submit(&self, panic: bool) {
        self.panic_on_submit.store(panic, Ordering::SeqCst);
    }

    pub fn panic_on_poll(&self, panic: bool) {
        self.panic_on_poll.store(panic, Ordering::SeqCst);
    }

    // =========================================================================
    // Assertions
    // =========================================================================

    /// Successful submissions, in order.
    pub async fn submitted(&self) -> Vec<ExportRequest> {
        self.submissions.read().await.clone()
    }

    /// Every call to `start_export`, including rejected ones.
    pub fn submit_attempts(&self) -> usize {
        self.submit_attempts.load(Ordering::SeqCst)
    }

    /// Number of `describe_export` calls.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub async fn task_exists(&self, task_id: &str) -> bool {
        self.tasks.read().await.contains_key(task_id)
    }
}

impl Default for MockRds {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for MockRds {
    fn list_snapshots(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(async move {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(ArchiveError::snapshot_source(
                    "describe_db_snapshots",
                    "simulated throttling",
                ));
            }
            Ok(self.snapshots.read().await.clone())
        })
    }

    fn describe_snapshot(&self, snapshot_id: &str) -> BoxFuture<'_, Option<SnapshotInfo>> {
        let snapshot_id = snapshot_id.to_string();
        Box::pin(async move {
            if self.fail_describe.load(Ordering::SeqCst) {
                return Err(ArchiveError::snapshot_source(
                    "describe_db_snapshots",
                    "simulated network error",
                ));
            }
            let listed = self.snapshots.read().await.contains(&snapshot_id);
            let vanished = self.vanished.read().await.contains(&snapshot_id);
            if !listed || vanished {
                return Ok(None);
            }
            Ok(Some(SnapshotInfo {
                source_ref: format!("arn:aws:rds:eu-west-1:123456789012:snapshot:rds:{snapshot_id}"),
                id: snapshot_id,
            }))
        })
    }
}

impl ExportService for MockRds {
    fn start_export(&self, request: &ExportRequest) -> SubmitFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            self.submit_attempts.fetch_add(1, Ordering::SeqCst);

            if self.panic_on_submit.load(Ordering::SeqCst) {
                panic!("simulated SDK panic for {}", request.task_id);
            }
            if let Some(message) = self.submit_error.read().await.clone() {
                return Err(SubmitError::other(request.task_id, message));
            }

            let mut tasks = self.tasks.write().await;
            if tasks.contains_key(&request.task_id) {
                return Err(SubmitError::AlreadyExists {
                    task_id: request.task_id,
                });
            }
            let script = self.default_script.read().await.clone();
            tasks.insert(request.task_id.clone(), MockTask::new(script));
            drop(tasks);

            let task_id = request.task_id.clone();
            self.submissions.write().await.push(request);
            Ok(task_id)
        })
    }

    fn describe_export(&self, task_id: &str) -> BoxFuture<'_, Option<ExportStatus>> {
        let task_id = task_id.to_string();
        Box::pin(async move {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_poll.load(Ordering::SeqCst) {
                panic!("simulated SDK panic polling {task_id}");
            }
            if self.fail_poll.load(Ordering::SeqCst) {
                return Err(ArchiveError::export(task_id, "simulated poll failure"));
            }
            Ok(self.tasks.write().await.get_mut(&task_id).map(MockTask::poll))
        })
    }
}

/// Mock archive bucket.
pub struct MockArchive {
    archived: RwLock<Vec<String>>,
    fail_list: AtomicBool,
    /// Locations passed to `list_archived`
    listed: RwLock<Vec<String>>,
}

impl MockArchive {
    pub fn new() -> Self {
        Self::with_archived(&[])
    }

    pub fn with_archived(ids: &[&str]) -> Self {
        Self {
            archived: RwLock::new(ids.iter().map(|s| s.to_string()).collect()),
            fail_list: AtomicBool::new(false),
            listed: RwLock::new(Vec::new()),
        }
    }

    /// Add a snapshot, as a completed export would.
    pub async fn archive(&self, id: &str) {
        self.archived.write().await.push(id.to_string());
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub async fn listed_locations(&self) -> Vec<String> {
        self.listed.read().await.clone()
    }
}

impl Default for MockArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveInventory for MockArchive {
    fn list_archived(&self, location: &str) -> BoxFuture<'_, Vec<String>> {
        let location = location.to_string();
        Box::pin(async move {
            self.listed.write().await.push(location.clone());
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(ArchiveError::archive(location, "simulated access denied"));
            }
            Ok(self.archived.read().await.clone())
        })
    }
}
