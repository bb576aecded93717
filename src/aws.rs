// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! AWS adapters for the collaborator traits.
//!
//! | Adapter | Service | Trait |
//! |---------|---------|-------|
//! | [`RdsSnapshotSource`] | RDS `DescribeDBSnapshots` | [`SnapshotSource`] |
//! | [`RdsExportService`] | RDS `StartExportTask` / `DescribeExportTasks` | [`ExportService`] |
//! | [`S3ArchiveInventory`] | S3 `ListObjectsV2` | [`ArchiveInventory`] |
//! | [`IamIdentityProvider`] | IAM `GetRole` | [`IdentityProvider`] |
//!
//! All clients are built from one [`aws_config::SdkConfig`], so region and
//! credentials come from the standard AWS environment (env vars, profile,
//! instance role).
//!
//! # Naming
//!
//! RDS prefixes automated snapshot identifiers with `rds:`. Everywhere else in
//! the crate snapshot identifiers are unprefixed: the prefix is stripped when
//! listing and added back when describing. Export task identifiers and
//! archive prefixes use the unprefixed form.

use crate::backend::{
    ArchiveInventory, BoxFuture, ExportRequest, ExportService, ExportStatus, IdentityProvider,
    SnapshotInfo, SnapshotSource, SubmitFuture,
};
use crate::error::{ArchiveError, SubmitError};
use aws_config::SdkConfig;
use tracing::{debug, info};

/// Prefix RDS puts on automated snapshot identifiers.
pub const AUTOMATED_PREFIX: &str = "rds:";

/// Snapshot type filter for automated snapshots.
const AUTOMATED_SNAPSHOT_TYPE: &str = "automated";

/// Delimiter grouping archived objects by snapshot.
const ARCHIVE_DELIMITER: &str = "/";

/// Strip the `rds:` prefix from an automated snapshot identifier.
pub fn strip_automated_prefix(raw: &str) -> &str {
    raw.strip_prefix(AUTOMATED_PREFIX).unwrap_or(raw)
}

/// Add the `rds:` prefix to a snapshot identifier, unless already present.
pub fn automated_snapshot_name(snapshot_id: &str) -> String {
    if snapshot_id.starts_with(AUTOMATED_PREFIX) {
        snapshot_id.to_string()
    } else {
        format!("{AUTOMATED_PREFIX}{snapshot_id}")
    }
}

/// Turn an archive common prefix (`snap-a/`) into a snapshot identifier.
///
/// Returns `None` for an empty prefix.
pub fn prefix_to_snapshot_id(prefix: &str) -> Option<&str> {
    let id = prefix.trim_end_matches(ARCHIVE_DELIMITER);
    (!id.is_empty()).then_some(id)
}

// =============================================================================
// RDS snapshots
// =============================================================================

/// Lists and describes automated RDS snapshots.
#[derive(Debug, Clone)]
pub struct RdsSnapshotSource {
    client: aws_sdk_rds::Client,
}

impl RdsSnapshotSource {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(aws_sdk_rds::Client::new(sdk_config))
    }

    pub fn from_client(client: aws_sdk_rds::Client) -> Self {
        Self { client }
    }
}

impl SnapshotSource for RdsSnapshotSource {
    fn list_snapshots(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(async move {
            let mut ids = Vec::new();
            let mut marker: Option<String> = None;

            loop {
                let page = self
                    .client
                    .describe_db_snapshots()
                    .snapshot_type(AUTOMATED_SNAPSHOT_TYPE)
                    .set_marker(marker.take())
                    .send()
                    .await
                    .map_err(|e| {
                        ArchiveError::snapshot_source(
                            "describe_db_snapshots",
                            aws_sdk_rds::error::DisplayErrorContext(e),
                        )
                    })?;

                ids.extend(
                    page.db_snapshots()
                        .iter()
                        .filter_map(|s| s.db_snapshot_identifier())
                        .map(|id| strip_automated_prefix(id).to_string()),
                );

                match page.marker() {
                    Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                    _ => break,
                }
            }

            debug!(count = ids.len(), "Listed automated snapshots");
            Ok(ids)
        })
    }

    fn describe_snapshot(&self, snapshot_id: &str) -> BoxFuture<'_, Option<SnapshotInfo>> {
        let snapshot_id = snapshot_id.to_string();
        Box::pin(async move {
            let result = self
                .client
                .describe_db_snapshots()
                .db_snapshot_identifier(automated_snapshot_name(&snapshot_id))
                .send()
                .await;

            let output = match result {
                Ok(output) => output,
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_db_snapshot_not_found_fault()) =>
                {
                    return Ok(None);
                }
                Err(e) => {
                    return Err(ArchiveError::snapshot_source(
                        "describe_db_snapshots",
                        aws_sdk_rds::error::DisplayErrorContext(e),
                    ));
                }
            };

            let arn = output
                .db_snapshots()
                .first()
                .and_then(|s| s.db_snapshot_arn())
                .map(str::to_string);

            Ok(arn.map(|source_ref| SnapshotInfo {
                id: snapshot_id,
                source_ref,
            }))
        })
    }
}

// =============================================================================
// RDS export tasks
// =============================================================================

/// Submits and polls RDS snapshot export tasks.
#[derive(Debug, Clone)]
pub struct RdsExportService {
    client: aws_sdk_rds::Client,
}

impl RdsExportService {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(aws_sdk_rds::Client::new(sdk_config))
    }

    pub fn from_client(client: aws_sdk_rds::Client) -> Self {
        Self { client }
    }
}

impl ExportService for RdsExportService {
    fn start_export(&self, request: &ExportRequest) -> SubmitFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let result = self
                .client
                .start_export_task()
                .export_task_identifier(&request.task_id)
                .source_arn(&request.source_ref)
                .s3_bucket_name(&request.destination)
                .iam_role_arn(&request.identity)
                .kms_key_id(&request.kms_key)
                .send()
                .await;

            match result {
                Ok(output) => {
                    let task_id = output
                        .export_task_identifier()
                        .unwrap_or(&request.task_id)
                        .to_string();
                    info!(task_id = %task_id, bucket = %request.destination, "Started export task");
                    Ok(task_id)
                }
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_export_task_already_exists_fault()) =>
                {
                    Err(SubmitError::AlreadyExists {
                        task_id: request.task_id,
                    })
                }
                Err(e) => Err(SubmitError::other(
                    request.task_id,
                    aws_sdk_rds::error::DisplayErrorContext(e),
                )),
            }
        })
    }

    fn describe_export(&self, task_id: &str) -> BoxFuture<'_, Option<ExportStatus>> {
        let task_id = task_id.to_string();
        Box::pin(async move {
            let result = self
                .client
                .describe_export_tasks()
                .export_task_identifier(&task_id)
                .send()
                .await;

            let output = match result {
                Ok(output) => output,
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_export_task_not_found_fault()) =>
                {
                    return Ok(None);
                }
                Err(e) => {
                    return Err(ArchiveError::export(
                        task_id,
                        aws_sdk_rds::error::DisplayErrorContext(e),
                    ));
                }
            };

            Ok(output
                .export_tasks()
                .first()
                .and_then(|task| task.status())
                .map(ExportStatus::parse))
        })
    }
}

// =============================================================================
// S3 archive
// =============================================================================

/// Lists snapshots already exported to an S3 bucket.
///
/// Each export writes under a top-level prefix named after its task, so the
/// bucket's common prefixes are the archived snapshot identifiers.
#[derive(Debug, Clone)]
pub struct S3ArchiveInventory {
    client: aws_sdk_s3::Client,
}

impl S3ArchiveInventory {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(aws_sdk_s3::Client::new(sdk_config))
    }

    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

impl ArchiveInventory for S3ArchiveInventory {
    fn list_archived(&self, location: &str) -> BoxFuture<'_, Vec<String>> {
        let bucket = location.to_string();
        Box::pin(async move {
            if bucket.is_empty() {
                return Ok(Vec::new());
            }

            let mut ids = Vec::new();
            let mut continuation: Option<String> = None;

            loop {
                let page = self
                    .client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .delimiter(ARCHIVE_DELIMITER)
                    .set_continuation_token(continuation.take())
                    .send()
                    .await
                    .map_err(|e| {
                        ArchiveError::archive(&bucket, aws_sdk_s3::error::DisplayErrorContext(e))
                    })?;

                ids.extend(
                    page.common_prefixes()
                        .iter()
                        .filter_map(|p| p.prefix())
                        .filter_map(prefix_to_snapshot_id)
                        .map(str::to_string),
                );

                match page.next_continuation_token() {
                    Some(token) => continuation = Some(token.to_string()),
                    None => break,
                }
            }

            debug!(bucket = %bucket, count = ids.len(), "Listed archived snapshots");
            Ok(ids)
        })
    }
}

// =============================================================================
// IAM
// =============================================================================

/// Resolves the export role name to its ARN.
#[derive(Debug, Clone)]
pub struct IamIdentityProvider {
    client: aws_sdk_iam::Client,
}

impl IamIdentityProvider {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(aws_sdk_iam::Client::new(sdk_config))
    }

    pub fn from_client(client: aws_sdk_iam::Client) -> Self {
        Self { client }
    }
}

impl IdentityProvider for IamIdentityProvider {
    fn resolve_role(&self, role_name: &str) -> BoxFuture<'_, String> {
        let role_name = role_name.to_string();
        Box::pin(async move {
            let output = self
                .client
                .get_role()
                .role_name(&role_name)
                .send()
                .await
                .map_err(|e| {
                    ArchiveError::identity(&role_name, aws_sdk_iam::error::DisplayErrorContext(e))
                })?;

            let arn = output
                .role()
                .map(|role| role.arn().to_string())
                .filter(|arn| !arn.is_empty())
                .ok_or_else(|| ArchiveError::identity(&role_name, "role has no ARN"))?;

            info!(role = %role_name, arn = %arn, "Resolved export role");
            Ok(arn)
        })
    }
}
