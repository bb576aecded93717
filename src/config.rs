// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the snapshot archiver.
//!
//! The daemon builds an [`ArchiverConfig`] from command-line flags with
//! environment fallbacks (see `main.rs`), but the type is plain serde so it can
//! also be constructed programmatically or deserialized from YAML/JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use snapshot_archiver::config::ArchiverConfig;
//!
//! let config = ArchiverConfig {
//!     destination_bucket: "db-archive".into(),
//!     kms_key: "alias/db-archive".into(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! ArchiverConfig
//! ├── log_level: String            # tracing filter directive
//! ├── address / port               # Prometheus scrape endpoint
//! ├── destination_bucket: String   # where exports land
//! ├── kms_key: String              # key used to encrypt exports
//! ├── refresh_interval: String     # pause between cycles ("24h")
//! ├── role_name: String            # role the export service assumes
//! └── poll: PollConfig             # export task polling
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! destination_bucket: "db-archive"
//! kms_key: "arn:aws:kms:eu-west-1:123456789012:key/abcd"
//! refresh_interval: "12h"
//! poll:
//!   interval: "30s"
//!   max_wait: "6h"
//! ```

use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object for the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiverConfig {
    /// Log filter directive (e.g. "info", "snapshot_archiver=debug").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Address the metrics endpoint binds on.
    #[serde(default = "default_address")]
    pub address: String,

    /// Port the metrics endpoint binds on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bucket where snapshots are exported, one top-level prefix per snapshot.
    #[serde(default)]
    pub destination_bucket: String,

    /// KMS key used to encrypt the exports.
    #[serde(default)]
    pub kms_key: String,

    /// Pause between reconciliation cycles as a duration string (e.g. "24h").
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,

    /// Name of the role the export service assumes to write to the bucket.
    /// Resolved once at startup.
    #[serde(default = "default_role_name")]
    pub role_name: String,

    /// Export task polling settings.
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8582
}

fn default_refresh_interval() -> String {
    "24h".to_string()
}

fn default_role_name() -> String {
    "snapshot-archiver".to_string()
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            address: default_address(),
            port: default_port(),
            destination_bucket: String::new(),
            kms_key: String::new(),
            refresh_interval: default_refresh_interval(),
            role_name: default_role_name(),
            poll: PollConfig::default(),
        }
    }
}

impl ArchiverConfig {
    /// Create a minimal valid config for testing.
    ///
    /// Polls every 10ms so export tests don't wait on the real 30s interval.
    pub fn for_testing(bucket: &str) -> Self {
        Self {
            destination_bucket: bucket.to_string(),
            kms_key: "alias/test-key".to_string(),
            refresh_interval: "1h".to_string(),
            poll: PollConfig::for_testing(),
            ..Default::default()
        }
    }

    /// Parse the refresh interval.
    pub fn refresh_interval_duration(&self) -> Result<Duration> {
        parse_duration("refresh_interval", &self.refresh_interval)
    }

    /// Socket address for the metrics endpoint.
    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.address.parse().map_err(|e| {
            ArchiveError::Config(format!("invalid bind address '{}': {}", self.address, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Check that every field the daemon needs is present and parseable.
    pub fn validate(&self) -> Result<()> {
        if self.destination_bucket.trim().is_empty() {
            return Err(ArchiveError::Config(
                "destination bucket is required".to_string(),
            ));
        }
        if self.kms_key.trim().is_empty() {
            return Err(ArchiveError::Config("KMS key is required".to_string()));
        }
        if self.role_name.trim().is_empty() {
            return Err(ArchiveError::Config("role name is required".to_string()));
        }
        if self.refresh_interval_duration()?.is_zero() {
            return Err(ArchiveError::Config(
                "refresh_interval must be greater than zero".to_string(),
            ));
        }
        self.metrics_addr()?;
        self.poll.policy()?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PollConfig: export task polling
// ═══════════════════════════════════════════════════════════════════════════════

/// How export tasks are polled until they reach a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Sleep between two status checks (e.g. "30s").
    #[serde(default = "default_poll_interval")]
    pub interval: String,

    /// Give up waiting on a task after this long (e.g. "6h").
    /// `None` waits until the task finishes, however long that takes.
    #[serde(default)]
    pub max_wait: Option<String>,
}

fn default_poll_interval() -> String {
    "30s".to_string()
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_wait: None,
        }
    }
}

impl PollConfig {
    /// Fast polling for tests.
    pub fn for_testing() -> Self {
        Self {
            interval: "10ms".to_string(),
            max_wait: None,
        }
    }

    /// Parse into a [`PollPolicy`].
    pub fn policy(&self) -> Result<PollPolicy> {
        let interval = parse_duration("poll.interval", &self.interval)?;
        if interval.is_zero() {
            return Err(ArchiveError::Config(
                "poll.interval must be greater than zero".to_string(),
            ));
        }
        let max_wait = self
            .max_wait
            .as_deref()
            .map(|raw| parse_duration("poll.max_wait", raw))
            .transpose()?;
        Ok(PollPolicy { interval, max_wait })
    }
}

/// Parsed polling settings used by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between two status checks.
    pub interval: Duration,
    /// Upper bound on the total wait for one task.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_wait: None,
        }
    }
}

impl PollPolicy {
    /// Fast polling for tests.
    pub fn testing() -> Self {
        Self {
            interval: Duration::from_millis(10),
            max_wait: None,
        }
    }
}

fn parse_duration(field: &str, raw: &str) -> Result<Duration> {
    humantime::parse_duration(raw.trim())
        .map_err(|e| ArchiveError::Config(format!("invalid {field} '{raw}': {e}")))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
