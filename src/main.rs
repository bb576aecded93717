// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Snapshot archiver daemon.
//!
//! Exports every automated RDS snapshot missing from the destination bucket,
//! then sleeps and repeats. Per-snapshot results are exposed as Prometheus
//! gauges on `address:port`.

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use snapshot_archiver::aws::{
    IamIdentityProvider, RdsExportService, RdsSnapshotSource, S3ArchiveInventory,
};
use snapshot_archiver::{
    ArchiveEngine, ArchiveError, ArchiverConfig, Backends, IdentityProvider, MetricRegistry,
    PollConfig,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long a running export poll gets to notice shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Archive automated database snapshots to S3.
#[derive(Debug, Parser)]
#[command(name = "snapshot-archiver", version, about)]
struct Cli {
    /// Log level or tracing filter directive. Overrides RUST_LOG; when neither
    /// is set the level is "info".
    #[arg(long, env = "SNAPSHOT_ARCHIVER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Address the metrics endpoint binds to.
    #[arg(long, env = "SNAPSHOT_ARCHIVER_ADDRESS", default_value = "0.0.0.0")]
    address: String,

    /// Port the metrics endpoint listens on.
    #[arg(long, env = "SNAPSHOT_ARCHIVER_PORT", default_value_t = 8582)]
    port: u16,

    /// Bucket the snapshots are exported to.
    #[arg(long, env = "SNAPSHOT_ARCHIVER_DESTINATION_BUCKET")]
    destination_bucket: String,

    /// KMS key used to encrypt the exports.
    #[arg(long, env = "SNAPSHOT_ARCHIVER_KMS_KEY")]
    kms_key: String,

    /// Pause between reconciliation cycles (e.g. "24h", "90m").
    #[arg(long, env = "SNAPSHOT_ARCHIVER_REFRESH_INTERVAL", default_value = "24h")]
    refresh_interval: String,

    /// IAM role the export service assumes.
    #[arg(long, env = "SNAPSHOT_ARCHIVER_ROLE_NAME", default_value = "snapshot-archiver")]
    role_name: String,

    /// Sleep between export task status checks.
    #[arg(long, env = "SNAPSHOT_ARCHIVER_POLL_INTERVAL", default_value = "30s")]
    poll_interval: String,

    /// Give up waiting on an export task after this long. Unbounded if unset.
    #[arg(long, env = "SNAPSHOT_ARCHIVER_MAX_WAIT")]
    max_wait: Option<String>,
}

impl Cli {
    fn into_config(self) -> ArchiverConfig {
        let defaults = ArchiverConfig::default();
        ArchiverConfig {
            log_level: self.log_level.unwrap_or(defaults.log_level),
            address: self.address,
            port: self.port,
            destination_bucket: self.destination_bucket,
            kms_key: self.kms_key,
            refresh_interval: self.refresh_interval,
            role_name: self.role_name,
            poll: PollConfig {
                interval: self.poll_interval,
                max_wait: self.max_wait,
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let directive = log_directive(
        cli.log_level.as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
    );
    let config = cli.into_config();

    if let Err(e) = init_tracing(&directive) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Snapshot archiver failed");
            ExitCode::FAILURE
        }
    }
}

/// Pick the tracing filter: explicit level, then RUST_LOG, then the default.
fn log_directive(explicit: Option<&str>, rust_log: Option<&str>) -> String {
    let non_empty = |directive: &&str| !directive.trim().is_empty();
    explicit
        .filter(non_empty)
        .or(rust_log.filter(non_empty))
        .map(str::to_string)
        .unwrap_or_else(|| ArchiverConfig::default().log_level)
}

fn init_tracing(directive: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(directive)
        .map_err(|e| ArchiveError::Config(format!("invalid log level '{directive}': {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

async fn run(config: ArchiverConfig) -> anyhow::Result<()> {
    config.validate()?;

    let metrics_addr = config.metrics_addr()?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| ArchiveError::Metrics(e.to_string()))?;
    info!(addr = %metrics_addr, "Metrics endpoint listening");
    let registry = Arc::new(MetricRegistry::new());

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let identity = IamIdentityProvider::new(&sdk_config)
        .resolve_role(&config.role_name)
        .await
        .context("resolving export role")?;

    let backends = Backends {
        source: Arc::new(RdsSnapshotSource::new(&sdk_config)),
        archive: Arc::new(S3ArchiveInventory::new(&sdk_config)),
        exports: Arc::new(RdsExportService::new(&sdk_config)),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine = ArchiveEngine::new(&config, identity, backends, registry, shutdown_rx)?;

    let run = engine.run();
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => {
            result.context("reconciliation loop stopped")?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut run).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Engine reported an error while stopping"),
                Err(_) => warn!("Engine did not stop in time, exiting anyway"),
            }
        }
    }

    info!("Snapshot archiver stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
