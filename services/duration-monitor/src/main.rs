use anyhow::{Context, Result};
use duration_monitor::{
    Config, FolderProcessor, LoopTiming, Monitor, ObjectStore, ProcessedStore, ReportSink,
    S3ObjectStore, StorageLister,
};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level, &config.service.log_format);

    config.validate().context("Invalid configuration")?;

    info!(
        service = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        bucket = %config.s3.bucket,
        base_prefix = %config.s3.base_prefix,
        "Starting duration monitor"
    );

    if config.service.metrics_port != 0 {
        init_metrics(config.service.metrics_port)?;
    }

    // Initialize components
    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(&config.s3).await);
    let lister = StorageLister::new(store.clone(), config.s3.manifest_dir.clone())
        .with_max_keys(config.s3.max_keys);

    let sink = ReportSink::new(&config.output.dir);
    sink.ensure_dir()
        .await
        .context("Failed to create output directory")?;

    let processor = FolderProcessor::new(store, lister.clone(), sink)
        .with_fetch_concurrency(config.monitor.fetch_concurrency)
        .with_progress_every(config.monitor.progress_every);

    let timing = LoopTiming {
        poll_interval: config.monitor.poll_interval(),
        recovery_interval: config.monitor.recovery_interval(),
    };

    let mut monitor = Monitor::new(
        lister,
        processor,
        ProcessedStore::new(&config.output.processed_state_path),
        config.s3.base_prefix.clone(),
        timing,
    )
    .await
    .context("Failed to load processed folders")?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Stopping after the current pass");
            shutdown.cancel();
        }
    });

    monitor.run(shutdown).await;

    info!("Duration monitor stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, log_format: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format == "pretty" {
        registry.with(fmt::layer().pretty()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
