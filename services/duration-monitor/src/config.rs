//! Configuration for the duration monitor.
//!
//! Values are layered: built-in defaults, then optional configuration files,
//! then `MONITOR__`-prefixed environment variables. Storage credentials are
//! not part of this configuration; they come from the AWS provider chain.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the duration monitor
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Object storage configuration
    pub s3: S3Config,
    /// Polling loop configuration
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Output locations
    #[serde(default)]
    pub output: OutputConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Metrics port (0 disables the Prometheus exporter)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// S3-compatible object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket holding the upload folders
    pub bucket: String,
    /// Region name
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (Naver Cloud, MinIO, LocalStack, etc.)
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: Option<String>,
    /// Force path-style access
    #[serde(default = "default_true")]
    pub force_path_style: bool,
    /// Prefix under which upload folders are discovered
    #[serde(default = "default_base_prefix")]
    pub base_prefix: String,
    /// Sub-path of a folder that holds the JSON manifests
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: String,
    /// Page size for listing requests (backend default when unset)
    #[serde(default)]
    pub max_keys: Option<i32>,
}

/// Polling loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between polling passes
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds to wait after a failed pass before retrying
    #[serde(default = "default_recovery_interval_secs")]
    pub recovery_interval_secs: u64,
    /// Manifests fetched concurrently within one folder
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Log progress every N manifests
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the per-folder CSV files
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// File holding the processed-folder list
    #[serde(default = "default_processed_state_path")]
    pub processed_state_path: PathBuf,
}

// Default value functions
fn default_service_name() -> String {
    "duration-monitor".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_region() -> String {
    "kr-standard".to_string()
}

fn default_endpoint_url() -> Option<String> {
    Some("https://kr.object.ncloudstorage.com".to_string())
}

fn default_true() -> bool {
    true
}

fn default_base_prefix() -> String {
    "raw/uploads/".to_string()
}

fn default_manifest_dir() -> String {
    "manifests/".to_string()
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_recovery_interval_secs() -> u64 {
    5
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_progress_every() -> usize {
    100
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("stats_output")
}

fn default_processed_state_path() -> PathBuf {
    PathBuf::from("processed_folders.json")
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/duration-monitor").required(false))
            .add_source(config::File::with_name("/etc/duration-monitor/monitor").required(false))
            // MONITOR__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("MONITOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigValidationError::MissingField("s3.bucket".to_string()));
        }

        if self.s3.max_keys.is_some_and(|n| n <= 0) {
            return Err(ConfigValidationError::InvalidValue {
                field: "s3.max_keys".to_string(),
                message: "Page size must be greater than 0".to_string(),
            });
        }

        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "monitor.poll_interval_secs".to_string(),
                message: "Interval must be greater than 0".to_string(),
            });
        }

        if self.monitor.recovery_interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "monitor.recovery_interval_secs".to_string(),
                message: "Interval must be greater than 0".to_string(),
            });
        }

        if self.monitor.fetch_concurrency == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "monitor.fetch_concurrency".to_string(),
                message: "Concurrency must be at least 1".to_string(),
            });
        }

        if self.output.dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingField("output.dir".to_string()));
        }

        Ok(())
    }
}

impl MonitorConfig {
    /// Get polling interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Get recovery interval as Duration
    pub fn recovery_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_interval_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            recovery_interval_secs: default_recovery_interval_secs(),
            fetch_concurrency: default_fetch_concurrency(),
            progress_every: default_progress_every(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            processed_state_path: default_processed_state_path(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
