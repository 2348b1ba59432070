use crate::lister::StorageLister;
use crate::manifest::{parse_duration, read_duration};
use crate::output::{FolderReport, OutputError, ReportPaths, ReportSink};
use crate::stats::{format_hms, format_hms_f64, DurationStats};
use crate::storage::{ObjectStore, StorageError};
use chrono::Local;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors that fail a whole folder
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Failed to list manifests for folder {folder}: {source}")]
    Listing {
        folder: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to write reports for folder {folder}: {source}")]
    Output {
        folder: String,
        #[source]
        source: OutputError,
    },
}

/// Why a folder produced no report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No `.json` manifests under the folder
    NoManifests,
    /// Manifests exist but none carried a valid duration
    NoValidDurations,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoManifests => write!(f, "no manifest files"),
            SkipReason::NoValidDurations => write!(f, "no valid durations"),
        }
    }
}

/// Terminal state of one folder run that did not fail
#[derive(Debug, Clone)]
pub enum FolderOutcome {
    /// Reports were written; the folder may be marked processed
    Success {
        report: FolderReport,
        paths: ReportPaths,
    },
    /// Nothing to report; the folder stays unprocessed
    Skipped { folder: String, reason: SkipReason },
}

/// Computes and writes duration statistics for one folder at a time
pub struct FolderProcessor {
    store: Arc<dyn ObjectStore>,
    lister: StorageLister,
    sink: ReportSink,
    fetch_concurrency: usize,
    progress_every: usize,
}

impl FolderProcessor {
    pub fn new(store: Arc<dyn ObjectStore>, lister: StorageLister, sink: ReportSink) -> Self {
        Self {
            store,
            lister,
            sink,
            fetch_concurrency: 1,
            progress_every: 100,
        }
    }

    /// Number of manifests fetched concurrently (at least one)
    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    /// Log progress every `every` manifests (at least one)
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// Process one folder prefix.
    ///
    /// Per-item failures are logged and dropped. Only a failed manifest
    /// listing or a failed report write fails the folder.
    #[instrument(skip(self), fields(folder = %folder_name(folder_prefix)))]
    pub async fn process(&self, folder_prefix: &str) -> Result<FolderOutcome, ProcessorError> {
        let folder = folder_name(folder_prefix);
        info!(prefix = %folder_prefix, "Processing folder");

        let keys = self
            .lister
            .list_manifest_keys(folder_prefix)
            .await
            .map_err(|source| ProcessorError::Listing {
                folder: folder.clone(),
                source,
            })?;

        info!(manifests = keys.len(), "Manifest files found");
        if keys.is_empty() {
            return Ok(self.skip(folder, SkipReason::NoManifests));
        }

        let durations = self.collect_durations(&keys).await;
        let Some(stats) = DurationStats::from_samples(&durations) else {
            return Ok(self.skip(folder, SkipReason::NoValidDurations));
        };

        let report = FolderReport {
            folder: folder.clone(),
            processed_at: Local::now(),
            stats,
            durations,
        };

        let paths = self
            .sink
            .write(&report)
            .await
            .map_err(|source| ProcessorError::Output {
                folder: folder.clone(),
                source,
            })?;

        log_report(&report);
        metrics::counter!("monitor.folders.processed").increment(1);

        Ok(FolderOutcome::Success { report, paths })
    }

    /// Fetch and parse every manifest, keeping positive durations in key order
    async fn collect_durations(&self, keys: &[String]) -> Vec<u64> {
        let total = keys.len();
        let mut durations = Vec::with_capacity(total);
        let mut invalid = 0usize;

        let mut reads = stream::iter(keys.iter().cloned())
            .map(|key| async move { self.read_seconds(&key).await })
            .buffered(self.fetch_concurrency);

        let mut done = 0usize;
        while let Some(seconds) = reads.next().await {
            done += 1;
            match seconds {
                Some(s) if s > 0 => durations.push(s),
                _ => invalid += 1,
            }

            if done % self.progress_every == 0 || done == total {
                debug!(done = done, total = total, "Manifest progress");
            }
        }

        if invalid > 0 {
            metrics::counter!("monitor.items.invalid").increment(invalid as u64);
        }
        info!(
            valid = durations.len(),
            excluded = invalid,
            "Manifests read"
        );

        durations
    }

    async fn read_seconds(&self, key: &str) -> Option<u64> {
        let text = read_duration(self.store.as_ref(), key).await?;
        let seconds = parse_duration(&text);
        if seconds == 0 {
            debug!(key = %key, duration = %text, "Excluding zero or invalid duration");
        }
        Some(seconds)
    }

    fn skip(&self, folder: String, reason: SkipReason) -> FolderOutcome {
        warn!(folder = %folder, reason = %reason, "Skipping folder");
        metrics::counter!("monitor.folders.skipped").increment(1);
        FolderOutcome::Skipped { folder, reason }
    }
}

fn log_report(report: &FolderReport) {
    let stats = &report.stats;
    info!(
        folder = %report.folder,
        count = stats.count,
        total = %format_hms(stats.total_seconds),
        average = %format_hms_f64(stats.average_seconds),
        min = %format_hms(stats.min_seconds),
        max = %format_hms(stats.max_seconds),
        median = %format_hms_f64(stats.median_seconds),
        "Folder statistics"
    );

    for bucket in &stats.buckets {
        info!(
            folder = %report.folder,
            bucket = bucket.bucket.label(),
            count = bucket.count,
            percentage = bucket.percentage,
            "Duration distribution"
        );
    }
}

/// Last non-empty path segment of a folder prefix
pub fn folder_name(prefix: &str) -> String {
    prefix
        .split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .unwrap_or(prefix)
        .to_string()
}
