//! Backfill and polling loop.
//!
//! The monitor owns the processed set and is its only writer. It moves
//! through `ColdStart -> (Backfilling) -> Polling -> Stopped`; the stop
//! signal is honoured only between passes, so a folder that has started
//! processing always finishes.

use crate::lister::StorageLister;
use crate::processed::{PersistenceError, ProcessedStore};
use crate::processor::{folder_name, FolderOutcome, FolderProcessor};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    ColdStart,
    Backfilling,
    Polling,
    Stopped,
}

/// Counts for one backfill or polling pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Folders listed under the base prefix
    pub discovered: usize,
    /// Folders not yet in the processed set
    pub new: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Timing of the loop
#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    /// Wait between polling passes
    pub poll_interval: Duration,
    /// Wait after a failed pass
    pub recovery_interval: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            recovery_interval: Duration::from_secs(5),
        }
    }
}

/// Drives folder discovery and incremental processing
pub struct Monitor {
    lister: StorageLister,
    processor: FolderProcessor,
    store: ProcessedStore,
    base_prefix: String,
    timing: LoopTiming,
    processed: BTreeSet<String>,
    dirty: bool,
    state: MonitorState,
}

impl Monitor {
    /// Create a monitor, loading the persisted processed set.
    ///
    /// A missing state file is a cold start; any other load failure is
    /// returned.
    pub async fn new(
        lister: StorageLister,
        processor: FolderProcessor,
        store: ProcessedStore,
        base_prefix: impl Into<String>,
        timing: LoopTiming,
    ) -> Result<Self, PersistenceError> {
        let processed = store.load().await?;

        Ok(Self {
            lister,
            processor,
            store,
            base_prefix: base_prefix.into(),
            timing,
            processed,
            dirty: false,
            state: MonitorState::ColdStart,
        })
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Folder prefixes already processed
    pub fn processed(&self) -> &BTreeSet<String> {
        &self.processed
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(
            base_prefix = %self.base_prefix,
            poll_interval_secs = self.timing.poll_interval.as_secs(),
            "Monitor starting"
        );

        loop {
            self.state = match self.state {
                MonitorState::ColdStart => {
                    if self.processed.is_empty() {
                        info!("No processed folders recorded, starting backfill");
                        MonitorState::Backfilling
                    } else {
                        info!(
                            count = self.processed.len(),
                            "Previously processed folders loaded"
                        );
                        MonitorState::Polling
                    }
                }
                MonitorState::Backfilling => match self.backfill().await {
                    Ok(summary) => {
                        info!(
                            processed = self.processed.len(),
                            succeeded = summary.succeeded,
                            skipped = summary.skipped,
                            failed = summary.failed,
                            "Backfill complete"
                        );
                        self.next_or_stop(&shutdown, MonitorState::Polling)
                    }
                    Err(e) => {
                        error!(error = %format!("{e:#}"), "Backfill failed, retrying");
                        metrics::counter!("monitor.passes.failed").increment(1);
                        let wait = self.timing.recovery_interval;
                        self.wait_then(&shutdown, wait, MonitorState::Backfilling)
                            .await
                    }
                },
                MonitorState::Polling => {
                    let wait = match self.poll_once().await {
                        Ok(_) => {
                            info!(
                                next_check_secs = self.timing.poll_interval.as_secs(),
                                "Waiting for next check"
                            );
                            self.timing.poll_interval
                        }
                        Err(e) => {
                            error!(
                                error = %format!("{e:#}"),
                                retry_secs = self.timing.recovery_interval.as_secs(),
                                "Polling pass failed"
                            );
                            metrics::counter!("monitor.passes.failed").increment(1);
                            self.timing.recovery_interval
                        }
                    };
                    self.wait_then(&shutdown, wait, MonitorState::Polling).await
                }
                MonitorState::Stopped => break,
            };
        }

        info!("Monitor stopped");
    }

    /// Process every discovered folder, then persist once
    #[instrument(skip(self))]
    pub async fn backfill(&mut self) -> Result<PassSummary> {
        let folders = self
            .lister
            .list_folders(&self.base_prefix)
            .await
            .context("Failed to list folders for backfill")?;

        info!(count = folders.len(), "Folders discovered for backfill");
        let mut summary = PassSummary {
            discovered: folders.len(),
            ..Default::default()
        };

        let pending: Vec<String> = folders
            .into_iter()
            .filter(|f| !self.processed.contains(f))
            .collect();
        summary.new = pending.len();

        self.process_folders(&pending, &mut summary).await;
        self.persist_if_dirty().await?;

        Ok(summary)
    }

    /// Process folders not yet in the processed set
    #[instrument(skip(self))]
    pub async fn poll_once(&mut self) -> Result<PassSummary> {
        info!("Checking for new folders");

        let current: BTreeSet<String> = self
            .lister
            .list_folders(&self.base_prefix)
            .await
            .context("Failed to list folders")?
            .into_iter()
            .collect();

        let new_folders: Vec<String> = current.difference(&self.processed).cloned().collect();
        let mut summary = PassSummary {
            discovered: current.len(),
            new: new_folders.len(),
            ..Default::default()
        };

        if new_folders.is_empty() {
            info!("No new folders");
        } else {
            info!(count = new_folders.len(), "New folders found");
            self.process_folders(&new_folders, &mut summary).await;
            // attempted folders persist the pass even if none succeeded
            self.dirty = true;
        }

        self.persist_if_dirty().await?;

        info!(
            discovered = summary.discovered,
            new = summary.new,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Polling pass complete"
        );
        Ok(summary)
    }

    async fn process_folders(&mut self, folders: &[String], summary: &mut PassSummary) {
        let total = folders.len();
        for (i, folder) in folders.iter().enumerate() {
            info!(
                position = i + 1,
                total = total,
                folder = %folder_name(folder),
                "Processing folder"
            );

            match self.processor.process(folder).await {
                Ok(FolderOutcome::Success { .. }) => {
                    summary.succeeded += 1;
                    self.processed.insert(folder.clone());
                    self.dirty = true;
                }
                Ok(FolderOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    metrics::counter!("monitor.folders.failed").increment(1);
                    warn!(folder = %folder_name(folder), error = %e, "Folder processing failed");
                }
            }
        }
    }

    async fn persist_if_dirty(&mut self) -> Result<(), PersistenceError> {
        if !self.dirty {
            return Ok(());
        }

        self.store.save(&self.processed).await?;
        self.dirty = false;
        metrics::gauge!("monitor.folders.tracked").set(self.processed.len() as f64);
        info!(count = self.processed.len(), "Processed folders saved");
        Ok(())
    }

    fn next_or_stop(&self, shutdown: &CancellationToken, next: MonitorState) -> MonitorState {
        if shutdown.is_cancelled() {
            MonitorState::Stopped
        } else {
            next
        }
    }

    /// Sleep for `wait`, ending early into `Stopped` if shutdown is requested
    async fn wait_then(
        &self,
        shutdown: &CancellationToken,
        wait: Duration,
        next: MonitorState,
    ) -> MonitorState {
        tokio::select! {
            _ = shutdown.cancelled() => MonitorState::Stopped,
            _ = tokio::time::sleep(wait) => next,
        }
    }
}
