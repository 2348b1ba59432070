//! Duration Monitor
//!
//! Incremental video duration statistics for content folders uploaded to
//! S3-compatible object storage. The service discovers upload folders under a
//! base prefix, reads the JSON manifest of every video in a new folder,
//! aggregates the `duration` fields and writes CSV reports for the reporting
//! dashboard. Folders that produced a report are recorded so later polls only
//! look at new uploads.
//!
//! ## Features
//!
//! - **Paginated Discovery**: folder and manifest listings follow continuation
//!   tokens transparently
//! - **Tolerant Parsing**: unreadable manifests and malformed durations are
//!   logged and excluded without failing the folder
//! - **Duration Statistics**: count, total, mean, min, max, median and a
//!   five-bucket length histogram
//! - **Incremental Processing**: a persisted processed-folder set survives
//!   restarts; an empty set triggers a one-time backfill
//!
//! ## Architecture
//!
//! ```text
//! Object Storage                                         Local Disk
//! ┌──────────────┐                                      ┌──────────────────┐
//! │ raw/uploads/ │                                      │ stats_output/    │
//! │   {folder}/  │                                      │   video_stats_*  │
//! │   manifests/ │                                      │   video_dur..._* │
//! └──────────────┘                                      └──────────────────┘
//!        │                                                       ▲
//!        ▼                                                       │
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐     │
//! │ Storage      │────▶│ Monitor      │────▶│ Folder       │─────┘
//! │ Lister       │     │ Loop         │     │ Processor    │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                             │                    │
//!                             ▼                    ▼
//!                      ┌──────────────┐     ┌──────────────┐
//!                      │ Processed    │     │ Manifest +   │
//!                      │ Store        │     │ Statistics   │
//!                      └──────────────┘     └──────────────┘
//! ```

pub mod config;
pub mod lister;
pub mod manifest;
pub mod monitor;
pub mod output;
pub mod processed;
pub mod processor;
pub mod stats;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, ConfigValidationError};
pub use lister::StorageLister;
pub use manifest::{parse_duration, read_duration, ParseError};
pub use monitor::{LoopTiming, Monitor, MonitorState, PassSummary};
pub use output::{FolderReport, OutputError, ReportPaths, ReportSink};
pub use processed::{PersistenceError, ProcessedStore};
pub use processor::{FolderOutcome, FolderProcessor, ProcessorError, SkipReason};
pub use stats::{format_hms, BucketCount, DurationBucket, DurationStats};
pub use storage::{ListPage, ListRequest, ObjectStore, S3ObjectStore, StorageError};
