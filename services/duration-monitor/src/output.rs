//! CSV reports consumed by the reporting dashboard.
//!
//! Each processed folder produces a one-row summary file and a raw
//! single-column duration file. The summary starts with a UTF-8 byte-order
//! mark so spreadsheet tools read the Korean headers correctly.

use crate::stats::{format_hms, format_hms_f64, round_to, DurationBucket, DurationStats};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors writing report files
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to render CSV for {folder}: {source}")]
    Render {
        folder: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Statistics for one folder at one processing time
#[derive(Debug, Clone)]
pub struct FolderReport {
    /// Folder name (last segment of the folder prefix)
    pub folder: String,
    /// When the folder was processed
    pub processed_at: DateTime<Local>,
    /// Aggregate statistics
    pub stats: DurationStats,
    /// Valid durations in manifest-key order
    pub durations: Vec<u64>,
}

/// Paths of the files written for one report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub summary: PathBuf,
    pub raw: PathBuf,
}

/// Writes per-folder CSV reports into one directory
#[derive(Debug, Clone)]
pub struct ReportSink {
    dir: PathBuf,
}

impl ReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the output directory if it does not exist
    pub async fn ensure_dir(&self) -> Result<(), OutputError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| OutputError::Write {
                path: self.dir.clone(),
                source,
            })
    }

    /// File locations for a folder name
    pub fn paths_for(&self, folder: &str) -> ReportPaths {
        let name = sanitize_file_component(folder);
        ReportPaths {
            summary: self.dir.join(format!("video_stats_{}.csv", name)),
            raw: self.dir.join(format!("video_durations_raw_{}.csv", name)),
        }
    }

    /// Write the summary and raw files, replacing earlier ones for the folder
    #[instrument(skip(self, report), fields(folder = %report.folder))]
    pub async fn write(&self, report: &FolderReport) -> Result<ReportPaths, OutputError> {
        self.ensure_dir().await?;
        let paths = self.paths_for(&report.folder);

        let mut summary = UTF8_BOM.to_vec();
        summary.extend(render_summary(report)?);
        write_file(&paths.summary, &summary).await?;

        let raw = render_raw(report)?;
        write_file(&paths.raw, &raw).await?;

        debug!(
            summary = %paths.summary.display(),
            raw = %paths.raw.display(),
            "Reports written"
        );
        Ok(paths)
    }
}

async fn write_file(path: &Path, body: &[u8]) -> Result<(), OutputError> {
    tokio::fs::write(path, body)
        .await
        .map_err(|source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Column headers of the summary file
pub fn summary_header() -> Vec<String> {
    let mut header: Vec<String> = [
        "폴더명",
        "처리시간",
        "총_영상_개수",
        "총_영상_시간_초",
        "총_영상_시간_HMS",
        "평균_길이_초",
        "평균_길이_HMS",
        "최소_길이_초",
        "최소_길이_HMS",
        "최대_길이_초",
        "최대_길이_HMS",
        "중간값_초",
        "중간값_HMS",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    for bucket in DurationBucket::ALL {
        header.push(format!("{}_개수", bucket.label()));
        header.push(format!("{}_비율", bucket.label()));
    }
    header
}

/// Values of the summary row, aligned with [`summary_header`]
pub fn summary_record(report: &FolderReport) -> Vec<String> {
    let stats = &report.stats;
    let mut record = vec![
        report.folder.clone(),
        report.processed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        stats.count.to_string(),
        stats.total_seconds.to_string(),
        format_hms(stats.total_seconds),
        format_decimal(round_to(stats.average_seconds, 2)),
        format_hms_f64(stats.average_seconds),
        stats.min_seconds.to_string(),
        format_hms(stats.min_seconds),
        stats.max_seconds.to_string(),
        format_hms(stats.max_seconds),
        format_median(stats),
        format_hms_f64(stats.median_seconds),
    ];

    for bucket in &stats.buckets {
        record.push(bucket.count.to_string());
        record.push(format_decimal(bucket.percentage));
    }
    record
}

fn render_summary(report: &FolderReport) -> Result<Vec<u8>, OutputError> {
    let render_err = |source| OutputError::Render {
        folder: report.folder.clone(),
        source,
    };

    let mut writer = csv_writer();
    writer.write_record(summary_header()).map_err(render_err)?;
    writer
        .write_record(summary_record(report))
        .map_err(render_err)?;
    writer
        .into_inner()
        .map_err(|e| render_err(csv::Error::from(e.into_error())))
}

fn render_raw(report: &FolderReport) -> Result<Vec<u8>, OutputError> {
    let render_err = |source| OutputError::Render {
        folder: report.folder.clone(),
        source,
    };

    let mut writer = csv_writer();
    writer.write_record(["duration_sec"]).map_err(render_err)?;
    for seconds in &report.durations {
        writer
            .write_record([seconds.to_string()])
            .map_err(render_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| render_err(csv::Error::from(e.into_error())))
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

/// Decimal with at least one fractional digit (`2105.0`, `1355.46`)
fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Odd counts take a sample as the median and print it as an integer; even
/// counts average the middle pair and print a decimal.
fn format_median(stats: &DurationStats) -> String {
    if stats.count % 2 == 1 {
        (stats.median_seconds as u64).to_string()
    } else {
        format_decimal(stats.median_seconds)
    }
}

/// Replace path separators and control characters so a folder name is a
/// single file name component. Non-ASCII text is kept as is.
fn sanitize_file_component(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn create_test_report(folder: &str, durations: Vec<u64>) -> FolderReport {
        FolderReport {
            folder: folder.to_string(),
            processed_at: Local.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap(),
            stats: DurationStats::from_samples(&durations).unwrap(),
            durations,
        }
    }

    #[test]
    fn test_header_and_record_align() {
        let report = create_test_report("batch1", vec![1500, 2710]);
        let header = summary_header();
        let record = summary_record(&report);

        assert_eq!(header.len(), 23);
        assert_eq!(header.len(), record.len());
        assert_eq!(header[13], "30분 미만_개수");
        assert_eq!(header[22], "1시간 이상_비율");
    }

    #[test]
    fn test_summary_record_values() {
        let report = create_test_report("batch1", vec![1500, 2710]);
        let record = summary_record(&report);

        assert_eq!(
            record,
            vec![
                "batch1",
                "2024-01-15 10:30:45",
                "2",
                "4210",
                "1:10:10",
                "2105.0",
                "0:35:05",
                "1500",
                "0:25:00",
                "2710",
                "0:45:10",
                "2105.0",
                "0:35:05",
                "1",
                "50.0",
                "0",
                "0.0",
                "1",
                "50.0",
                "0",
                "0.0",
                "0",
                "0.0",
            ]
        );
    }

    #[test]
    fn test_median_column_follows_sample_parity() {
        let odd = summary_record(&create_test_report("odd", vec![1500, 2710, 1200]));
        assert_eq!(odd[11], "1500");
        assert_eq!(odd[12], "0:25:00");

        let even = summary_record(&create_test_report("even", vec![1500, 1700]));
        assert_eq!(even[11], "1600.0");

        let half = summary_record(&create_test_report("half", vec![1, 2]));
        assert_eq!(half[11], "1.5");
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(2105.0), "2105.0");
        assert_eq!(format_decimal(1355.46), "1355.46");
        assert_eq!(format_decimal(66.7), "66.7");
        assert_eq!(format_decimal(0.0), "0.0");
    }

    #[test]
    fn test_sanitize_file_component() {
        assert_eq!(sanitize_file_component("batch1"), "batch1");
        assert_eq!(sanitize_file_component("2024_업로드"), "2024_업로드");
        assert_eq!(sanitize_file_component("a/b"), "a_b");
        assert_eq!(sanitize_file_component("a\\b\n"), "a_b_");
        assert_eq!(sanitize_file_component(".."), "_");
    }

    #[tokio::test]
    async fn test_write_reports() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ReportSink::new(dir.path().join("stats_output"));
        let report = create_test_report("배치_1", vec![1500, 2710]);

        let paths = sink.write(&report).await.unwrap();
        assert_eq!(paths, sink.paths_for("배치_1"));

        let summary = std::fs::read(&paths.summary).unwrap();
        assert!(summary.starts_with(UTF8_BOM));
        let text = String::from_utf8(summary[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("폴더명,처리시간,총_영상_개수"));
        assert!(lines.next().unwrap().starts_with("배치_1,2024-01-15 10:30:45,2,4210"));
        assert!(lines.next().is_none());

        let raw = std::fs::read_to_string(&paths.raw).unwrap();
        assert_eq!(raw, "duration_sec\n1500\n2710\n");
    }

    #[tokio::test]
    async fn test_rewrite_replaces_previous_report() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ReportSink::new(dir.path());

        sink.write(&create_test_report("b", vec![10, 20, 30])).await.unwrap();
        let paths = sink.write(&create_test_report("b", vec![3600])).await.unwrap();

        let raw = std::fs::read_to_string(&paths.raw).unwrap();
        assert_eq!(raw, "duration_sec\n3600\n");
    }
}
