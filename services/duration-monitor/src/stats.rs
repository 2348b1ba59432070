//! Duration statistics and the fixed histogram buckets.

use serde::Serialize;

/// One of the five fixed half-open duration ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DurationBucket {
    /// `[0, 1800)`
    UnderThirtyMinutes,
    /// `[1800, 2400)`
    ThirtyToThirtyNine,
    /// `[2400, 3000)`
    FortyToFortyNine,
    /// `[3000, 3600)`
    FiftyToFiftyNine,
    /// `[3600, ∞)`
    HourOrMore,
}

impl DurationBucket {
    /// All buckets in ascending order
    pub const ALL: [DurationBucket; 5] = [
        DurationBucket::UnderThirtyMinutes,
        DurationBucket::ThirtyToThirtyNine,
        DurationBucket::FortyToFortyNine,
        DurationBucket::FiftyToFiftyNine,
        DurationBucket::HourOrMore,
    ];

    /// Inclusive lower bound in seconds
    pub fn lower(self) -> u64 {
        match self {
            DurationBucket::UnderThirtyMinutes => 0,
            DurationBucket::ThirtyToThirtyNine => 1800,
            DurationBucket::FortyToFortyNine => 2400,
            DurationBucket::FiftyToFiftyNine => 3000,
            DurationBucket::HourOrMore => 3600,
        }
    }

    /// Label used in report column headers
    pub fn label(self) -> &'static str {
        match self {
            DurationBucket::UnderThirtyMinutes => "30분 미만",
            DurationBucket::ThirtyToThirtyNine => "30-39분",
            DurationBucket::FortyToFortyNine => "40-49분",
            DurationBucket::FiftyToFiftyNine => "50-59분",
            DurationBucket::HourOrMore => "1시간 이상",
        }
    }

    /// The bucket a duration falls into
    pub fn for_seconds(seconds: u64) -> Self {
        Self::ALL
            .into_iter()
            .rev()
            .find(|b| seconds >= b.lower())
            .unwrap_or(DurationBucket::UnderThirtyMinutes)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Count and share of samples in one bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketCount {
    pub bucket: DurationBucket,
    pub count: usize,
    /// `count / total * 100`, rounded to one decimal
    pub percentage: f64,
}

/// Aggregate statistics over a folder's valid durations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationStats {
    pub count: usize,
    pub total_seconds: u64,
    pub average_seconds: f64,
    pub min_seconds: u64,
    pub max_seconds: u64,
    pub median_seconds: f64,
    pub buckets: Vec<BucketCount>,
}

impl DurationStats {
    /// Compute statistics for a sequence of positive durations.
    ///
    /// Returns `None` for an empty sequence; callers treat that as a skipped
    /// folder rather than an error.
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let count = samples.len();
        let total_seconds = samples.iter().fold(0u64, |acc, &s| acc.saturating_add(s));
        let min_seconds = *samples.iter().min()?;
        let max_seconds = *samples.iter().max()?;

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let mid = count / 2;
        let median_seconds = if count % 2 == 1 {
            sorted[mid] as f64
        } else {
            (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
        };

        let mut counts = [0usize; 5];
        for &seconds in samples {
            counts[DurationBucket::for_seconds(seconds).index()] += 1;
        }

        let buckets = DurationBucket::ALL
            .into_iter()
            .zip(counts)
            .map(|(bucket, n)| BucketCount {
                bucket,
                count: n,
                percentage: round_to(n as f64 / count as f64 * 100.0, 1),
            })
            .collect();

        Some(Self {
            count,
            total_seconds,
            average_seconds: total_seconds as f64 / count as f64,
            min_seconds,
            max_seconds,
            median_seconds,
            buckets,
        })
    }

    /// Count for one bucket
    pub fn bucket(&self, bucket: DurationBucket) -> &BucketCount {
        &self.buckets[bucket.index()]
    }
}

/// Format seconds as `H:MM:SS`, hours unpadded
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, secs)
}

/// Format fractional seconds as `H:MM:SS`, truncating to whole seconds
pub fn format_hms_f64(seconds: f64) -> String {
    format_hms(seconds.max(0.0) as u64)
}

/// Round to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
