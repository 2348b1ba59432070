//! Manifest reading and `HH:MM:SS` duration parsing.
//!
//! Both halves are tolerant: a manifest that cannot be fetched or decoded,
//! or a duration that does not parse, excludes that one item and never fails
//! the enclosing folder.

use crate::storage::ObjectStore;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while decoding a manifest or its duration field
#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Manifest is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("Manifest is not a valid JSON object: {0}")]
    Json(String),

    #[error("Invalid duration format: {0:?}")]
    Duration(String),
}

/// The subset of a manifest this service reads; other fields are ignored
#[derive(Debug, Deserialize)]
struct ManifestRecord {
    #[serde(default)]
    duration: Option<String>,
}

/// Fetch a manifest and extract its `duration` field.
///
/// Returns `None` when the fetch fails, the document does not decode, or the
/// field is absent or empty. Each case is logged with the manifest key.
pub async fn read_duration(store: &dyn ObjectStore, key: &str) -> Option<String> {
    let bytes = match store.get_object(key).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to fetch manifest, skipping item");
            return None;
        }
    };

    match decode_duration(&bytes) {
        Ok(Some(duration)) => Some(duration),
        Ok(None) => {
            debug!(key = %key, "Manifest has no duration field, skipping item");
            None
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to decode manifest, skipping item");
            None
        }
    }
}

/// Decode manifest bytes and pull out a non-empty `duration` string
pub fn decode_duration(bytes: &[u8]) -> Result<Option<String>, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ParseError::Encoding(e.to_string()))?;
    let record: ManifestRecord =
        serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))?;

    Ok(record.duration.filter(|d| !d.is_empty()))
}

/// Parse `H:MM:SS` into seconds, returning `0` for malformed input.
///
/// A `0` result means "invalid" and must be excluded from statistics; a
/// warning is logged for it.
pub fn parse_duration(text: &str) -> u64 {
    match try_parse_duration(text) {
        Ok(seconds) => seconds,
        Err(e) => {
            warn!(error = %e, "Duration excluded from statistics");
            0
        }
    }
}

/// Largest hour count accepted by [`try_parse_duration`].
///
/// Keeps a folder total of up to `u32::MAX` maximal samples within `u64`.
pub const MAX_HOURS: u64 = 1_000_000;

/// Strict parser behind [`parse_duration`].
///
/// Hours are one or more digits up to [`MAX_HOURS`]; minutes and seconds are
/// one or two digits in `0..=59`.
pub fn try_parse_duration(text: &str) -> Result<u64, ParseError> {
    let invalid = || ParseError::Duration(text.to_string());

    let mut parts = text.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let hours = parse_field(h, usize::MAX)
        .filter(|v| *v <= MAX_HOURS)
        .ok_or_else(invalid)?;
    let minutes = parse_field(m, 2).filter(|v| *v < 60).ok_or_else(invalid)?;
    let seconds = parse_field(s, 2).filter(|v| *v < 60).ok_or_else(invalid)?;

    Ok(hours * 3600 + minutes * 60 + seconds)
}

fn parse_field(field: &str, max_digits: usize) -> Option<u64> {
    if field.is_empty() || field.len() > max_digits || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
