//! Timestamps embedded in SeaFlow file names.
//!
//! Capture files are named after their creation time as an RFC3339 timestamp
//! with every `:` replaced by `-`, e.g. `2019-12-06T22-58-10+00-00`. The same
//! layout may prefix log files (`<timestamp>.sfl`) and compressed captures
//! (`<timestamp>.gz`). Names are fixed width and zero padded, so sorting them
//! as strings also sorts them chronologically.

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

/// Length of `YYYY-MM-DDThh-mm-ss`.
const DATE_TIME_LEN: usize = 19;
/// Length of `+hh-mm`.
const OFFSET_LEN: usize = 6;

/// Failure to read a timestamp out of a file name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimestampError {
    /// The name does not follow the `YYYY-MM-DDThh-mm-ss[.f]±hh-mm` layout.
    #[error("file name {name:?} does not match the timestamp layout")]
    Layout { name: String },
    /// The layout is right but a field holds an impossible value.
    #[error("file name {name:?} holds an invalid timestamp: {message}")]
    Value { name: String, message: String },
}

/// Parses the timestamp embedded in `name`.
///
/// A trailing `.gz` and then a trailing `.sfl` are removed before parsing, and
/// only the final path segment is considered.
pub fn parse_timestamp(name: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    let stem = name.strip_suffix(".gz").unwrap_or(name);
    let stem = stem.strip_suffix(".sfl").unwrap_or(stem);
    let base = Path::new(stem)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(stem);

    let layout_err = || TimestampError::Layout {
        name: base.to_string(),
    };
    let rfc3339 = to_rfc3339(base).ok_or_else(layout_err)?;

    DateTime::parse_from_rfc3339(&rfc3339).map_err(|e| TimestampError::Value {
        name: base.to_string(),
        message: e.to_string(),
    })
}

/// Rewrites a file name timestamp into RFC3339, checking punctuation and
/// field widths on the way. Digit validation is left to chrono.
fn to_rfc3339(base: &str) -> Option<String> {
    if !base.is_ascii() || base.len() < DATE_TIME_LEN + OFFSET_LEN {
        return None;
    }
    let (date_time, rest) = base.split_at(DATE_TIME_LEN);
    let dt = date_time.as_bytes();
    let punctuation = [(4, b'-'), (7, b'-'), (10, b'T'), (13, b'-'), (16, b'-')];
    if punctuation.iter().any(|&(i, c)| dt[i] != c) {
        return None;
    }
    if !all_digits(&dt[..4])
        || !all_digits(&dt[5..7])
        || !all_digits(&dt[8..10])
        || !all_digits(&dt[11..13])
        || !all_digits(&dt[14..16])
        || !all_digits(&dt[17..19])
    {
        return None;
    }

    let (fraction, offset) = rest.split_at(rest.len() - OFFSET_LEN);
    if !fraction.is_empty() {
        let digits = fraction.strip_prefix('.')?;
        if digits.is_empty() || !all_digits(digits.as_bytes()) {
            return None;
        }
    }

    let off = offset.as_bytes();
    if !matches!(off[0], b'+' | b'-') || off[3] != b'-' {
        return None;
    }
    if !all_digits(&off[1..3]) || !all_digits(&off[4..6]) {
        return None;
    }

    Some(format!(
        "{}T{}:{}:{}{}{}{}:{}",
        &date_time[..10],
        &date_time[11..13],
        &date_time[14..16],
        &date_time[17..19],
        fraction,
        &offset[..1],
        &offset[1..3],
        &offset[4..6],
    ))
}

fn all_digits(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_digit)
}
