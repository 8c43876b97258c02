//! Timestamp parsing for `time_elapsed`

use crate::error::TransformError;
use chrono::{DateTime, NaiveDateTime, Utc};
use querymeter_core::Value;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// How a `time_elapsed` value is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeFormat {
    /// A timestamp value, or an RFC 3339 / ISO 8601 string.
    Native,
    /// Seconds since the epoch.
    UnixTime,
    /// strftime-style pattern.
    Pattern(String),
}

impl TimeFormat {
    pub fn from_param(format: Option<&str>) -> Self {
        match format {
            None | Some("native") => TimeFormat::Native,
            Some("unix_time") => TimeFormat::UnixTime,
            Some(pattern) => TimeFormat::Pattern(pattern.to_string()),
        }
    }

    /// Seconds between `value` and `now`. Naive timestamps are UTC.
    pub fn elapsed(&self, value: &Value, now: DateTime<Utc>) -> Result<f64, TransformError> {
        let then = match self {
            TimeFormat::UnixTime => {
                let epoch = value.as_f64()?;
                return Ok(now.timestamp_millis() as f64 / 1000.0 - epoch);
            }
            TimeFormat::Native => match value {
                Value::Str(text) => parse_iso(text).ok_or_else(|| TransformError::NotATimestamp {
                    value: value.repr(),
                })?,
                other => other.as_utc().ok_or_else(|| TransformError::NotATimestamp {
                    value: other.repr(),
                })?,
            },
            TimeFormat::Pattern(pattern) => {
                let text = value.to_string();
                parse_with(&text, pattern).ok_or_else(|| TransformError::Timestamp {
                    value: value.repr(),
                    format: pattern.clone(),
                })?
            }
        };
        Ok((now - then).num_milliseconds() as f64 / 1000.0)
    }
}

fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(aware) = DateTime::parse_from_rfc3339(text) {
        return Some(aware.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

fn parse_with(text: &str, pattern: &str) -> Option<DateTime<Utc>> {
    if let Ok(aware) = DateTime::parse_from_str(text, pattern) {
        return Some(aware.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, pattern)
        .ok()
        .map(|naive| naive.and_utc())
}
