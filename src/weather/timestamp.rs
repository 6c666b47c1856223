use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use crate::upload::StationUpload;
use thiserror::Error;
use tracing::warn;

pub const TIMESTAMP_FIELD: &str = "dateutc";

/// The upload protocol allows stations without a clock to send this instead of a date.
const NOW_LITERAL: &str = "now";

const PADDED_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error, PartialEq)]
pub enum TimestampError {
    #[error("timestamp {0:?} is not of the form YYYY-M-D H:M:S")]
    Malformed(String),
    #[error("timestamp {raw:?} is not a valid date: {source}")]
    Invalid {
        raw: String,
        source: chrono::ParseError,
    },
}

/// Parses a station timestamp, tolerating missing zero padding in any component.
///
/// Station firmware emits `2025-12-1 1:5:7` as readily as `2025-12-01 01:05:07`, so every
/// component is padded to two digits before a single parse against the padded layout.
/// The station clock is assumed to run on UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let normalized = normalize(raw).ok_or_else(|| TimestampError::Malformed(raw.to_owned()))?;

    NaiveDateTime::parse_from_str(&normalized, PADDED_LAYOUT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|source| TimestampError::Invalid {
            raw: raw.to_owned(),
            source,
        })
}

fn normalize(raw: &str) -> Option<String> {
    let (date, time) = raw.trim().split_once(' ')?;

    let date = pad_components(date, '-')?;
    let time = pad_components(time.trim_start(), ':')?;

    Some(format!("{date} {time}"))
}

fn pad_components(part: &str, separator: char) -> Option<String> {
    let components: Vec<&str> = part.split(separator).collect();
    let valid = components.len() == 3
        && components
            .iter()
            .all(|c| !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()));

    if !valid {
        return None;
    }

    let padded: Vec<String> = components.iter().map(|c| format!("{c:0>2}")).collect();
    Some(padded.join(&separator.to_string()))
}

/// Renders an instant in the display timezone as an offset-qualified RFC 3339 string.
pub fn format_in(instant: DateTime<Utc>, timezone: Tz) -> String {
    instant
        .with_timezone(&timezone)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Resolves when a request's readings were taken.
///
/// Falls back to the current wall-clock time when the station sent no usable timestamp,
/// so a bad clock never causes readings to be dropped.
pub fn measured_on(upload: &StationUpload, timezone: Tz) -> String {
    let instant = match upload.get(TIMESTAMP_FIELD).map(str::trim) {
        None | Some("") => Utc::now(),
        Some(raw) if raw.eq_ignore_ascii_case(NOW_LITERAL) => Utc::now(),
        Some(raw) => parse_timestamp(raw).unwrap_or_else(|error| {
            warn!(value = raw, error = %error, "Failed to parse dateutc, using current time");
            Utc::now()
        }),
    };

    format_in(instant, timezone)
}
