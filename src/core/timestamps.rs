// Timestamp parsing and rendering for schedule payloads and audit values

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{AppError, AppResult};

/// Legacy board form, interpreted as UTC. Fractional seconds are optional.
const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse a client-supplied timestamp.
///
/// Accepts RFC 3339 (`2024-05-01T09:00:00Z`, any offset) and the legacy
/// `2024-05-01 09:00:00.000` form. Anything else is rejected rather than
/// silently keeping the previous value.
pub fn parse_timestamp(field: &str, input: &str) -> AppResult<DateTime<Utc>> {
    let trimmed = input.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, LEGACY_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| {
            AppError::InvalidArgument(format!("{} is not a valid timestamp: {:?}", field, input))
        })
}

/// Render an optional timestamp for the audit log; absent renders as "".
pub fn render_timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}
