use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::core::errors::{AuditError, Result};

/// Parse `--since`: an RFC 3339 timestamp, or `YYYY-MM-DD` meaning the
/// start of that day (UTC).
pub fn parse_since(s: &str) -> Result<DateTime<Utc>> {
    parse_with_time(s, NaiveTime::MIN)
}

/// Parse `--until`: an RFC 3339 timestamp, or `YYYY-MM-DD` meaning the
/// last instant of that day (UTC).
pub fn parse_until(s: &str) -> Result<DateTime<Utc>> {
    let end_of_day =
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN);
    parse_with_time(s, end_of_day)
}

fn parse_with_time(s: &str, time: NaiveTime) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| Utc.from_utc_datetime(&d.and_time(time)))
        .map_err(|_| AuditError::InvalidQuery {
            detail: format!(
                "Invalid date: '{s}'. Expected YYYY-MM-DD or RFC 3339, e.g. 2026-01-15 \
                 or 2026-01-15T09:30:00Z"
            ),
        })
}
