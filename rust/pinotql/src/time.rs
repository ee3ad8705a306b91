//! Time range handling for preview requests.
//!
//! Hosts hand over dashboard ranges as strings (`now-6h`, RFC3339, epoch milliseconds);
//! requests only ever carry the resolved absolute form.

use crate::error::{EditorError, Result};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Unresolved dashboard range as the host sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTimeRange {
    pub from: String,
    pub to: String,
}

impl RawTimeRange {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<TimeRange> {
        let from = parse_time_value(&self.from)?.resolve(now);
        let to = parse_time_value(&self.to)?.resolve(now);
        if from > to {
            return Err(EditorError::InvalidRequest(
                "time range start must be before end".to_string(),
            ));
        }
        Ok(TimeRange { from, to })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSpec {
    Now,
    Ago(Duration),
    Absolute(DateTime<Utc>),
}

impl TimeSpec {
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeSpec::Now => now,
            TimeSpec::Ago(offset) => now
                .checked_sub_signed(*offset)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            TimeSpec::Absolute(instant) => *instant,
        }
    }
}

pub fn parse_time_value(raw: &str) -> Result<TimeSpec> {
    let value = raw.trim().trim_matches('"').trim_matches('\'');

    if value.eq_ignore_ascii_case("now") {
        return Ok(TimeSpec::Now);
    }

    if let Some(offset) = value.strip_prefix("now-") {
        return parse_offset(offset).map(TimeSpec::Ago).ok_or_else(|| {
            EditorError::InvalidRequest(format!("unsupported relative time '{raw}'"))
        });
    }

    if !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit()) {
        let millis = value
            .parse::<i64>()
            .map_err(|_| EditorError::InvalidRequest(format!("invalid epoch time '{raw}'")))?;
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .map(TimeSpec::Absolute)
            .ok_or_else(|| EditorError::InvalidRequest(format!("epoch out of range '{raw}'")));
    }

    parse_datetime(value).map(TimeSpec::Absolute)
}

fn parse_offset(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value.find(|ch: char| !ch.is_ascii_digit())?;
    let (digits, unit) = value.split_at(split);
    let amount: i64 = digits.parse().ok()?;

    match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        _ => None,
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
    }
    Err(EditorError::InvalidRequest(format!(
        "invalid time literal '{value}'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn resolves_relative_range() {
        let now = instant("2025-03-01T12:00:00Z");
        let range = RawTimeRange {
            from: "now-6h".into(),
            to: "now".into(),
        }
        .resolve(now)
        .unwrap();

        assert_eq!(range.from, instant("2025-03-01T06:00:00Z"));
        assert_eq!(range.to, now);
    }

    #[test]
    fn parses_each_offset_unit() {
        let now = instant("2025-03-01T12:00:00Z");
        let cases = [
            ("now-30s", "2025-03-01T11:59:30Z"),
            ("now-15m", "2025-03-01T11:45:00Z"),
            ("now-2d", "2025-02-27T12:00:00Z"),
            ("now-1w", "2025-02-22T12:00:00Z"),
        ];
        for (raw, expected) in cases {
            assert_eq!(
                parse_time_value(raw).unwrap().resolve(now),
                instant(expected),
                "{raw}"
            );
        }
    }

    #[test]
    fn parses_absolute_forms() {
        assert_eq!(
            parse_time_value("1735689600000").unwrap(),
            TimeSpec::Absolute(instant("2025-01-01T00:00:00Z"))
        );
        assert_eq!(
            parse_time_value("2025-01-01 00:00:00").unwrap(),
            TimeSpec::Absolute(instant("2025-01-01T00:00:00Z"))
        );
        assert_eq!(
            parse_time_value("2025-01-01T02:00:00+02:00").unwrap(),
            TimeSpec::Absolute(instant("2025-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_time_value("now-5y").is_err());
        assert!(parse_time_value("now-").is_err());
        assert!(parse_time_value("yesterday").is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        let err = RawTimeRange {
            from: "now".into(),
            to: "now-1h".into(),
        }
        .resolve(Utc::now())
        .unwrap_err();
        assert!(matches!(err, EditorError::InvalidRequest(_)));
    }
}
