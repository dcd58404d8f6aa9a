//! Value normalization for snapshot columns
//!
//! Exports from GitHub dumps, BigQuery and pandas disagree on date formats
//! and on how integers are written. These helpers accept all of them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Timestamp layouts with an explicit offset
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
];

/// Timestamp layouts without an offset; read as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a timestamp in any of the accepted layouts.
///
/// Returns `None` for anything unparseable; callers store that as NULL.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }

    // BigQuery exports: "2021-03-04 10:00:00 UTC"
    let s = s.strip_suffix(" UTC").unwrap_or(s);
    let s = s.strip_suffix('Z').unwrap_or(s);

    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|ts| ts.and_utc());
        }
    }
    None
}

/// Split a delimiter-separated list, trimming items and dropping empties
pub fn split_list(raw: &str, delimiter: &str) -> Vec<String> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Parse an integer, accepting integral floats such as `"12.0"`
pub fn parse_int(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    float_to_int(s.parse::<f64>().ok()?)
}

pub fn float_to_int(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_common_layouts() {
        let expected = utc(2023, 4, 5, 6, 7, 8);
        for raw in [
            "2023-04-05T06:07:08Z",
            "2023-04-05T06:07:08+00:00",
            "2023-04-05 06:07:08",
            "2023-04-05 06:07:08 UTC",
            "2023-04-05 06:07:08+00:00",
            "2023-04-05T06:07:08",
            "2023-04-05T08:07:08+02:00",
            "04/05/2023 06:07:08",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "failed on {raw}");
        }
    }

    #[test]
    fn test_parse_fractional_seconds_and_dates() {
        let ts = parse_timestamp("2023-04-05 06:07:08.250").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
        assert_eq!(parse_timestamp("2023-04-05"), Some(utc(2023, 4, 5, 0, 0, 0)));
    }

    #[test]
    fn test_unparseable_timestamp_is_none() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("2023-13-45"), None);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" bug ; ui;;  ", ";"), vec!["bug", "ui"]);
        assert!(split_list("", ";").is_empty());
        assert_eq!(split_list("a|b", "|"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int(" 12.0 "), Some(12));
        assert_eq!(parse_int("12.5"), None);
        assert_eq!(parse_int("nan"), None);
        assert_eq!(parse_int(""), None);
    }
}
