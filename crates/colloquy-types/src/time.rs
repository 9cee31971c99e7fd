//! Timestamp parsing and formatting shared by messages, sessions and stores.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Fixed format for message timestamps in the storage form.
pub const MESSAGE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a session timestamp (RFC 3339, full precision).
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 and the naive ISO-8601 / space-separated forms written by
/// older session files, which carry no offset and are read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("invalid timestamp: '{raw}'"))
}

/// Serde adapter for required session timestamps.
pub mod serde_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_timestamp("2025-02-01T08:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 6);
    }

    #[test]
    fn test_parse_naive_iso() {
        let dt = parse_timestamp("2025-02-01T08:30:00.123456").unwrap();
        assert_eq!(dt.day(), 1);
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_parse_space_separated() {
        let dt = parse_timestamp("2025-02-01 08:30:00").unwrap();
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_format_roundtrip_keeps_precision() {
        let now = Utc::now();
        let parsed = parse_timestamp(&format_timestamp(&now)).unwrap();
        assert_eq!(parsed, now);
    }
}
