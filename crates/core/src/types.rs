use chrono::{NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer};

/// Server-assigned primary keys are integers.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Deserialize a timestamp that may or may not carry an offset.
///
/// The security service serializes naive datetimes for some columns;
/// those are taken to be UTC.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Parse an RFC 3339 timestamp, falling back to a naive ISO 8601 one in UTC.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, chrono::ParseError> {
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&chrono::Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| chrono::Utc.from_utc_datetime(&naive))
            .map_err(|_| rfc_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offset_timestamp() {
        let ts = parse_timestamp("2026-03-01T10:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-03-01T08:00:00+00:00");
    }

    #[test]
    fn parses_naive_timestamp_as_utc() {
        let ts = parse_timestamp("2026-03-01T10:00:00.250000").unwrap();
        assert_eq!(ts.timestamp_millis() % 1000, 250);
        assert_eq!(ts.to_rfc3339(), "2026-03-01T10:00:00.250+00:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
    }
}
