use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn from_rfc3339(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Normalize a JSON timestamp field into a UTC date, whether it arrives as
/// an ISO string, epoch seconds or epoch milliseconds.
pub fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => from_rfc3339(s).ok(),
        JsonValue::Number(n) => {
            let raw = n.as_i64()?;
            // Heuristic: epoch values past the year 2255 in seconds are millis.
            if raw > 9_000_000_000 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}
