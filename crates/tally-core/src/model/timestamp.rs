//! Lenient timestamp reading for stored documents.
//!
//! Stores written by older clients hold RFC 3339 stamps, bare calendar days,
//! offset-less date-times, and the occasional epoch-milliseconds number. All
//! of them read as UTC. Anything else reads as absent rather than failing
//! the record it sits in.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use tracing::debug;

/// Parse `raw` as RFC 3339, `YYYY-MM-DD` (midnight UTC), or an offset-less
/// `YYYY-MM-DDTHH:MM:SS[.fff]` taken as UTC.
#[must_use]
pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(day.and_time(NaiveTime::MIN).and_utc());
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStamp {
    Text(String),
    Millis(i64),
    Other(IgnoredAny),
}

/// `deserialize_with` helper for optional timestamps. Unreadable values
/// read as `None`.
///
/// # Errors
///
/// Only when the underlying deserializer itself fails.
pub fn lenient<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let stamp = match Option::<RawStamp>::deserialize(deserializer)? {
        None | Some(RawStamp::Other(_)) => None,
        Some(RawStamp::Text(text)) => {
            let parsed = parse(&text);
            if parsed.is_none() {
                debug!(value = %text, "unreadable timestamp treated as absent");
            }
            parsed
        }
        Some(RawStamp::Millis(ms)) => DateTime::from_timestamp_millis(ms),
    };
    Ok(stamp)
}
