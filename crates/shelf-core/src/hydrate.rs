//! Timestamp hydration
//!
//! Every timestamp crosses a JSON boundary as text and loses its native
//! typing on the way. These helpers turn the textual forms produced by the
//! remote service (and by older clients) back into comparable
//! `DateTime<Utc>` values, and format them consistently on the way out.
//!
//! Accepted inputs:
//! - RFC 3339 (`2024-03-01T10:15:00.000Z`, `2024-03-01T12:15:00+02:00`)
//! - naive date-time, assumed UTC (`2024-03-01 10:15:00`, `2024-03-01T10:15:00`)
//! - plain date, midnight UTC (`2024-03-01`)
//! - Unix epoch milliseconds, as a JSON number or a digit-only string
//!
//! Timestamps are kept at millisecond precision so a value survives a
//! round trip through the wire or SQLite unchanged.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::Serializer;

/// Naive date-time layouts tried after RFC 3339
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Current time truncated to millisecond precision
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Bump a timestamp to now, never moving it backwards
pub fn bump(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now();
    match previous {
        Some(prev) if prev > now => prev,
        _ => now,
    }
}

/// Treat a missing timestamp as the Unix epoch
pub fn or_epoch(value: Option<DateTime<Utc>>) -> DateTime<Utc> {
    value.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Parse a textual timestamp in any of the accepted forms
///
/// Returns `None` for empty or unrecognized input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).trunc_subsecs(3));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().trunc_subsecs(3));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok().and_then(from_millis);
    }

    None
}

/// Convert epoch milliseconds to a timestamp
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

/// Convert a timestamp to epoch milliseconds
pub fn to_millis(value: &DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

/// Format a timestamp the way the remote service expects it
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = Option<DateTime<Utc>>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a timestamp string, epoch milliseconds, or null")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if v.trim().is_empty() {
            return Ok(None);
        }
        parse_timestamp(v)
            .map(Some)
            .ok_or_else(|| E::custom(format!("unrecognized timestamp: {:?}", v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        from_millis(v)
            .map(Some)
            .ok_or_else(|| E::custom(format!("timestamp out of range: {}", v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let millis = i64::try_from(v)
            .map_err(|_| E::custom(format!("timestamp out of range: {}", v)))?;
        self.visit_i64(millis)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom("timestamp is not a finite number"));
        }
        self.visit_i64(v.trunc() as i64)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

/// Serde adapter for required timestamps
pub mod datetime {
    use super::*;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        deserializer
            .deserialize_any(TimestampVisitor)?
            .ok_or_else(|| de::Error::custom("missing required timestamp"))
    }
}

/// Serde adapter for optional timestamps
///
/// Use together with `#[serde(default)]` so an absent field becomes `None`.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&format_timestamp(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        deserializer.deserialize_option(TimestampVisitor)
    }
}
