//! Millisecond-precision ISO-8601 timestamps.
//!
//! Every timestamp that crosses a service boundary uses the `YYYY-MM-DDTHH:MM:SS.mmm` layout, interpreted as UTC.
//! The `iso_millis` and `iso_millis_option` modules plug into `#[serde(with = ...)]`.
use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

pub const ISO_MILLIS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

#[derive(Debug, Clone, Error)]
#[error("Invalid timestamp '{value}'. Expected YYYY-MM-DDTHH:MM:SS.mmm")]
pub struct TimestampError {
    pub value: String,
}

pub fn format_iso_millis(ts: &DateTime<Utc>) -> String {
    ts.format(ISO_MILLIS_FORMAT).to_string()
}

/// Parses a millisecond timestamp. RFC 3339 strings with an explicit offset are also accepted and converted to UTC.
pub fn parse_iso_millis(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, ISO_MILLIS_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc)))
        .map_err(|_| TimestampError { value: value.to_string() })
}

/// Truncates a timestamp to whole milliseconds, so that it survives a trip through the wire format unchanged.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_iso_millis(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let value = String::deserialize(d)?;
        super::parse_iso_millis(&value).map_err(D::Error::custom)
    }
}

pub mod iso_millis_option {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_some(&super::format_iso_millis(ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Option::<String>::deserialize(d)?;
        match value {
            Some(s) if !s.trim().is_empty() => super::parse_iso_millis(&s).map(Some).map_err(D::Error::custom),
            _ => Ok(None),
        }
    }
}
