// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Record decoders.
//!
//! A decoder turns one raw topic payload into an [`Observation`]. Each wire
//! format has its own decoder; the wire types double as the encoders used by
//! the publishing side.
//!
//! - [`MarketDecoder`]: JSON stock ticks keyed by symbol
//! - [`HealthDecoder`]: JSON health readings keyed by a configured subject
//! - Custom formats via the [`RecordDecoder`] trait

mod health;
mod market;

pub use health::{HealthDecoder, HealthEvent, DEFAULT_HEALTH_KEY};
pub use market::{MarketDecoder, MarketEvent};

use crate::error::DecodeError;
use crate::observation::Observation;
use chrono::{DateTime, NaiveDateTime, Utc};

/// Trait for record decoders.
pub trait RecordDecoder: Send {
    /// Decode a raw payload. `key` is the record key attached by the publisher.
    fn decode(&self, key: Option<&str>, payload: &[u8]) -> Result<Observation, DecodeError>;

    /// Short name for logging.
    fn name(&self) -> &str;
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with an offset and naive date-times without one; naive
/// values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DecodeError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| DecodeError::InvalidTimestamp(raw.to_string()))
}

pub(crate) fn finite(field: &'static str, value: f64) -> Result<f64, DecodeError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DecodeError::NonFinite { field, value })
    }
}

pub(crate) fn from_json<'a, T: serde::Deserialize<'a>>(payload: &'a [u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(payload).map_err(|e| {
        // serde reports absent fields as data errors; surface them by name.
        let msg = e.to_string();
        match missing_field_name(&msg) {
            Some(field) => DecodeError::MissingField(field),
            None => DecodeError::Malformed(msg),
        }
    })
}

fn missing_field_name(msg: &str) -> Option<&'static str> {
    const KNOWN: [&str; 9] = [
        "symbol",
        "price",
        "timestamp",
        "steps",
        "heart_rate",
        "calories_burned",
        "sleep_hours",
        "hydration_liters",
        "volume",
    ];
    let rest = msg.strip_prefix("missing field `")?;
    let name = rest.split('`').next()?;
    KNOWN.iter().copied().find(|k| *k == name)
}
