// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Stock tick wire format.

use super::{finite, from_json, parse_timestamp, RecordDecoder};
use crate::error::DecodeError;
use crate::observation::Observation;
use serde::{Deserialize, Serialize};

/// One stock tick as published on the market topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub symbol: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<f64>,
    /// ISO-8601 event time.
    pub timestamp: String,
}

impl MarketEvent {
    /// Serialize to the JSON payload.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Convert to an observation keyed by symbol.
    pub fn into_observation(self) -> Result<Observation, DecodeError> {
        let symbol = self.symbol.trim();
        if symbol.is_empty() {
            return Err(DecodeError::EmptySeriesKey);
        }
        let timestamp = parse_timestamp(&self.timestamp)?;

        let mut obs =
            Observation::new(symbol, timestamp).with_field("price", finite("price", self.price)?);
        if let Some(volume) = self.volume {
            obs = obs.with_field("volume", volume as f64);
        }
        if let Some(pct) = self.percent_change {
            obs = obs.with_field("percent_change", finite("percent_change", pct)?);
        }
        Ok(obs)
    }
}

/// Decoder for [`MarketEvent`] payloads. The series key is the symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketDecoder;

impl MarketDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl RecordDecoder for MarketDecoder {
    fn decode(&self, _key: Option<&str>, payload: &[u8]) -> Result<Observation, DecodeError> {
        from_json::<MarketEvent>(payload)?.into_observation()
    }

    fn name(&self) -> &str {
        "market"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_decode_full_event() {
        let payload = br#"{"symbol":"AAPL","price":150.25,"volume":1200,"percent_change":-0.4,"timestamp":"2025-01-11T18:15:00Z"}"#;
        let obs = MarketDecoder::new().decode(Some("AAPL"), payload).unwrap();

        assert_eq!(obs.series_key, "AAPL");
        assert_eq!(obs.field("price"), Some(150.25));
        assert_eq!(obs.field("volume"), Some(1200.0));
        assert_eq!(obs.field("percent_change"), Some(-0.4));
        assert_eq!(
            obs.timestamp,
            Utc.with_ymd_and_hms(2025, 1, 11, 18, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_decode_minimal_event() {
        let payload = br#"{"symbol":"MSFT","price":410.0,"timestamp":"2025-01-11T18:15:00.250000"}"#;
        let obs = MarketDecoder::new().decode(None, payload).unwrap();
        assert_eq!(obs.series_key, "MSFT");
        assert!(!obs.has_field("volume"));
        assert!(!obs.has_field("percent_change"));
    }

    #[test]
    fn test_missing_price() {
        let payload = br#"{"symbol":"AAPL","timestamp":"2025-01-11T18:15:00Z"}"#;
        assert_eq!(
            MarketDecoder::new().decode(None, payload),
            Err(DecodeError::MissingField("price"))
        );
    }

    #[test]
    fn test_malformed_payload() {
        let result = MarketDecoder::new().decode(None, b"not json");
        assert!(matches!(result, Err(DecodeError::Malformed(_))));

        let payload = br#"{"symbol":"AAPL","price":"high","timestamp":"2025-01-11T18:15:00Z"}"#;
        let result = MarketDecoder::new().decode(None, payload);
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_empty_symbol() {
        let payload = br#"{"symbol":"  ","price":1.0,"timestamp":"2025-01-11T18:15:00Z"}"#;
        assert_eq!(
            MarketDecoder::new().decode(None, payload),
            Err(DecodeError::EmptySeriesKey)
        );
    }

    #[test]
    fn test_event_to_json() {
        let event = MarketEvent {
            symbol: "GOOGL".to_string(),
            price: 140.5,
            volume: None,
            percent_change: None,
            timestamp: "2025-01-11T18:15:00Z".to_string(),
        };
        let json = event.to_json().unwrap();
        assert!(!json.contains("volume"));
        let obs = MarketDecoder::new().decode(None, json.as_bytes()).unwrap();
        assert_eq!(obs.field("price"), Some(140.5));
    }
}
