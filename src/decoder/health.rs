// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Health reading wire format.

use super::{finite, from_json, parse_timestamp, RecordDecoder};
use crate::error::DecodeError;
use crate::observation::Observation;
use serde::{Deserialize, Serialize};

/// Series key used when a health record carries no key.
pub const DEFAULT_HEALTH_KEY: &str = "health";

/// One health reading as published on the health topic.
///
/// The timestamp is stamped by the publisher; source CSV rows carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub steps: u64,
    pub heart_rate: u32,
    pub calories_burned: f64,
    pub sleep_hours: f64,
    pub hydration_liters: f64,
    pub timestamp: String,
}

impl HealthEvent {
    /// Serialize to the JSON payload.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Convert to an observation for `series_key`.
    pub fn into_observation(self, series_key: &str) -> Result<Observation, DecodeError> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        Ok(Observation::new(series_key, timestamp)
            .with_field("steps", self.steps as f64)
            .with_field("heart_rate", f64::from(self.heart_rate))
            .with_field(
                "calories_burned",
                finite("calories_burned", self.calories_burned)?,
            )
            .with_field("sleep_hours", finite("sleep_hours", self.sleep_hours)?)
            .with_field(
                "hydration_liters",
                finite("hydration_liters", self.hydration_liters)?,
            ))
    }
}

/// Decoder for [`HealthEvent`] payloads.
///
/// Uses the record key as series key when the publisher set one, otherwise
/// the configured default subject.
#[derive(Debug, Clone)]
pub struct HealthDecoder {
    default_key: String,
}

impl HealthDecoder {
    pub fn new(default_key: impl Into<String>) -> Self {
        Self {
            default_key: default_key.into(),
        }
    }
}

impl Default for HealthDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTH_KEY)
    }
}

impl RecordDecoder for HealthDecoder {
    fn decode(&self, key: Option<&str>, payload: &[u8]) -> Result<Observation, DecodeError> {
        let key = key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(&self.default_key);
        if key.is_empty() {
            return Err(DecodeError::EmptySeriesKey);
        }
        from_json::<HealthEvent>(payload)?.into_observation(key)
    }

    fn name(&self) -> &str {
        "health"
    }
}
