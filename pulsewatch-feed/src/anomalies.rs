// Pulsewatch Feed - Event producers and topic log
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Anomaly injection for simulated feeds.
//!
//! An anomaly rewrites one field of a generated series for a span of
//! samples, so the monitor has something to find.

use pulsewatch::AlertKind;
use serde::{Deserialize, Serialize};

/// When and how to disturb a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Type of anomaly to inject.
    pub anomaly_type: AnomalyType,
    /// Sample index when anomaly starts.
    pub start_sample: usize,
    /// Duration in samples (None = until end).
    pub duration_samples: Option<usize>,
}

impl AnomalyConfig {
    pub fn new(anomaly_type: AnomalyType, start_sample: usize) -> Self {
        Self {
            anomaly_type,
            start_sample,
            duration_samples: None,
        }
    }

    /// Set duration in samples.
    pub fn with_duration(mut self, samples: usize) -> Self {
        self.duration_samples = Some(samples);
        self
    }

    /// Check if anomaly is active at given sample index.
    pub fn is_active(&self, sample_idx: usize) -> bool {
        if sample_idx < self.start_sample {
            return false;
        }
        match self.duration_samples {
            Some(duration) => sample_idx < self.start_sample + duration,
            None => true,
        }
    }

    /// Get samples since anomaly start.
    pub fn samples_since_start(&self, sample_idx: usize) -> usize {
        sample_idx.saturating_sub(self.start_sample)
    }
}

/// Type of anomaly to inject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    /// Value frozen at its first reading inside the span.
    Stuck,

    /// One-sample jump at the start of the span.
    Spike {
        /// Jump relative to the current value (0.2 = +20%).
        magnitude: f64,
    },

    /// Steady move away from the underlying value.
    Drift {
        /// Change per sample relative to the value at span start.
        rate_per_sample: f64,
    },
}

impl AnomalyType {
    pub fn stuck() -> Self {
        AnomalyType::Stuck
    }

    pub fn spike(magnitude: f64) -> Self {
        AnomalyType::Spike { magnitude }
    }

    pub fn drift(rate_per_sample: f64) -> Self {
        AnomalyType::Drift { rate_per_sample }
    }

    /// Alert a monitor should raise for this anomaly. Stuck targets a health
    /// metric (stall); spike and drift target a price series.
    pub fn expected_alert(&self) -> AlertKind {
        match self {
            AnomalyType::Stuck => AlertKind::Stall,
            AnomalyType::Spike { .. } => AlertKind::Spike,
            AnomalyType::Drift { .. } => AlertKind::Trend,
        }
    }
}

/// Per-series state for anomaly application.
#[derive(Debug, Clone, Default)]
pub struct AnomalyState {
    /// Value at span start.
    pub anchor: Option<f64>,
}

impl AnomalyState {
    /// Apply `anomaly` to `value`.
    pub fn apply(&mut self, anomaly: &AnomalyType, value: f64, samples_since_start: usize) -> f64 {
        if samples_since_start == 0 {
            self.anchor = Some(value);
        }
        let anchor = *self.anchor.get_or_insert(value);

        match anomaly {
            AnomalyType::Stuck => anchor,
            AnomalyType::Spike { magnitude } => {
                if samples_since_start == 0 {
                    value * (1.0 + magnitude)
                } else {
                    value
                }
            }
            AnomalyType::Drift { rate_per_sample } => {
                anchor * (1.0 + rate_per_sample * (samples_since_start + 1) as f64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_config_active() {
        let config = AnomalyConfig::new(AnomalyType::Stuck, 100).with_duration(50);

        assert!(!config.is_active(99));
        assert!(config.is_active(100));
        assert!(config.is_active(149));
        assert!(!config.is_active(150));
        assert_eq!(config.samples_since_start(120), 20);
    }

    #[test]
    fn test_anomaly_config_no_duration() {
        let config = AnomalyConfig::new(AnomalyType::Stuck, 100);
        assert!(!config.is_active(99));
        assert!(config.is_active(1000));
    }

    #[test]
    fn test_stuck_anomaly() {
        let mut state = AnomalyState::default();
        assert_eq!(state.apply(&AnomalyType::Stuck, 25.0, 0), 25.0);
        assert_eq!(state.apply(&AnomalyType::Stuck, 30.0, 1), 25.0);
        assert_eq!(state.apply(&AnomalyType::Stuck, 35.0, 2), 25.0);
    }

    #[test]
    fn test_spike_anomaly() {
        let mut state = AnomalyState::default();
        let anomaly = AnomalyType::spike(0.5);
        assert_eq!(state.apply(&anomaly, 100.0, 0), 150.0);
        assert_eq!(state.apply(&anomaly, 100.0, 1), 100.0);
    }

    #[test]
    fn test_drift_anomaly() {
        let mut state = AnomalyState::default();
        let anomaly = AnomalyType::drift(0.01);
        let v1 = state.apply(&anomaly, 100.0, 0);
        let v2 = state.apply(&anomaly, 90.0, 1);
        let v3 = state.apply(&anomaly, 110.0, 2);
        assert!((v1 - 101.0).abs() < 1e-9);
        assert!((v2 - 102.0).abs() < 1e-9);
        assert!((v3 - 103.0).abs() < 1e-9);
    }

    #[test]
    fn test_expected_alert() {
        assert_eq!(AnomalyType::spike(1.0).expected_alert(), AlertKind::Spike);
        assert_eq!(AnomalyType::drift(0.1).expected_alert(), AlertKind::Trend);
    }

    #[test]
    fn test_config_serde() {
        let config = AnomalyConfig::new(AnomalyType::spike(0.3), 10);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("spike"));
        let parsed: AnomalyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
