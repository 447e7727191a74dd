// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Stall rule: a metric whose range over a full window stays at or below a
//! small threshold.

use super::Classifier;
use crate::alert::Alert;
use crate::config::StallConfig;
use crate::window::RollingWindow;

/// Emits `STALL` when `range_of(field) <= threshold` on a full window.
///
/// The range is plain `f64` subtraction, so decimal inputs are compared as
/// their nearest binary values. A window spanning 10.1 to 10.3 has a range of
/// 0.20000000000000107 and does not stall at a threshold of 0.2.
#[derive(Debug, Clone)]
pub struct StallRule {
    field: String,
    threshold: f64,
}

impl StallRule {
    pub fn new(field: impl Into<String>, threshold: f64) -> Self {
        Self {
            field: field.into(),
            threshold,
        }
    }

    pub fn from_config(config: &StallConfig) -> Self {
        Self::new(config.field.clone(), config.threshold)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Classifier for StallRule {
    fn evaluate(&self, window: &RollingWindow) -> Vec<Alert> {
        let (Some(range), Some(timestamp)) =
            (window.range_of(&self.field), window.last_updated())
        else {
            return Vec::new();
        };

        if range <= self.threshold {
            vec![Alert::stall(
                window.series_key(),
                &self.field,
                range,
                self.threshold,
                window.len(),
                timestamp,
            )]
        } else {
            Vec::new()
        }
    }

    fn name(&self) -> &str {
        "stall"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertDetail, AlertKind};
    use crate::observation::Observation;
    use chrono::{Duration, TimeZone, Utc};

    fn window_of(values: &[f64]) -> RollingWindow {
        let start = Utc.with_ymd_and_hms(2025, 1, 25, 10, 0, 0).unwrap();
        let mut window = RollingWindow::new("health", 5);
        for (i, v) in values.iter().enumerate() {
            window.push(
                Observation::new("health", start + Duration::seconds(i as i64))
                    .with_field("calories_burned", *v),
            );
        }
        window
    }

    fn rule() -> StallRule {
        StallRule::new("calories_burned", 0.2)
    }

    #[test]
    fn test_stall_detected() {
        let alerts = rule().evaluate(&window_of(&[10.0, 10.1, 9.95, 10.05, 10.0]));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Stall);
        match &alerts[0].detail {
            AlertDetail::Range { range, threshold, .. } => {
                assert!((range - 0.15).abs() < 1e-9);
                assert!((threshold - 0.2).abs() < 1e-12);
            }
            other => panic!("Wrong detail type: {:?}", other),
        }
    }

    #[test]
    fn test_no_stall_on_movement() {
        assert!(rule()
            .evaluate(&window_of(&[10.0, 10.5, 9.5, 10.3, 9.7]))
            .is_empty());
    }

    #[test]
    fn test_boundary_is_inclusive() {
        // 0.0 and 0.2 are exact in binary arithmetic here: 0.2 - 0.0 == 0.2.
        let alerts = rule().evaluate(&window_of(&[0.0, 0.2, 0.1, 0.1, 0.0]));
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_decimal_range_just_over_threshold() {
        let window = window_of(&[10.1, 10.3, 10.2, 10.2, 10.1]);
        let range = window.range_of("calories_burned").unwrap();
        assert!(range > 0.2);
        assert!(rule().evaluate(&window).is_empty());
    }

    #[test]
    fn test_partial_window_not_ready() {
        assert!(rule().evaluate(&window_of(&[10.0, 10.0, 10.0])).is_empty());
    }

    #[test]
    fn test_missing_field_not_ready() {
        let mut window = window_of(&[10.0, 10.0, 10.0, 10.0]);
        window.push(Observation::new("health", Utc::now()).with_field("steps", 10.0));
        assert!(rule().evaluate(&window).is_empty());
    }

    #[test]
    fn test_alert_timestamp_is_latest() {
        let window = window_of(&[10.0; 5]);
        let alerts = rule().evaluate(&window);
        assert_eq!(Some(alerts[0].timestamp), window.last_updated());
    }
}
