// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Market rule set: price spike, volume surge and price trend.

use super::Classifier;
use crate::alert::{Alert, AlertKind};
use crate::config::MarketConfig;
use crate::window::RollingWindow;

/// Trailing deviations at or below this are treated as zero. A flat history
/// has no meaningful spread to measure a spike against.
const EPSILON: f64 = 1e-9;

/// Spike, surge and trend checks on a full window.
///
/// - `SPIKE`: `|latest price - trailing mean| > spike_multiplier * trailing stddev`
/// - `VOLUME_SURGE`: same check on volume with `surge_multiplier`
/// - `TREND`: the latest run of strictly rising or falling prices spans at
///   least `trend_min_run` changes
///
/// All checks run on every evaluation; one window can yield several alerts.
#[derive(Debug, Clone)]
pub struct MarketTrendRule {
    price_field: String,
    volume_field: String,
    spike_multiplier: f64,
    surge_multiplier: f64,
    trend_min_run: usize,
}

impl MarketTrendRule {
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            price_field: config.price_field.clone(),
            volume_field: config.volume_field.clone(),
            spike_multiplier: config.spike_multiplier,
            surge_multiplier: config.surge_multiplier,
            trend_min_run: config.trend_min_run.max(1),
        }
    }

    fn check_deviation(
        &self,
        window: &RollingWindow,
        kind: AlertKind,
        field: &str,
        multiplier: f64,
    ) -> Option<Alert> {
        let stats = window.trailing_stats(field)?;
        if stats.stddev <= EPSILON {
            return None;
        }
        if stats.deviation() > multiplier * stats.stddev {
            let timestamp = window.last_updated()?;
            Some(Alert::deviation(
                window.series_key(),
                kind,
                field,
                &stats,
                multiplier,
                timestamp,
            ))
        } else {
            None
        }
    }

    fn check_trend(&self, window: &RollingWindow) -> Option<Alert> {
        let (direction, run) = window.monotonic_run(&self.price_field)?;
        if run < self.trend_min_run {
            return None;
        }
        let latest = window.latest()?;
        Some(Alert::trend(
            window.series_key(),
            &self.price_field,
            direction,
            run,
            self.trend_min_run,
            latest.field(&self.price_field)?,
            latest.timestamp,
        ))
    }
}

impl Default for MarketTrendRule {
    fn default() -> Self {
        Self::from_config(&MarketConfig::default())
    }
}

impl Classifier for MarketTrendRule {
    fn evaluate(&self, window: &RollingWindow) -> Vec<Alert> {
        if !window.is_full() {
            return Vec::new();
        }

        let mut alerts = Vec::new();

        // Price spike
        if let Some(alert) = self.check_deviation(
            window,
            AlertKind::Spike,
            &self.price_field,
            self.spike_multiplier,
        ) {
            alerts.push(alert);
        }

        // Volume surge
        if let Some(alert) = self.check_deviation(
            window,
            AlertKind::VolumeSurge,
            &self.volume_field,
            self.surge_multiplier,
        ) {
            alerts.push(alert);
        }

        // Trend
        if let Some(alert) = self.check_trend(window) {
            alerts.push(alert);
        }

        alerts
    }

    fn name(&self) -> &str {
        "market-trend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertDetail;
    use crate::observation::Observation;
    use crate::window::TrendDirection;
    use chrono::{Duration, TimeZone, Utc};

    fn window_of(prices: &[f64], volumes: Option<&[f64]>) -> RollingWindow {
        let start = Utc.with_ymd_and_hms(2025, 1, 11, 18, 15, 0).unwrap();
        let mut window = RollingWindow::new("AAPL", 5);
        for (i, price) in prices.iter().enumerate() {
            let mut obs = Observation::new("AAPL", start + Duration::seconds(i as i64))
                .with_field("price", *price);
            if let Some(volumes) = volumes {
                obs = obs.with_field("volume", volumes[i]);
            }
            window.push(obs);
        }
        window
    }

    fn kinds(alerts: &[Alert]) -> Vec<AlertKind> {
        alerts.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn test_price_spike() {
        let window = window_of(&[100.0, 102.0, 100.0, 102.0, 120.0], None);
        let alerts = MarketTrendRule::default().evaluate(&window);
        assert_eq!(kinds(&alerts), vec![AlertKind::Spike]);
        match &alerts[0].detail {
            AlertDetail::Deviation { latest, mean, .. } => {
                assert!((latest - 120.0).abs() < 1e-12);
                assert!((mean - 101.0).abs() < 1e-12);
            }
            other => panic!("Wrong detail type: {:?}", other),
        }
    }

    #[test]
    fn test_trend_without_spike() {
        let window = window_of(&[100.0, 101.0, 102.0, 103.0, 104.0], None);
        let alerts = MarketTrendRule::default().evaluate(&window);
        assert_eq!(kinds(&alerts), vec![AlertKind::Trend]);
        match &alerts[0].detail {
            AlertDetail::Run {
                direction,
                run_length,
                ..
            } => {
                assert_eq!(*direction, TrendDirection::Up);
                assert_eq!(*run_length, 4);
            }
            other => panic!("Wrong detail type: {:?}", other),
        }
    }

    #[test]
    fn test_spike_and_trend_together() {
        let window = window_of(&[100.0, 100.5, 101.0, 101.5, 110.0], None);
        let alerts = MarketTrendRule::default().evaluate(&window);
        assert_eq!(kinds(&alerts), vec![AlertKind::Spike, AlertKind::Trend]);
    }

    #[test]
    fn test_volume_surge() {
        let window = window_of(
            &[100.0, 99.0, 100.0, 99.0, 100.0],
            Some(&[1000.0, 1100.0, 900.0, 1000.0, 5000.0]),
        );
        let alerts = MarketTrendRule::default().evaluate(&window);
        assert_eq!(kinds(&alerts), vec![AlertKind::VolumeSurge]);
        assert_eq!(alerts[0].detail.field(), "volume");
    }

    #[test]
    fn test_flat_history_no_spike() {
        let window = window_of(&[100.0, 100.0, 100.0, 100.0, 100.5], None);
        assert!(MarketTrendRule::default().evaluate(&window).is_empty());
    }

    #[test]
    fn test_default_min_run_is_three_changes() {
        let rule = MarketTrendRule::default();

        let three_rises = window_of(&[104.0, 100.0, 101.0, 102.0, 103.0], None);
        let alerts = rule.evaluate(&three_rises);
        assert_eq!(kinds(&alerts), vec![AlertKind::Trend]);
        match &alerts[0].detail {
            AlertDetail::Run { run_length, .. } => assert_eq!(*run_length, 3),
            other => panic!("Wrong detail type: {:?}", other),
        }

        let two_rises = window_of(&[101.0, 104.0, 100.0, 102.0, 103.0], None);
        assert!(rule.evaluate(&two_rises).is_empty());
    }

    #[test]
    fn test_downward_trend_min_run() {
        let window = window_of(&[105.0, 104.8, 104.6, 104.4, 104.2], None);
        let mut config = MarketConfig::default();
        config.trend_min_run = 5;
        assert!(MarketTrendRule::from_config(&config)
            .evaluate(&window)
            .is_empty());

        config.trend_min_run = 4;
        let alerts = MarketTrendRule::from_config(&config).evaluate(&window);
        assert_eq!(kinds(&alerts), vec![AlertKind::Trend]);
    }

    #[test]
    fn test_partial_window_not_ready() {
        let window = window_of(&[100.0, 101.0, 150.0], None);
        assert!(MarketTrendRule::default().evaluate(&window).is_empty());
    }

    #[test]
    fn test_evaluate_is_pure() {
        let window = window_of(&[100.0, 100.5, 101.0, 101.5, 110.0], None);
        let rule = MarketTrendRule::default();
        assert_eq!(rule.evaluate(&window), rule.evaluate(&window));
    }
}
