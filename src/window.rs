// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Fixed-capacity rolling window for one series key.
//!
//! The window keeps the last `capacity` observations in arrival order. When
//! full, a push evicts the oldest observation before appending the new one.
//!
//! Statistics return `None` when the window cannot answer yet (too few
//! observations, or the field is missing from one of them). Callers treat
//! that as "not ready" rather than an error.

use crate::observation::Observation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of observations kept per series.
pub const DEFAULT_CAPACITY: usize = 5;

/// Direction of a monotonic run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
        }
    }
}

/// Latest value compared against the observations that precede it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingStats {
    /// Most recent value.
    pub latest: f64,
    /// Mean of the prior values.
    pub mean: f64,
    /// Sample standard deviation of the prior values.
    pub stddev: f64,
}

impl TrailingStats {
    /// Absolute distance of the latest value from the trailing mean.
    pub fn deviation(&self) -> f64 {
        (self.latest - self.mean).abs()
    }
}

/// Rolling window of the most recent observations for one series.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    series_key: String,
    capacity: usize,
    observations: VecDeque<Observation>,
}

impl RollingWindow {
    /// Create an empty window. A capacity of 0 is raised to 1.
    pub fn new(series_key: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            series_key: series_key.into(),
            capacity,
            observations: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an observation, evicting the oldest first when full.
    pub fn push(&mut self, observation: Observation) {
        if self.observations.len() == self.capacity {
            self.observations.pop_front();
        }
        self.observations.push_back(observation);
    }

    pub fn series_key(&self) -> &str {
        &self.series_key
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// True once the window holds `capacity` observations.
    pub fn is_full(&self) -> bool {
        self.observations.len() == self.capacity
    }

    /// Observations, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Most recent observation.
    pub fn latest(&self) -> Option<&Observation> {
        self.observations.back()
    }

    /// Timestamp of the most recent observation.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.latest().map(|o| o.timestamp)
    }

    /// Whether an observation with this timestamp is already held.
    pub fn contains_timestamp(&self, timestamp: DateTime<Utc>) -> bool {
        self.observations.iter().any(|o| o.timestamp == timestamp)
    }

    /// Values of `field` in arrival order.
    ///
    /// `None` if any held observation lacks the field, so partial series never
    /// feed the statistics.
    pub fn values(&self, field: &str) -> Option<Vec<f64>> {
        self.observations.iter().map(|o| o.field(field)).collect()
    }

    /// `max - min` of `field`. Requires a full window.
    pub fn range_of(&self, field: &str) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        let values = self.values(field)?;
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        Some(max - min)
    }

    /// Difference between the two most recent values of `field`.
    pub fn latest_delta(&self, field: &str) -> Option<f64> {
        let n = self.observations.len();
        if n < 2 {
            return None;
        }
        let last = self.observations[n - 1].field(field)?;
        let prev = self.observations[n - 2].field(field)?;
        Some(last - prev)
    }

    /// Mean of `field` over current contents.
    pub fn mean(&self, field: &str) -> Option<f64> {
        mean(&self.values(field)?)
    }

    /// Sample standard deviation of `field` over current contents.
    pub fn stddev(&self, field: &str) -> Option<f64> {
        stddev(&self.values(field)?)
    }

    /// Latest value of `field` against the mean and deviation of the values
    /// before it. Requires a full window of at least 3 observations so the
    /// trailing deviation is defined.
    pub fn trailing_stats(&self, field: &str) -> Option<TrailingStats> {
        if !self.is_full() {
            return None;
        }
        let values = self.values(field)?;
        let (latest, prior) = values.split_last()?;
        Some(TrailingStats {
            latest: *latest,
            mean: mean(prior)?,
            stddev: stddev(prior)?,
        })
    }

    /// Length and direction of the strictly monotonic run of `field` that ends
    /// at the latest observation, counted in consecutive changes.
    ///
    /// A flat step ends the run. `None` with fewer than 2 values or when the
    /// most recent step is flat.
    pub fn monotonic_run(&self, field: &str) -> Option<(TrendDirection, usize)> {
        let values = self.values(field)?;
        let mut steps = values.windows(2).rev().map(|w| w[1] - w[0]);

        let first = steps.next()?;
        let direction = if first > 0.0 {
            TrendDirection::Up
        } else if first < 0.0 {
            TrendDirection::Down
        } else {
            return None;
        };

        let rest = steps
            .take_while(|d| match direction {
                TrendDirection::Up => *d > 0.0,
                TrendDirection::Down => *d < 0.0,
            })
            .count();

        Some((direction, rest + 1))
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 11, 18, 15, 0).unwrap() + Duration::seconds(i)
    }

    fn window_of(field: &str, values: &[f64]) -> RollingWindow {
        let mut window = RollingWindow::new("k", DEFAULT_CAPACITY);
        for (i, v) in values.iter().enumerate() {
            window.push(Observation::new("k", ts(i as i64)).with_field(field, *v));
        }
        window
    }

    #[test]
    fn test_window_new() {
        let window = RollingWindow::new("AAPL", 5);
        assert!(window.is_empty());
        assert!(!window.is_full());
        assert_eq!(window.capacity(), 5);
        assert_eq!(window.series_key(), "AAPL");
    }

    #[test]
    fn test_zero_capacity_raised() {
        let mut window = RollingWindow::new("k", 0);
        assert_eq!(window.capacity(), 1);
        window.push(Observation::new("k", ts(0)).with_field("x", 1.0));
        window.push(Observation::new("k", ts(1)).with_field("x", 2.0));
        assert_eq!(window.len(), 1);
        assert_eq!(window.latest().unwrap().field("x"), Some(2.0));
    }

    #[test]
    fn test_len_tracks_pushes() {
        let mut window = RollingWindow::new("k", 5);
        for i in 0..8 {
            window.push(Observation::new("k", ts(i)).with_field("x", i as f64));
            assert_eq!(window.len(), (i as usize + 1).min(5));
            assert_eq!(window.is_full(), i >= 4);
        }
    }

    #[test]
    fn test_fifo_eviction() {
        let window = window_of("x", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(window.values("x").unwrap(), vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(window.iter().next().unwrap().timestamp, ts(1));
    }

    #[test]
    fn test_range_requires_full_window() {
        let window = window_of("calories_burned", &[10.0, 10.1, 9.95]);
        assert_eq!(window.range_of("calories_burned"), None);
    }

    #[test]
    fn test_range_of() {
        let window = window_of("calories_burned", &[10.0, 10.1, 9.95, 10.05, 10.0]);
        assert_relative_eq!(
            window.range_of("calories_burned").unwrap(),
            0.15,
            epsilon = 1e-9
        );

        let window = window_of("calories_burned", &[10.0, 10.5, 9.5, 10.3, 9.7]);
        assert_relative_eq!(
            window.range_of("calories_burned").unwrap(),
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_missing_field_is_not_available() {
        let mut window = window_of("price", &[1.0, 2.0, 3.0, 4.0]);
        window.push(Observation::new("k", ts(9)).with_field("volume", 10.0));
        assert!(window.is_full());
        assert_eq!(window.range_of("price"), None);
        assert_eq!(window.mean("price"), None);
        assert_eq!(window.latest_delta("price"), None);
    }

    #[test]
    fn test_latest_delta() {
        let window = window_of("price", &[100.0]);
        assert_eq!(window.latest_delta("price"), None);

        let window = window_of("price", &[100.0, 101.5, 99.0]);
        assert_relative_eq!(window.latest_delta("price").unwrap(), -2.5);
    }

    #[test]
    fn test_mean_and_stddev() {
        let window = window_of("x", &[2.0, 4.0, 4.0, 4.0, 6.0]);
        assert_relative_eq!(window.mean("x").unwrap(), 4.0);
        assert_relative_eq!(window.stddev("x").unwrap(), 2.0_f64.sqrt());

        let single = window_of("x", &[2.0]);
        assert_relative_eq!(single.mean("x").unwrap(), 2.0);
        assert_eq!(single.stddev("x"), None);
    }

    #[test]
    fn test_trailing_stats() {
        let window = window_of("price", &[100.0, 102.0, 100.0, 102.0, 120.0]);
        let stats = window.trailing_stats("price").unwrap();
        assert_relative_eq!(stats.latest, 120.0);
        assert_relative_eq!(stats.mean, 101.0);
        assert_relative_eq!(stats.deviation(), 19.0);
        assert!(stats.stddev > 1.0 && stats.stddev < 1.2);

        let partial = window_of("price", &[100.0, 102.0]);
        assert!(partial.trailing_stats("price").is_none());
    }

    #[test]
    fn test_monotonic_run() {
        let window = window_of("price", &[5.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(window.monotonic_run("price"), Some((TrendDirection::Up, 3)));

        let window = window_of("price", &[5.0, 4.0, 3.0, 2.0, 1.0]);
        assert_eq!(
            window.monotonic_run("price"),
            Some((TrendDirection::Down, 4))
        );

        let window = window_of("price", &[1.0, 2.0, 3.0, 3.0]);
        assert_eq!(window.monotonic_run("price"), None);

        let window = window_of("price", &[1.0, 2.0, 2.0, 3.0]);
        assert_eq!(window.monotonic_run("price"), Some((TrendDirection::Up, 1)));
    }

    #[test]
    fn test_contains_timestamp() {
        let window = window_of("x", &[1.0, 2.0]);
        assert!(window.contains_timestamp(ts(1)));
        assert!(!window.contains_timestamp(ts(7)));
        assert_eq!(window.last_updated(), Some(ts(1)));
    }
}
