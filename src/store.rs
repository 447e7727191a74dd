// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Window store: one rolling window per series key.
//!
//! The store owns every window. [`WindowStore::update`] is the only way to
//! mutate one; it creates the window on first sight of a key.

use crate::observation::Observation;
use crate::window::{RollingWindow, DEFAULT_CAPACITY};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Mapping from series key to its rolling window.
#[derive(Debug)]
pub struct WindowStore {
    capacity: usize,
    windows: HashMap<String, RollingWindow>,
    /// Newest observation timestamp seen across all keys.
    high_watermark: Option<DateTime<Utc>>,
}

impl WindowStore {
    /// Create an empty store whose windows hold `capacity` observations.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            windows: HashMap::new(),
            high_watermark: None,
        }
    }

    /// Push `observation` into the window for `series_key`, creating it if
    /// needed, and return the updated window.
    pub fn update(&mut self, series_key: &str, observation: Observation) -> &RollingWindow {
        let ts = observation.timestamp;
        if self.high_watermark.map_or(true, |hw| ts > hw) {
            self.high_watermark = Some(ts);
        }

        let capacity = self.capacity;
        let window = self
            .windows
            .entry(series_key.to_string())
            .or_insert_with(|| RollingWindow::new(series_key, capacity));
        window.push(observation);
        window
    }

    /// Window for `series_key`, if one exists.
    pub fn get(&self, series_key: &str) -> Option<&RollingWindow> {
        self.windows.get(series_key)
    }

    /// Number of tracked series.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tracked series keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.windows.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Newest observation timestamp seen so far.
    pub fn high_watermark(&self) -> Option<DateTime<Utc>> {
        self.high_watermark
    }

    /// Drop windows whose newest observation is more than `max_idle` older
    /// than the newest timestamp seen. Returns the evicted keys.
    ///
    /// Nothing is evicted when the cutoff falls outside the representable
    /// time range.
    pub fn evict_idle(&mut self, max_idle: Duration) -> Vec<String> {
        let Some(cutoff) = self
            .high_watermark
            .and_then(|hw| hw.checked_sub_signed(max_idle))
        else {
            return Vec::new();
        };

        let stale: Vec<String> = self
            .windows
            .iter()
            .filter(|(_, w)| w.last_updated().map_or(true, |ts| ts < cutoff))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &stale {
            self.windows.remove(key);
        }
        stale
    }
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
