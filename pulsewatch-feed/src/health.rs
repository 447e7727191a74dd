// Pulsewatch Feed - Event producers and topic log
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Health readings from CSV.
//!
//! Rows carry `steps,heart_rate,calories_burned,sleep_hours,hydration_liters`
//! and no time. Each row is stamped when it is published.

use crate::anomalies::{AnomalyConfig, AnomalyState};
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use pulsewatch::HealthEvent;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRow {
    pub steps: u64,
    pub heart_rate: u32,
    pub calories_burned: f64,
    pub sleep_hours: f64,
    pub hydration_liters: f64,
}

impl HealthRow {
    /// Stamp the row with its publish time.
    pub fn to_event(&self, timestamp: DateTime<Utc>) -> HealthEvent {
        HealthEvent {
            steps: self.steps,
            heart_rate: self.heart_rate,
            calories_burned: self.calories_burned,
            sleep_hours: self.sleep_hours,
            hydration_liters: self.hydration_liters,
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// Read every row of a health CSV file.
pub fn read_health_csv(path: impl AsRef<Path>) -> Result<Vec<HealthRow>> {
    let file = std::fs::File::open(path)?;
    read_health_rows(file)
}

/// Read health rows from any reader. The first line must be the header.
pub fn read_health_rows<R: Read>(reader: R) -> Result<Vec<HealthRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for row in csv_reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Replays health rows as events, optionally looping and with an injected
/// anomaly on `calories_burned`.
#[derive(Debug, Clone)]
pub struct HealthFeed {
    rows: Vec<HealthRow>,
    position: usize,
    loop_rows: bool,
    anomaly: Option<AnomalyConfig>,
    anomaly_state: AnomalyState,
    emitted: usize,
}

impl HealthFeed {
    pub fn new(rows: Vec<HealthRow>) -> Self {
        Self {
            rows,
            position: 0,
            loop_rows: false,
            anomaly: None,
            anomaly_state: AnomalyState::default(),
            emitted: 0,
        }
    }

    /// Start again from the first row after the last one.
    pub fn looping(mut self, loop_rows: bool) -> Self {
        self.loop_rows = loop_rows;
        self
    }

    /// Rewrite `calories_burned` while the anomaly is active.
    pub fn with_anomaly(mut self, anomaly: AnomalyConfig) -> Self {
        self.anomaly = Some(anomaly);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Next event stamped with `timestamp`, or `None` when the rows ran out.
    pub fn next_event(&mut self, timestamp: DateTime<Utc>) -> Option<HealthEvent> {
        if self.position >= self.rows.len() {
            if !self.loop_rows || self.rows.is_empty() {
                return None;
            }
            self.position = 0;
        }

        let mut row = self.rows[self.position].clone();
        self.position += 1;

        if let Some(anomaly) = &self.anomaly {
            if anomaly.is_active(self.emitted) {
                let since = anomaly.samples_since_start(self.emitted);
                row.calories_burned =
                    self.anomaly_state
                        .apply(&anomaly.anomaly_type, row.calories_burned, since);
            }
        }
        self.emitted += 1;

        Some(row.to_event(timestamp))
    }
}
