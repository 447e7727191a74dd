// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert types emitted by the classifiers.

use crate::window::TrendDirection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// Tracked metric barely moved over the window.
    Stall,
    /// Latest price far from the trailing mean.
    Spike,
    /// Latest volume far from the trailing mean.
    VolumeSurge,
    /// Monotonic run of price changes.
    Trend,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Stall => "STALL",
            AlertKind::Spike => "SPIKE",
            AlertKind::VolumeSurge => "VOLUME_SURGE",
            AlertKind::Trend => "TREND",
        }
    }

    /// All kinds, in declaration order.
    pub fn all() -> [AlertKind; 4] {
        [
            AlertKind::Stall,
            AlertKind::Spike,
            AlertKind::VolumeSurge,
            AlertKind::Trend,
        ]
    }
}

/// Observed values and the threshold that triggered an alert.
///
/// Serialized without a tag so the Sink sees a flat mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertDetail {
    /// Range of a field over the full window.
    Range {
        field: String,
        range: f64,
        threshold: f64,
    },
    /// Latest value against trailing mean and deviation.
    Deviation {
        field: String,
        latest: f64,
        mean: f64,
        stddev: f64,
        multiplier: f64,
        /// `multiplier * stddev`, the deviation that was exceeded.
        threshold: f64,
    },
    /// Monotonic run ending at the latest observation.
    Run {
        field: String,
        direction: TrendDirection,
        run_length: usize,
        min_run: usize,
        latest: f64,
    },
}

impl AlertDetail {
    /// Field the alert is about.
    pub fn field(&self) -> &str {
        match self {
            AlertDetail::Range { field, .. }
            | AlertDetail::Deviation { field, .. }
            | AlertDetail::Run { field, .. } => field,
        }
    }

    /// Threshold that was crossed, as a number.
    pub fn threshold(&self) -> f64 {
        match self {
            AlertDetail::Range { threshold, .. } | AlertDetail::Deviation { threshold, .. } => {
                *threshold
            }
            AlertDetail::Run { min_run, .. } => *min_run as f64,
        }
    }
}

/// An alert for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Series the alert is about.
    pub series_key: String,
    /// Alert kind.
    pub kind: AlertKind,
    /// Observed values and threshold.
    pub detail: AlertDetail,
    /// Timestamp of the observation that completed the evaluation.
    pub timestamp: DateTime<Utc>,
    /// Human-readable message.
    pub message: String,
}

impl Alert {
    /// Create a new alert.
    pub fn new(
        series_key: impl Into<String>,
        kind: AlertKind,
        detail: AlertDetail,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            series_key: series_key.into(),
            kind,
            detail,
            timestamp,
            message: message.into(),
        }
    }

    /// Create a stall alert.
    pub fn stall(
        series_key: &str,
        field: &str,
        range: f64,
        threshold: f64,
        window_len: usize,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(
            series_key,
            AlertKind::Stall,
            AlertDetail::Range {
                field: field.to_string(),
                range,
                threshold,
            },
            timestamp,
            format!(
                "{} stalled: range {:.3} <= {:.3} over last {} readings",
                field, range, threshold, window_len
            ),
        )
    }

    /// Create a price spike or volume surge alert.
    pub fn deviation(
        series_key: &str,
        kind: AlertKind,
        field: &str,
        stats: &crate::window::TrailingStats,
        multiplier: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let threshold = multiplier * stats.stddev;
        Self::new(
            series_key,
            kind,
            AlertDetail::Deviation {
                field: field.to_string(),
                latest: stats.latest,
                mean: stats.mean,
                stddev: stats.stddev,
                multiplier,
                threshold,
            },
            timestamp,
            format!(
                "{} {}: {:.2} deviates {:.2} from trailing mean {:.2} (limit {:.2})",
                series_key,
                kind.as_str(),
                stats.latest,
                stats.deviation(),
                stats.mean,
                threshold
            ),
        )
    }

    /// Create a trend alert.
    pub fn trend(
        series_key: &str,
        field: &str,
        direction: TrendDirection,
        run_length: usize,
        min_run: usize,
        latest: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(
            series_key,
            AlertKind::Trend,
            AlertDetail::Run {
                field: field.to_string(),
                direction,
                run_length,
                min_run,
                latest,
            },
            timestamp,
            format!(
                "{} {} trending {} for {} consecutive changes",
                series_key,
                field,
                direction.as_str(),
                run_length
            ),
        )
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
