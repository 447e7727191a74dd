// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Anomaly classifiers.
//!
//! A classifier looks at one rolling window and returns zero or more alerts.
//! Classifiers hold only their thresholds: evaluating the same window twice
//! gives the same alerts. A window that is not full yields no alerts.
//!
//! The strategy is picked per series type through [`SeriesKind`], which also
//! selects the matching record decoder.

mod market;
mod stall;

pub use market::MarketTrendRule;
pub use stall::StallRule;

use crate::alert::Alert;
use crate::config::MonitorConfig;
use crate::decoder::{HealthDecoder, MarketDecoder, RecordDecoder, DEFAULT_HEALTH_KEY};
use crate::window::RollingWindow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trait for window classifiers.
pub trait Classifier: Send {
    /// Evaluate a window. Must not depend on anything but the window and the
    /// classifier's own configuration.
    fn evaluate(&self, window: &RollingWindow) -> Vec<Alert>;

    /// Short name for logging.
    fn name(&self) -> &str;
}

/// Series type, selecting decoder and classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    /// Stock ticks: spike, volume surge and trend.
    Market,
    /// Health readings: stall.
    Health,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::Market => "market",
            SeriesKind::Health => "health",
        }
    }

    /// Decoder for this series type.
    pub fn decoder(&self) -> Box<dyn RecordDecoder> {
        match self {
            SeriesKind::Market => Box::new(MarketDecoder::new()),
            SeriesKind::Health => Box::new(HealthDecoder::new(DEFAULT_HEALTH_KEY)),
        }
    }

    /// Classifier for this series type.
    pub fn classifier(&self, config: &MonitorConfig) -> Box<dyn Classifier> {
        match self {
            SeriesKind::Market => Box::new(MarketTrendRule::from_config(&config.market)),
            SeriesKind::Health => Box::new(StallRule::from_config(&config.stall)),
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" | "stock" | "buzz" => Ok(SeriesKind::Market),
            "health" => Ok(SeriesKind::Health),
            other => Err(format!("unknown series kind: {}", other)),
        }
    }
}
