// Pulsewatch Feed - Event producers and topic log
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Simulated stock ticks.
//!
//! Each symbol follows its own random walk. A tick picks a symbol at random,
//! moves its price, draws a volume and reports the change from the previous
//! tick of the same symbol.

use crate::anomalies::{AnomalyConfig, AnomalyState};
use crate::error::{FeedError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use pulsewatch::MarketEvent;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default simulated symbols.
pub const DEFAULT_SYMBOLS: [&str; 4] = ["AAPL", "GOOGL", "AMZN", "MSFT"];

/// Which field of a tick an anomaly rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickField {
    Price,
    Volume,
}

/// Anomaly bound to one symbol and field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectedAnomaly {
    pub symbol: String,
    pub field: TickField,
    /// Sample indices count ticks of this symbol only.
    pub anomaly: AnomalyConfig,
}

/// Simulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSimConfig {
    /// Symbols to simulate.
    pub symbols: Vec<String>,
    /// Opening prices are drawn uniformly from this range.
    pub price_range: (f64, f64),
    /// Standard deviation of the per-tick relative price move.
    pub volatility: f64,
    /// Mean volume per tick.
    pub base_volume: f64,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Anomalies to inject.
    #[serde(default)]
    pub anomalies: Vec<InjectedAnomaly>,
}

impl Default for MarketSimConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            price_range: (100.0, 1500.0),
            volatility: 0.002,
            base_volume: 1000.0,
            seed: None,
            anomalies: Vec::new(),
        }
    }
}

impl MarketSimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_anomaly(
        mut self,
        symbol: impl Into<String>,
        field: TickField,
        anomaly: AnomalyConfig,
    ) -> Self {
        self.anomalies.push(InjectedAnomaly {
            symbol: symbol.into(),
            field,
            anomaly,
        });
        self
    }
}

#[derive(Debug, Clone)]
struct SymbolState {
    /// Underlying walk, untouched by anomalies.
    price: f64,
    /// Last published price, for percent change.
    last_reported: f64,
    ticks: usize,
    price_anomaly: AnomalyState,
    volume_anomaly: AnomalyState,
}

impl SymbolState {
    fn opening(price: f64) -> Self {
        Self {
            price,
            last_reported: price,
            ticks: 0,
            price_anomaly: AnomalyState::default(),
            volume_anomaly: AnomalyState::default(),
        }
    }
}

/// Random-walk tick generator.
pub struct MarketSimulator {
    config: MarketSimConfig,
    rng: StdRng,
    move_dist: Normal<f64>,
    volume_dist: Normal<f64>,
    state: HashMap<String, SymbolState>,
}

impl MarketSimulator {
    pub fn new(config: MarketSimConfig) -> Result<Self> {
        if config.symbols.is_empty() {
            return Err(FeedError::InvalidConfig("no symbols to simulate".into()));
        }
        let (low, high) = config.price_range;
        if !(low > 0.0 && high > low) {
            return Err(FeedError::InvalidConfig(format!(
                "invalid price range {}..{}",
                low, high
            )));
        }
        let move_dist = Normal::new(0.0, config.volatility)
            .map_err(|e| FeedError::InvalidConfig(format!("volatility: {}", e)))?;
        let volume_dist = Normal::new(config.base_volume, config.base_volume * 0.1)
            .map_err(|e| FeedError::InvalidConfig(format!("base volume: {}", e)))?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let state = config
            .symbols
            .iter()
            .map(|symbol| (symbol.clone(), SymbolState::opening(rng.gen_range(low..high))))
            .collect();

        Ok(Self {
            config,
            rng,
            move_dist,
            volume_dist,
            state,
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    /// Next tick for a randomly chosen symbol.
    pub fn next_tick(&mut self, timestamp: DateTime<Utc>) -> MarketEvent {
        let idx = self.rng.gen_range(0..self.config.symbols.len());
        let symbol = self.config.symbols[idx].clone();
        self.tick_for(&symbol, timestamp)
    }

    /// Next tick for `symbol`. Unknown symbols start a new walk.
    pub fn tick_for(&mut self, symbol: &str, timestamp: DateTime<Utc>) -> MarketEvent {
        let (low, high) = self.config.price_range;
        let step = self.move_dist.sample(&mut self.rng);
        let mut volume = self.volume_dist.sample(&mut self.rng).max(1.0);

        let rng = &mut self.rng;
        let state = self
            .state
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState::opening(rng.gen_range(low..high)));

        state.price = (state.price * (1.0 + step)).max(0.01);
        let mut price = state.price;

        for injected in self.config.anomalies.iter().filter(|a| a.symbol == symbol) {
            let cfg = &injected.anomaly;
            if !cfg.is_active(state.ticks) {
                continue;
            }
            let since = cfg.samples_since_start(state.ticks);
            match injected.field {
                TickField::Price => {
                    price = state.price_anomaly.apply(&cfg.anomaly_type, price, since);
                }
                TickField::Volume => {
                    volume = state.volume_anomaly.apply(&cfg.anomaly_type, volume, since);
                }
            }
        }
        state.ticks += 1;

        let price = round2(price.max(0.01));
        let previous = state.last_reported;
        state.last_reported = price;

        MarketEvent {
            symbol: symbol.to_string(),
            price,
            volume: Some(volume.max(0.0).round() as u64),
            percent_change: Some(round2((price - previous) / previous * 100.0)),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomalies::AnomalyType;
    use chrono::{Duration, TimeZone};
    use pulsewatch::{MarketDecoder, RecordDecoder};

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 11, 18, 0, 0).unwrap() + Duration::seconds(i)
    }

    #[test]
    fn test_seeded_reproducible() {
        let config = MarketSimConfig::new().with_seed(42);
        let mut a = MarketSimulator::new(config.clone()).unwrap();
        let mut b = MarketSimulator::new(config).unwrap();
        for i in 0..50 {
            assert_eq!(a.next_tick(ts(i)), b.next_tick(ts(i)));
        }
    }

    #[test]
    fn test_ticks_decode() {
        let mut sim = MarketSimulator::new(MarketSimConfig::new().with_seed(1)).unwrap();
        for i in 0..20 {
            let event = sim.next_tick(ts(i));
            assert!(DEFAULT_SYMBOLS.contains(&event.symbol.as_str()));
            assert!(event.price > 0.0);
            let obs = MarketDecoder::new()
                .decode(None, event.to_json().unwrap().as_bytes())
                .unwrap();
            assert_eq!(obs.timestamp, ts(i));
            assert!(obs.has_field("volume"));
        }
    }

    #[test]
    fn test_invalid_config() {
        let empty: Vec<String> = Vec::new();
        assert!(MarketSimulator::new(MarketSimConfig::new().with_symbols(empty)).is_err());
        assert!(MarketSimulator::new(MarketSimConfig::new().with_volatility(-1.0)).is_err());
    }

    #[test]
    fn test_spike_injection() {
        let config = MarketSimConfig::new()
            .with_symbols(["AAPL"])
            .with_seed(3)
            .with_anomaly(
                "AAPL",
                TickField::Price,
                AnomalyConfig::new(AnomalyType::spike(0.5), 5),
            );
        let mut sim = MarketSimulator::new(config).unwrap();
        let prices: Vec<f64> = (0..7).map(|i| sim.tick_for("AAPL", ts(i)).price).collect();

        assert!(prices[5] > prices[4] * 1.4);
        assert!(prices[6] < prices[5] * 0.8);
    }

    #[test]
    fn test_stuck_volume() {
        let config = MarketSimConfig::new()
            .with_symbols(["MSFT"])
            .with_seed(9)
            .with_anomaly(
                "MSFT",
                TickField::Volume,
                AnomalyConfig::new(AnomalyType::Stuck, 2).with_duration(3),
            );
        let mut sim = MarketSimulator::new(config).unwrap();
        let volumes: Vec<Option<u64>> = (0..5).map(|i| sim.tick_for("MSFT", ts(i)).volume).collect();
        assert_eq!(volumes[2], volumes[3]);
        assert_eq!(volumes[3], volumes[4]);
    }
}
