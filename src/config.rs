// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Monitor configuration.
//!
//! Loaded from JSON (all sections optional) and then overridden from the
//! environment. Every tunable threshold lives here rather than in the rules.

use crate::error::ConfigError;
use crate::window::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Master configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Rolling window and store settings.
    pub window: WindowConfig,

    /// Health stall rule.
    pub stall: StallConfig,

    /// Market spike, surge and trend rules.
    pub market: MarketConfig,
}

/// Rolling window and store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Observations kept per series.
    pub capacity: usize,

    /// Skip an observation whose timestamp is already in its window.
    pub dedupe_timestamps: bool,

    /// Evict windows that stopped receiving data (default: never).
    pub idle_eviction: Option<IdleEvictionConfig>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            dedupe_timestamps: false,
            idle_eviction: None,
        }
    }
}

/// Longest accepted idle period (about 100 years).
pub const MAX_IDLE_SECS: u64 = 3_153_600_000;

/// Idle series eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleEvictionConfig {
    /// A window whose newest observation is older than this (relative to the
    /// newest timestamp seen by the store) is dropped. At most
    /// [`MAX_IDLE_SECS`].
    pub max_idle_secs: u64,

    /// Run the sweep every N processed records.
    pub sweep_every_records: u64,
}

impl Default for IdleEvictionConfig {
    fn default() -> Self {
        Self {
            max_idle_secs: 3600,
            sweep_every_records: 1000,
        }
    }
}

/// Stall rule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StallConfig {
    /// Field whose range is checked.
    pub field: String,

    /// Range at or below this value is a stall (inclusive).
    pub threshold: f64,
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            field: "calories_burned".to_string(),
            threshold: 0.2,
        }
    }
}

/// Market rules configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Price field name.
    pub price_field: String,

    /// Volume field name.
    pub volume_field: String,

    /// Price spike when |latest - trailing mean| > multiplier * trailing stddev.
    pub spike_multiplier: f64,

    /// Volume surge when |latest - trailing mean| > multiplier * trailing stddev.
    pub surge_multiplier: f64,

    /// Minimum consecutive price changes in one direction for a trend.
    pub trend_min_run: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            price_field: "price".to_string(),
            volume_field: "volume".to_string(),
            spike_multiplier: 2.0,
            surge_multiplier: 2.0,
            trend_min_run: 3,
        }
    }
}

impl MonitorConfig {
    /// Parse from JSON. Missing sections and fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let capacity_vars = ["ROLLING_WINDOW_SIZE", "HEALTH_ROLLING_WINDOW_SIZE"];
        if let Some(v) = parse_first(&lookup, &capacity_vars)? {
            self.window.capacity = v;
        }
        let threshold_vars = ["HEALTH_STALL_THRESHOLD", "HEALTH_STALL_THRESHOLD_F"];
        if let Some(v) = parse_first(&lookup, &threshold_vars)? {
            self.stall.threshold = v;
        }
        if let Some(v) = lookup("HEALTH_STALL_FIELD") {
            self.stall.field = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKET_SPIKE_MULTIPLIER")? {
            self.market.spike_multiplier = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKET_SURGE_MULTIPLIER")? {
            self.market.surge_multiplier = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKET_TREND_MIN_RUN")? {
            self.market.trend_min_run = v;
        }
        if let Some(v) = parse_var::<_, bool>(&lookup, "DEDUPE_TIMESTAMPS")? {
            self.window.dedupe_timestamps = v;
        }
        self.validate()
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.capacity == 0 {
            return Err(invalid("window.capacity", "must be at least 1"));
        }
        if let Some(eviction) = &self.window.idle_eviction {
            if eviction.sweep_every_records == 0 {
                return Err(invalid(
                    "window.idle_eviction.sweep_every_records",
                    "must be at least 1",
                ));
            }
            if eviction.max_idle_secs > MAX_IDLE_SECS {
                return Err(invalid(
                    "window.idle_eviction.max_idle_secs",
                    &format!("must be at most {}", MAX_IDLE_SECS),
                ));
            }
        }
        if !(self.stall.threshold >= 0.0) {
            return Err(invalid("stall.threshold", "must be a non-negative number"));
        }
        if !(self.market.spike_multiplier > 0.0) {
            return Err(invalid("market.spike_multiplier", "must be positive"));
        }
        if !(self.market.surge_multiplier > 0.0) {
            return Err(invalid("market.surge_multiplier", "must be positive"));
        }
        if self.market.trend_min_run == 0 {
            return Err(invalid("market.trend_min_run", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(setting: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        setting,
        reason: reason.to_string(),
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
    }
}

/// First of `vars` that is set wins.
fn parse_first<F, T>(lookup: &F, vars: &[&'static str]) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    for var in vars {
        if let Some(v) = parse_var(lookup, *var)? {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.window.capacity, 5);
        assert!(!config.window.dedupe_timestamps);
        assert!(config.window.idle_eviction.is_none());
        assert_eq!(config.stall.field, "calories_burned");
        assert!((config.stall.threshold - 0.2).abs() < 1e-12);
        assert_eq!(config.market.trend_min_run, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = MonitorConfig::from_json(r#"{"stall": {"threshold": 0.5}}"#).unwrap();
        assert!((config.stall.threshold - 0.5).abs() < 1e-12);
        assert_eq!(config.stall.field, "calories_burned");
        assert_eq!(config.window.capacity, 5);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = MonitorConfig::default();
        config.window.idle_eviction = Some(IdleEvictionConfig::default());
        let json = config.to_json_pretty().unwrap();
        let parsed = MonitorConfig::from_json(&json).unwrap();
        assert_eq!(parsed.window.idle_eviction, config.window.idle_eviction);
        assert_eq!(parsed.market.price_field, "price");
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"window": {{"capacity": 8}}}}"#).unwrap();
        file.flush().unwrap();

        let config = MonitorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.window.capacity, 8);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(MonitorConfig::from_json(r#"{"window": {"capacity": 0}}"#).is_err());
        assert!(MonitorConfig::from_json(r#"{"stall": {"threshold": -1.0}}"#).is_err());
        assert!(MonitorConfig::from_json(r#"{"market": {"spike_multiplier": 0.0}}"#).is_err());
        assert!(MonitorConfig::from_json(r#"{"market": {"trend_min_run": 0}}"#).is_err());
    }

    #[test]
    fn test_idle_eviction_bounds() {
        let json = |secs: u64| {
            format!(
                r#"{{"window": {{"idle_eviction": {{"max_idle_secs": {}, "sweep_every_records": 1}}}}}}"#,
                secs
            )
        };
        assert!(MonitorConfig::from_json(&json(MAX_IDLE_SECS)).is_ok());
        let err = MonitorConfig::from_json(&json(20_000_000_000_000)).unwrap_err();
        assert!(err.to_string().contains("max_idle_secs"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = MonitorConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("ROLLING_WINDOW_SIZE", "7"),
                ("HEALTH_STALL_THRESHOLD", " 0.35 "),
                ("HEALTH_STALL_FIELD", "heart_rate"),
                ("MARKET_SPIKE_MULTIPLIER", "3"),
                ("DEDUPE_TIMESTAMPS", "true"),
            ]))
            .unwrap();

        assert_eq!(config.window.capacity, 7);
        assert!((config.stall.threshold - 0.35).abs() < 1e-12);
        assert_eq!(config.stall.field, "heart_rate");
        assert!((config.market.spike_multiplier - 3.0).abs() < 1e-12);
        assert!(config.window.dedupe_timestamps);
    }

    #[test]
    fn test_env_aliases() {
        let mut config = MonitorConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("HEALTH_ROLLING_WINDOW_SIZE", "6"),
                ("HEALTH_STALL_THRESHOLD_F", "0.25"),
            ]))
            .unwrap();
        assert_eq!(config.window.capacity, 6);
        assert!((config.stall.threshold - 0.25).abs() < 1e-12);

        config
            .apply_overrides(lookup_from(&[
                ("ROLLING_WINDOW_SIZE", "4"),
                ("HEALTH_ROLLING_WINDOW_SIZE", "9"),
            ]))
            .unwrap();
        assert_eq!(config.window.capacity, 4);
    }

    #[test]
    fn test_env_override_parse_error() {
        let mut config = MonitorConfig::default();
        let err = config
            .apply_overrides(lookup_from(&[("ROLLING_WINDOW_SIZE", "five")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "ROLLING_WINDOW_SIZE",
                ..
            }
        ));
    }
}
