//! # Pulsewatch - Sliding-window anomaly detection
//!
//! Keeps a short rolling window per series key over a stream of keyed
//! records and flags anomalies as each record arrives.
//!
//! ## Key Features
//!
//! - **Rolling windows**: last N observations per key, FIFO eviction
//! - **Pluggable rules**: stall detection for health readings; spike,
//!   volume surge and trend detection for stock ticks
//! - **At-least-once loop**: offsets are committed after a record is handled
//! - **Key sharding**: stable key-to-partition hashing, one writer per window
//!
//! ## Quick Start
//!
//! ```rust
//! use pulsewatch::{MemorySink, MemorySource, MonitorConfig, SeriesKind, StreamProcessor};
//!
//! let mut source = MemorySource::new();
//! for (i, calories) in [10.0, 10.1, 9.95, 10.05, 10.0].iter().enumerate() {
//!     let payload = format!(
//!         r#"{{"steps":100,"heart_rate":70,"calories_burned":{},"sleep_hours":7.0,"hydration_liters":1.5,"timestamp":"2025-01-25T10:00:0{}"}}"#,
//!         calories, i
//!     );
//!     source.push(None, payload);
//! }
//!
//! let config = MonitorConfig::default();
//! let mut processor = StreamProcessor::new(SeriesKind::Health, &config, MemorySink::new());
//! processor.run(&mut source).unwrap();
//!
//! assert_eq!(processor.sink().len(), 1);
//! assert_eq!(processor.sink().alerts()[0].kind.as_str(), "STALL");
//! ```
//!
//! ## Modules
//!
//! - [`window`]: Rolling window and its statistics
//! - [`store`]: Window per series key
//! - [`classifier`]: Stall and market rule sets
//! - [`decoder`]: Market and health wire formats
//! - [`processor`]: Record loop, sources and shutdown
//! - [`sink`]: Alert sinks
//! - [`metrics`]: Processor counters

// Modules
pub mod alert;
pub mod classifier;
pub mod config;
pub mod decoder;
pub mod error;
pub mod metrics;
pub mod observation;
pub mod partition;
pub mod processor;
pub mod sink;
pub mod store;
pub mod window;

// Re-exports for convenient access
pub use alert::{Alert, AlertDetail, AlertKind};
pub use classifier::{Classifier, MarketTrendRule, SeriesKind, StallRule};
pub use config::{
    IdleEvictionConfig, MarketConfig, MonitorConfig, StallConfig, WindowConfig, MAX_IDLE_SECS,
};
pub use decoder::{
    parse_timestamp, HealthDecoder, HealthEvent, MarketDecoder, MarketEvent, RecordDecoder,
    DEFAULT_HEALTH_KEY,
};
pub use error::{ConfigError, DecodeError, PulsewatchError, Result, SourceError};
pub use metrics::ProcessorMetrics;
pub use observation::Observation;
pub use partition::partition_for;
pub use processor::{
    MemorySource, Progress, RawRecord, RecordOutcome, RecordSource, Shutdown, StreamProcessor,
};
pub use sink::{LogSink, MemorySink, Sink};
pub use store::WindowStore;
pub use window::{RollingWindow, TrailingStats, TrendDirection, DEFAULT_CAPACITY};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_market_pipeline() {
        let mut source = MemorySource::new();
        for (i, price) in [100.0, 100.5, 101.0, 101.5, 110.0].iter().enumerate() {
            let event = MarketEvent {
                symbol: "AAPL".to_string(),
                price: *price,
                volume: Some(1000),
                percent_change: None,
                timestamp: format!("2025-01-11T18:15:0{}Z", i),
            };
            source.push(Some("AAPL"), event.to_json().unwrap());
        }

        let config = MonitorConfig::default();
        let mut processor = StreamProcessor::new(SeriesKind::Market, &config, MemorySink::new());
        processor.run(&mut source).unwrap();

        let kinds: Vec<AlertKind> = processor.sink().alerts().iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::Spike, AlertKind::Trend]);
    }
}
