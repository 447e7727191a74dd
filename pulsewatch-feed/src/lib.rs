// Pulsewatch Feed - Event producers and topic log
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Pulsewatch Feed
//!
//! The publishing side of Pulsewatch:
//!
//! - **Market simulator**: seeded random-walk stock ticks with optional
//!   anomaly injection (spike, stuck, drift)
//! - **Health CSV**: rows of health readings stamped at publish time
//! - **Topic log**: file-backed partitioned append-only log, with a reader
//!   that plugs into the core's [`pulsewatch::RecordSource`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pulsewatch_feed::{MarketSimConfig, MarketSimulator, Publisher, TopicLog};
//!
//! let mut sim = MarketSimulator::new(MarketSimConfig::new().with_seed(42)).unwrap();
//! let mut log = TopicLog::open("data", "stock_prices_topic", 4).unwrap();
//!
//! for _ in 0..100 {
//!     let tick = sim.next_tick(chrono::Utc::now());
//!     let payload = tick.to_json().unwrap();
//!     log.publish(Some(&tick.symbol), payload.as_bytes()).unwrap();
//! }
//! log.flush().unwrap();
//! ```

pub mod anomalies;
pub mod error;
pub mod health;
pub mod market;
pub mod publisher;
pub mod topic;

pub use anomalies::{AnomalyConfig, AnomalyState, AnomalyType};
pub use error::{FeedError, Result};
pub use health::{read_health_csv, read_health_rows, HealthFeed, HealthRow};
pub use market::{InjectedAnomaly, MarketSimConfig, MarketSimulator, TickField, DEFAULT_SYMBOLS};
pub use publisher::{Delivery, MemoryPublisher, Publisher};
pub use topic::{
    offset_path, partition_count_path, partition_log_path, read_partition_count, topic_dir,
    Envelope, TopicLog, TopicReader,
};
