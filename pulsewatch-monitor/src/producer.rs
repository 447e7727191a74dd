// Pulsewatch Monitor - Producer loop
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Publishes simulated market ticks or health rows at a fixed interval.

use crate::error::MonitorError;
use crate::metrics::record_published;
use chrono::{DateTime, Utc};
use pulsewatch::Shutdown;
use pulsewatch_feed::{HealthFeed, MarketSimulator, Publisher};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Where published events come from.
pub enum EventFeed {
    /// Random-walk ticks, keyed by symbol.
    Market(MarketSimulator),
    /// CSV rows, all under one subject key.
    Health { feed: HealthFeed, key: String },
}

impl EventFeed {
    /// Next `(key, payload)` stamped with `timestamp`, or `None` when the
    /// feed ran out.
    pub fn next_record(
        &mut self,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<(String, String)>, MonitorError> {
        match self {
            EventFeed::Market(sim) => {
                let tick = sim.next_tick(timestamp);
                let payload = tick.to_json()?;
                Ok(Some((tick.symbol, payload)))
            }
            EventFeed::Health { feed, key } => match feed.next_event(timestamp) {
                Some(event) => Ok(Some((key.clone(), event.to_json()?))),
                None => Ok(None),
            },
        }
    }
}

/// Producer loop settings.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub topic: String,
    pub interval: Duration,
    /// Stop after this many records. `None` runs until shutdown.
    pub count: Option<u64>,
}

/// Publish until the feed ends, `count` is reached or shutdown is triggered.
/// Returns the number of records published.
pub async fn run_producer<P: Publisher>(
    config: &ProducerConfig,
    mut feed: EventFeed,
    publisher: &mut P,
    shutdown: &Shutdown,
) -> Result<u64, MonitorError> {
    info!(
        "Producing to topic '{}' every {:?}",
        config.topic, config.interval
    );

    let mut published = 0u64;
    while !shutdown.is_triggered() {
        if config.count.map_or(false, |limit| published >= limit) {
            break;
        }
        let Some((key, payload)) = feed.next_record(Utc::now())? else {
            info!("Feed exhausted");
            break;
        };

        let delivery = publisher.publish(Some(&key), payload.as_bytes())?;
        publisher.flush()?;
        record_published(&config.topic, delivery.partition);
        published += 1;
        debug!(
            "Published {} to partition {} offset {}: {}",
            key, delivery.partition, delivery.offset, payload
        );

        if !config.interval.is_zero() {
            sleep(config.interval).await;
        }
    }

    info!("Published {} records to '{}'", published, config.topic);
    Ok(published)
}
