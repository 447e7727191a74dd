// Pulsewatch Monitor - Partition consumer
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Runs one stream processor per topic partition.
//!
//! Each partition gets its own blocking worker, window store and committed
//! offset, so every series key is handled by exactly one worker. Alerts are
//! logged through tracing and counted in Prometheus.

use crate::error::MonitorError;
use crate::metrics::{record_alert, record_progress, ACTIVE_WORKERS};
use pulsewatch::{
    Alert, MonitorConfig, ProcessorMetrics, SeriesKind, Shutdown, Sink, StreamProcessor,
};
use pulsewatch_feed::{read_partition_count, FeedError, TopicReader};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Consumer settings.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub data_dir: PathBuf,
    pub topic: String,
    pub group: String,
    pub partitions: u32,
    pub kind: SeriesKind,
    pub monitor: MonitorConfig,
    /// Wait for new records at end of log instead of stopping.
    pub follow: bool,
    pub poll_interval: Duration,
}

/// Shared consumer state, read by the status endpoint.
#[derive(Debug, Default)]
pub struct ConsumerState {
    pub running: AtomicBool,
    pub active_workers: AtomicUsize,
    pub records_committed: AtomicU64,
    pub decode_errors: AtomicU64,
    pub alerts_emitted: AtomicU64,
}

/// Point-in-time view of [`ConsumerState`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConsumerStatus {
    pub running: bool,
    pub active_workers: usize,
    pub records_committed: u64,
    pub decode_errors: u64,
    pub alerts_emitted: u64,
}

impl ConsumerState {
    pub fn status(&self) -> ConsumerStatus {
        ConsumerStatus {
            running: self.running.load(Ordering::SeqCst),
            active_workers: self.active_workers.load(Ordering::SeqCst),
            records_committed: self.records_committed.load(Ordering::SeqCst),
            decode_errors: self.decode_errors.load(Ordering::SeqCst),
            alerts_emitted: self.alerts_emitted.load(Ordering::SeqCst),
        }
    }
}

/// Logs each alert and counts it by kind and series.
pub struct MonitorSink {
    state: Arc<ConsumerState>,
}

impl MonitorSink {
    pub fn new(state: Arc<ConsumerState>) -> Self {
        Self { state }
    }
}

impl Sink for MonitorSink {
    fn emit(&mut self, alert: Alert) {
        record_alert(alert.kind, &alert.series_key);
        self.state.alerts_emitted.fetch_add(1, Ordering::SeqCst);
        match alert.to_json() {
            Ok(json) => info!(
                target: "pulsewatch::alert",
                kind = alert.kind.as_str(),
                series = %alert.series_key,
                "{}",
                json
            ),
            Err(e) => error!("Cannot serialize alert for {}: {}", alert.series_key, e),
        }
    }
}

/// Run every partition worker until the logs end (without follow) or
/// shutdown is triggered.
///
/// The first worker failure triggers shutdown for the others and is returned.
pub async fn run_consumer(
    config: ConsumerConfig,
    state: Arc<ConsumerState>,
    shutdown: Shutdown,
) -> Result<Vec<ProcessorMetrics>, MonitorError> {
    info!(
        "Consuming {} records from '{}' ({} partitions, group '{}')",
        config.kind, config.topic, config.partitions, config.group
    );

    match read_partition_count(&config.data_dir, &config.topic)? {
        Some(count) if count != config.partitions => {
            return Err(FeedError::InvalidConfig(format!(
                "topic '{}' has {} partitions, consumer configured for {}",
                config.topic, count, config.partitions
            ))
            .into());
        }
        Some(_) => {}
        None => warn!(
            "Topic '{}' not created by a producer yet, assuming {} partitions",
            config.topic, config.partitions
        ),
    }

    let mut workers = JoinSet::new();
    for partition in 0..config.partitions {
        let reader = TopicReader::open(
            &config.data_dir,
            &config.topic,
            partition,
            &config.group,
            shutdown.clone(),
        )?
        .follow(config.follow)
        .with_poll_interval(config.poll_interval);

        let worker = PartitionWorker {
            topic: config.topic.clone(),
            partition,
            kind: config.kind,
            monitor: config.monitor.clone(),
            state: Arc::clone(&state),
            shutdown: shutdown.clone(),
        };
        workers.spawn_blocking(move || (partition, worker.run(reader)));
    }
    state.running.store(true, Ordering::SeqCst);

    // Workers are joined in completion order so a failed partition is seen
    // while the others are still following their logs.
    let mut summaries = Vec::with_capacity(config.partitions as usize);
    let mut first_error = None;
    while let Some(joined) = workers.join_next().await {
        let failure = match joined {
            Ok((partition, Ok(metrics))) => {
                info!("Partition {} done: {}", partition, metrics.report());
                summaries.push(metrics);
                continue;
            }
            Ok((partition, Err(e))) => {
                error!("Partition {} stopped: {}", partition, e);
                MonitorError::Source(e)
            }
            Err(e) => {
                error!("Partition worker crashed: {}", e);
                MonitorError::Worker(e)
            }
        };
        state.running.store(false, Ordering::SeqCst);
        shutdown.trigger();
        first_error.get_or_insert(failure);
    }
    state.running.store(false, Ordering::SeqCst);

    match first_error {
        Some(e) => Err(e),
        None => Ok(summaries),
    }
}

struct PartitionWorker {
    topic: String,
    partition: u32,
    kind: SeriesKind,
    monitor: MonitorConfig,
    state: Arc<ConsumerState>,
    shutdown: Shutdown,
}

impl PartitionWorker {
    fn run(self, mut reader: TopicReader) -> Result<ProcessorMetrics, pulsewatch::SourceError> {
        let sink = MonitorSink::new(Arc::clone(&self.state));
        let mut processor =
            StreamProcessor::new(self.kind, &self.monitor, sink).with_shutdown(self.shutdown);

        ACTIVE_WORKERS.inc();
        self.state.active_workers.fetch_add(1, Ordering::SeqCst);

        let result = processor.run_observed(&mut reader, |progress| {
            record_progress(&self.topic, self.partition, &progress);
            self.state.records_committed.fetch_add(1, Ordering::SeqCst);
            if progress.outcome == pulsewatch::RecordOutcome::DecodeFailed {
                self.state.decode_errors.fetch_add(1, Ordering::SeqCst);
            }
        });

        ACTIVE_WORKERS.dec();
        self.state.active_workers.fetch_sub(1, Ordering::SeqCst);

        if let Err(e) = &result {
            warn!("Partition {} reader failed: {}", self.partition, e);
            processor.shutdown_handle().trigger();
        }
        result.map(|()| processor.metrics().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsewatch_feed::{partition_log_path, Publisher, TopicLog};

    fn health_payload(calories: f64, second: u32) -> String {
        format!(
            r#"{{"steps":100,"heart_rate":70,"calories_burned":{},"sleep_hours":7.0,"hydration_liters":1.5,"timestamp":"2025-01-25T10:00:{:02}"}}"#,
            calories, second
        )
    }

    fn consumer_config(data_dir: PathBuf, topic: &str, partitions: u32) -> ConsumerConfig {
        ConsumerConfig {
            data_dir,
            topic: topic.to_string(),
            group: "monitor".to_string(),
            partitions,
            kind: SeriesKind::Health,
            monitor: MonitorConfig::default(),
            follow: false,
            poll_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_monitor_sink_counts_alerts() {
        let state = Arc::new(ConsumerState::default());
        let mut sink = MonitorSink::new(Arc::clone(&state));
        let ts = pulsewatch::parse_timestamp("2025-01-25T10:00:00").unwrap();
        sink.emit(Alert::stall("sink-test", "calories_burned", 0.0, 0.2, 5, ts));
        assert_eq!(state.status().alerts_emitted, 1);
    }

    #[tokio::test]
    async fn test_consumer_drains_every_partition() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = TopicLog::open(tmp.path(), "consumer_drain", 2).unwrap();
        for key in ["alice", "bob"] {
            for i in 0..5 {
                log.publish(Some(key), health_payload(10.0, i).as_bytes())
                    .unwrap();
            }
        }
        log.publish(Some("alice"), b"not json").unwrap();
        log.flush().unwrap();

        let state = Arc::new(ConsumerState::default());
        let summaries = run_consumer(
            consumer_config(tmp.path().to_path_buf(), "consumer_drain", 2),
            Arc::clone(&state),
            Shutdown::new(),
        )
        .await
        .unwrap();

        assert_eq!(summaries.len(), 2);
        let status = state.status();
        assert!(!status.running);
        assert_eq!(status.active_workers, 0);
        assert_eq!(status.records_committed, 11);
        assert_eq!(status.decode_errors, 1);
        // One flat full window per key.
        assert_eq!(status.alerts_emitted, 2);
    }

    #[tokio::test]
    async fn test_failed_partition_stops_followers() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TopicLog::open(tmp.path(), "consumer_corrupt", 2).unwrap();
        let path = partition_log_path(log.dir(), 1);
        std::fs::write(&path, "garbage\n").unwrap();

        let mut config = consumer_config(tmp.path().to_path_buf(), "consumer_corrupt", 2);
        config.follow = true;
        let shutdown = Shutdown::new();
        let state = Arc::new(ConsumerState::default());

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_consumer(config, Arc::clone(&state), shutdown.clone()),
        )
        .await
        .expect("consumer should stop after a partition fails");

        assert!(matches!(result, Err(MonitorError::Source(_))));
        assert!(shutdown.is_triggered());
        let status = state.status();
        assert!(!status.running);
        assert_eq!(status.active_workers, 0);
    }

    #[tokio::test]
    async fn test_partition_count_mismatch_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        TopicLog::open(tmp.path(), "consumer_mismatch", 4).unwrap();

        let result = run_consumer(
            consumer_config(tmp.path().to_path_buf(), "consumer_mismatch", 2),
            Arc::new(ConsumerState::default()),
            Shutdown::new(),
        )
        .await;
        assert!(matches!(
            result,
            Err(MonitorError::Feed(FeedError::InvalidConfig(_)))
        ));
    }

    #[tokio::test]
    async fn test_follow_mode_stops_on_shutdown() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = consumer_config(tmp.path().to_path_buf(), "consumer_follow", 1);
        config.follow = true;

        let shutdown = Shutdown::new();
        let state = Arc::new(ConsumerState::default());
        let task = tokio::spawn(run_consumer(config, Arc::clone(&state), shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        let summaries = task.await.unwrap().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(state.status().records_committed, 0);
    }
}
