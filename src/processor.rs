// Pulsewatch - Sliding-window anomaly detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Stream processor: the per-record loop.
//!
//! For each raw record: decode, update the window store, classify the
//! updated window, hand alerts to the sink, then commit the record's offset.
//! A record that fails to decode is logged and committed so one bad record
//! cannot stall the stream. Commits happen only after a record is fully
//! handled, which gives at-least-once processing.
//!
//! Shutdown is checked before each decode, never in the middle of an update.

use crate::classifier::{Classifier, SeriesKind};
use crate::config::{MonitorConfig, WindowConfig};
use crate::decoder::RecordDecoder;
use crate::error::SourceError;
use crate::metrics::ProcessorMetrics;
use crate::sink::Sink;
use crate::store::WindowStore;
use chrono::Duration;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One record as delivered by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Position in the source; committed once the record is handled.
    pub offset: u64,
    /// Key attached by the publisher.
    pub key: Option<String>,
    /// Encoded payload.
    pub payload: Vec<u8>,
}

impl RawRecord {
    pub fn new(offset: u64, key: Option<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            key,
            payload: payload.into(),
        }
    }
}

/// Ordered, restartable source of raw records.
pub trait RecordSource {
    /// Next record, blocking until one is available. `Ok(None)` ends the
    /// stream. An error is not recoverable by the processor.
    fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError>;

    /// Mark every record up to and including `offset` as handled.
    fn commit(&mut self, offset: u64) -> Result<(), SourceError>;
}

/// In-memory record source.
#[derive(Debug, Default)]
pub struct MemorySource {
    pending: VecDeque<RawRecord>,
    next_offset: u64,
    committed: Option<u64>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a payload; returns its offset.
    pub fn push(&mut self, key: Option<&str>, payload: impl Into<Vec<u8>>) -> u64 {
        let offset = self.next_offset;
        self.next_offset += 1;
        self.pending
            .push_back(RawRecord::new(offset, key.map(str::to_string), payload));
        offset
    }

    /// Highest committed offset.
    pub fn committed(&self) -> Option<u64> {
        self.committed
    }

    /// Records not yet delivered.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl RecordSource for MemorySource {
    fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        Ok(self.pending.pop_front())
    }

    fn commit(&mut self, offset: u64) -> Result<(), SourceError> {
        self.committed = Some(offset);
        Ok(())
    }
}

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Pushed into a full window and classified.
    Classified { alerts: usize },
    /// Pushed into a window that is not full yet.
    NotReady,
    /// Timestamp already present in the window; skipped.
    Duplicate,
    /// Payload could not be decoded; skipped.
    DecodeFailed,
}

/// Reported after each committed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub offset: u64,
    pub outcome: RecordOutcome,
    /// Windows tracked after the record was handled
    pub windows: usize,
}

/// Drives decode, window update, classification and emission.
pub struct StreamProcessor<S: Sink> {
    decoder: Box<dyn RecordDecoder>,
    classifier: Box<dyn Classifier>,
    store: WindowStore,
    sink: S,
    window_config: WindowConfig,
    metrics: ProcessorMetrics,
    shutdown: Shutdown,
    since_sweep: u64,
}

impl<S: Sink> StreamProcessor<S> {
    /// Processor for a series type, with decoder and classifier chosen from it.
    pub fn new(kind: SeriesKind, config: &MonitorConfig, sink: S) -> Self {
        Self::with_strategies(kind.decoder(), kind.classifier(config), &config.window, sink)
    }

    /// Processor with explicit strategies.
    pub fn with_strategies(
        decoder: Box<dyn RecordDecoder>,
        classifier: Box<dyn Classifier>,
        window_config: &WindowConfig,
        sink: S,
    ) -> Self {
        Self {
            decoder,
            classifier,
            store: WindowStore::new(window_config.capacity),
            sink,
            window_config: window_config.clone(),
            metrics: ProcessorMetrics::new(),
            shutdown: Shutdown::new(),
            since_sweep: 0,
        }
    }

    /// Use an externally owned shutdown flag.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn store(&self) -> &WindowStore {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn metrics(&self) -> &ProcessorMetrics {
        &self.metrics
    }

    /// Handle one record without committing it.
    pub fn process_record(&mut self, record: &RawRecord) -> RecordOutcome {
        self.metrics.records_seen += 1;

        let observation = match self.decoder.decode(record.key.as_deref(), &record.payload) {
            Ok(obs) => obs,
            Err(e) => {
                self.metrics.decode_errors += 1;
                log::warn!(
                    "Skipping {} record at offset {}: {}",
                    self.decoder.name(),
                    record.offset,
                    e
                );
                return RecordOutcome::DecodeFailed;
            }
        };

        let key = observation.series_key.clone();

        if self.window_config.dedupe_timestamps
            && self
                .store
                .get(&key)
                .map_or(false, |w| w.contains_timestamp(observation.timestamp))
        {
            self.metrics.duplicates_skipped += 1;
            log::debug!(
                "Duplicate {} at {} (offset {}), skipped",
                key,
                observation.timestamp.to_rfc3339(),
                record.offset
            );
            return RecordOutcome::Duplicate;
        }

        self.metrics.records_processed += 1;
        let window = self.store.update(&key, observation);

        let outcome = if window.is_full() {
            let alerts = self.classifier.evaluate(window);
            let count = alerts.len();
            for alert in alerts {
                log::info!("{} alert for {}: {}", alert.kind.as_str(), key, alert.message);
                self.metrics.record_alert(alert.kind);
                self.sink.emit(alert);
            }
            RecordOutcome::Classified { alerts: count }
        } else {
            self.metrics.not_ready += 1;
            log::debug!(
                "Window for {} not ready ({}/{})",
                key,
                window.len(),
                window.capacity()
            );
            RecordOutcome::NotReady
        };

        self.maybe_sweep();
        outcome
    }

    /// Pull, process and commit records until the source ends or shutdown is
    /// triggered. Source errors are returned to the caller.
    pub fn run<R: RecordSource + ?Sized>(&mut self, source: &mut R) -> Result<(), SourceError> {
        self.run_observed(source, |_| {})
    }

    /// Same loop as [`run`](Self::run), reporting each committed record to
    /// `on_commit`.
    pub fn run_observed<R, F>(&mut self, source: &mut R, mut on_commit: F) -> Result<(), SourceError>
    where
        R: RecordSource + ?Sized,
        F: FnMut(Progress),
    {
        log::info!(
            "Stream processor started ({} / {})",
            self.decoder.name(),
            self.classifier.name()
        );

        while !self.shutdown.is_triggered() {
            let Some(record) = source.next_record()? else {
                break;
            };
            // A record fetched after shutdown stays uncommitted for redelivery.
            if self.shutdown.is_triggered() {
                break;
            }
            let outcome = self.process_record(&record);
            source.commit(record.offset)?;
            self.metrics.last_committed = Some(record.offset);
            on_commit(Progress {
                offset: record.offset,
                outcome,
                windows: self.store.len(),
            });
        }

        log::info!(
            "Stream processor stopped: {} records, {} alerts, {} windows",
            self.metrics.records_seen,
            self.metrics.total_alerts(),
            self.store.len()
        );
        Ok(())
    }

    fn maybe_sweep(&mut self) {
        let Some(eviction) = &self.window_config.idle_eviction else {
            return;
        };
        self.since_sweep += 1;
        if self.since_sweep < eviction.sweep_every_records {
            return;
        }
        self.since_sweep = 0;

        let Some(max_idle) = i64::try_from(eviction.max_idle_secs)
            .ok()
            .and_then(Duration::try_seconds)
        else {
            log::warn!(
                "Idle eviction skipped: {}s is out of range",
                eviction.max_idle_secs
            );
            return;
        };
        let evicted = self.store.evict_idle(max_idle);
        if !evicted.is_empty() {
            self.metrics.windows_evicted += evicted.len() as u64;
            log::debug!("Evicted {} idle windows: {:?}", evicted.len(), evicted);
        }
    }
}
