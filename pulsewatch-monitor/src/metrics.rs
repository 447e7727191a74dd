// Pulsewatch Monitor - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for the producer and consumer processes.
//!
//! Consumer series are labelled by topic and partition so the per-partition
//! workers of one process can be told apart.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Encoder, Gauge, GaugeVec,
    TextEncoder,
};
use pulsewatch::{AlertKind, Progress, RecordOutcome};

lazy_static! {
    // ============================================================
    // Consumer
    // ============================================================

    /// Records pulled from the topic log and committed.
    pub static ref RECORDS_SEEN_TOTAL: CounterVec = register_counter_vec!(
        "pulsewatch_records_seen_total",
        "Records read and committed",
        &["topic", "partition"]
    ).unwrap();

    /// Records decoded and pushed into a window.
    pub static ref RECORDS_PROCESSED_TOTAL: CounterVec = register_counter_vec!(
        "pulsewatch_records_processed_total",
        "Records pushed into a rolling window",
        &["topic", "partition"]
    ).unwrap();

    /// Records skipped because they did not decode.
    pub static ref DECODE_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "pulsewatch_decode_errors_total",
        "Records skipped because they failed to decode",
        &["topic", "partition"]
    ).unwrap();

    /// Records skipped as duplicate timestamps.
    pub static ref DUPLICATES_SKIPPED_TOTAL: CounterVec = register_counter_vec!(
        "pulsewatch_duplicates_skipped_total",
        "Records skipped because their timestamp was already in the window",
        &["topic", "partition"]
    ).unwrap();

    /// Alerts emitted, by kind and series key.
    pub static ref ALERTS_TOTAL: CounterVec = register_counter_vec!(
        "pulsewatch_alerts_total",
        "Alerts emitted",
        &["kind", "series"]
    ).unwrap();

    /// Series windows currently held by a partition worker.
    pub static ref WINDOWS_TRACKED: GaugeVec = register_gauge_vec!(
        "pulsewatch_windows_tracked",
        "Rolling windows held in memory",
        &["topic", "partition"]
    ).unwrap();

    /// Last committed offset per partition.
    pub static ref COMMITTED_OFFSET: GaugeVec = register_gauge_vec!(
        "pulsewatch_committed_offset",
        "Last committed offset",
        &["topic", "partition"]
    ).unwrap();

    // ============================================================
    // Producer
    // ============================================================

    /// Records appended to the topic log.
    pub static ref RECORDS_PUBLISHED_TOTAL: CounterVec = register_counter_vec!(
        "pulsewatch_records_published_total",
        "Records appended to the topic log",
        &["topic", "partition"]
    ).unwrap();

    // ============================================================
    // Process
    // ============================================================

    /// Partition workers currently running.
    pub static ref ACTIVE_WORKERS: Gauge = register_gauge!(
        "pulsewatch_active_workers",
        "Partition workers currently running"
    ).unwrap();
}

/// Update consumer series from one committed record.
pub fn record_progress(topic: &str, partition: u32, progress: &Progress) {
    let partition = partition.to_string();
    let labels = [topic, partition.as_str()];

    RECORDS_SEEN_TOTAL.with_label_values(&labels).inc();
    match progress.outcome {
        RecordOutcome::Classified { .. } | RecordOutcome::NotReady => {
            RECORDS_PROCESSED_TOTAL.with_label_values(&labels).inc();
        }
        RecordOutcome::Duplicate => DUPLICATES_SKIPPED_TOTAL.with_label_values(&labels).inc(),
        RecordOutcome::DecodeFailed => DECODE_ERRORS_TOTAL.with_label_values(&labels).inc(),
    }
    WINDOWS_TRACKED
        .with_label_values(&labels)
        .set(progress.windows as f64);
    COMMITTED_OFFSET
        .with_label_values(&labels)
        .set(progress.offset as f64);
}

/// Count one emitted alert.
pub fn record_alert(kind: AlertKind, series: &str) {
    ALERTS_TOTAL.with_label_values(&[kind.as_str(), series]).inc();
}

/// Count one published record.
pub fn record_published(topic: &str, partition: u32) {
    RECORDS_PUBLISHED_TOTAL
        .with_label_values(&[topic, partition.to_string().as_str()])
        .inc();
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
