//! Processing metrics for a stream processor.

use crate::alert::AlertKind;
use std::collections::HashMap;

/// Counters kept by one [`StreamProcessor`](crate::StreamProcessor).
#[derive(Debug, Clone, Default)]
pub struct ProcessorMetrics {
    /// Records pulled from the source
    pub records_seen: u64,
    /// Records decoded and pushed into a window
    pub records_processed: u64,
    /// Records that failed to decode
    pub decode_errors: u64,
    /// Records skipped as duplicate timestamps
    pub duplicates_skipped: u64,
    /// Evaluations on windows that were not full yet
    pub not_ready: u64,
    /// Windows dropped by idle eviction
    pub windows_evicted: u64,
    /// Alerts emitted, by kind
    pub alerts: HashMap<AlertKind, u64>,
    /// Last committed offset
    pub last_committed: Option<u64>,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_alert(&mut self, kind: AlertKind) {
        *self.alerts.entry(kind).or_insert(0) += 1;
    }

    /// Alerts emitted of one kind.
    pub fn alert_count(&self, kind: AlertKind) -> u64 {
        self.alerts.get(&kind).copied().unwrap_or(0)
    }

    /// Alerts emitted of every kind.
    pub fn total_alerts(&self) -> u64 {
        self.alerts.values().sum()
    }

    /// Fraction of seen records that failed to decode.
    pub fn decode_error_rate(&self) -> f64 {
        if self.records_seen == 0 {
            return 0.0;
        }
        self.decode_errors as f64 / self.records_seen as f64
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Human-readable summary.
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Pulsewatch Processor Metrics ===\n\n");

        report.push_str(&format!("Records seen: {}\n", self.records_seen));
        report.push_str(&format!("Records processed: {}\n", self.records_processed));
        report.push_str(&format!(
            "Decode errors: {} ({:.1}%)\n",
            self.decode_errors,
            self.decode_error_rate() * 100.0
        ));
        report.push_str(&format!(
            "Duplicates skipped: {}\n",
            self.duplicates_skipped
        ));
        report.push_str(&format!("Not-ready evaluations: {}\n", self.not_ready));
        report.push_str(&format!("Windows evicted: {}\n", self.windows_evicted));
        match self.last_committed {
            Some(offset) => report.push_str(&format!("Last committed offset: {}\n\n", offset)),
            None => report.push_str("Last committed offset: none\n\n"),
        }

        report.push_str(&format!("Alerts: {}\n", self.total_alerts()));
        for kind in AlertKind::all() {
            let count = self.alert_count(kind);
            if count > 0 {
                report.push_str(&format!("  {}: {}\n", kind.as_str(), count));
            }
        }

        report
    }
}
