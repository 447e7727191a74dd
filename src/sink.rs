//! Alert sinks.
//!
//! The processor hands every alert to a [`Sink`] and moves on. Delivery,
//! buffering and backpressure are the sink's business.

use crate::alert::Alert;

/// Receiver of emitted alerts.
pub trait Sink {
    /// Take ownership of one alert. Must not block the processor for long.
    fn emit(&mut self, alert: Alert);
}

/// Collects alerts in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    alerts: Vec<Alert>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Take the collected alerts, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.alerts)
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }
}

/// Logs each alert as one JSON line at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl Sink for LogSink {
    fn emit(&mut self, alert: Alert) {
        match alert.to_json() {
            Ok(json) => log::info!(target: "pulsewatch::alert", "{}", json),
            Err(e) => log::error!("Cannot serialize alert for {}: {}", alert.series_key, e),
        }
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn emit(&mut self, alert: Alert) {
        (**self).emit(alert)
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn emit(&mut self, alert: Alert) {
        (**self).emit(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_memory_sink_drain() {
        let mut sink = MemorySink::new();
        sink.emit(Alert::stall("health", "calories_burned", 0.1, 0.2, 5, Utc::now()));
        assert_eq!(sink.len(), 1);

        let drained = sink.drain();
        assert_eq!(drained.len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_boxed_sink() {
        let mut sink: Box<dyn Sink> = Box::new(LogSink);
        sink.emit(Alert::stall("health", "calories_burned", 0.1, 0.2, 5, Utc::now()));
    }
}
