// Pulsewatch Feed - Event producers and topic log
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Publisher abstraction.

use crate::error::Result;

/// Where a published record landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: u32,
    pub offset: u64,
}

/// Appends encoded records to a durable, ordered log.
///
/// Records with the same key keep their relative order.
pub trait Publisher {
    fn publish(&mut self, key: Option<&str>, payload: &[u8]) -> Result<Delivery>;

    /// Make everything published so far durable.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps published records in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryPublisher {
    records: Vec<(Option<String>, Vec<u8>)>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[(Option<String>, Vec<u8>)] {
        &self.records
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&mut self, key: Option<&str>, payload: &[u8]) -> Result<Delivery> {
        self.records
            .push((key.map(str::to_string), payload.to_vec()));
        Ok(Delivery {
            partition: 0,
            offset: self.records.len() as u64 - 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_publisher_offsets() {
        let mut publisher = MemoryPublisher::new();
        let first = publisher.publish(Some("AAPL"), b"{}").unwrap();
        let second = publisher.publish(None, b"{}").unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
        assert_eq!(publisher.records()[0].0.as_deref(), Some("AAPL"));
        assert!(publisher.flush().is_ok());
    }
}
