//! Series key to partition assignment.
//!
//! Every record for a key lands in the same partition, and each partition is
//! consumed by exactly one processor, so a window only ever has one writer.

use xxhash_rust::xxh64::xxh64;

/// Seed for key hashing. Changing it reshuffles every key.
const PARTITION_SEED: u64 = 0;

/// Partition for `key` among `partitions` (0 is treated as 1).
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    let partitions = partitions.max(1);
    (xxh64(key.as_bytes(), PARTITION_SEED) % u64::from(partitions)) as u32
}
