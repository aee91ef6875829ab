//! Deterministic user-id partitioning.
//!
//! Records are routed by the numeric value of their key rather than by a
//! digest of the key bytes: `partition = key mod partition_count`, using
//! non-negative modulo so negative ids still land in `[0, count)`.
//! Records without a usable key go to partition 0.

use crate::{Error, Result};
use tracing::debug;

/// Picks the target partition for a record.
///
/// Implementations must be pure: the same `(topic, key, partition_count)`
/// always yields the same partition.
pub trait Partitioner: Send + Sync {
    fn partition(&self, topic: &str, key: Option<i64>, partition_count: u32) -> Result<u32>;
}

/// Routes each record to `user_id mod partition_count`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserIdPartitioner;

impl Partitioner for UserIdPartitioner {
    fn partition(&self, topic: &str, key: Option<i64>, partition_count: u32) -> Result<u32> {
        if partition_count == 0 {
            return Err(Error::InvalidPartitionCount {
                topic: topic.to_string(),
                count: partition_count,
            });
        }

        if key.is_none() {
            debug!(topic = %topic, "Record has no key, routing to partition 0");
        }

        Ok(user_partition(key.unwrap_or(0), partition_count))
    }
}

/// `key mod partition_count` in `[0, partition_count)`.
///
/// `partition_count` must be non-zero.
pub fn user_partition(key: i64, partition_count: u32) -> u32 {
    key.rem_euclid(i64::from(partition_count)) as u32
}

/// Reads a routing key from raw key bytes.
///
/// Only an 8-byte big-endian integer is a usable key; anything else
/// (missing, empty, wrong length) becomes `0`. Consumers and tools that
/// hold a record's raw key use this to work out which partition the
/// record was routed to; unlike [`decode_key`](crate::codec::decode_key)
/// it never fails.
pub fn coerce_key(raw: Option<&[u8]>) -> i64 {
    match raw.map(|bytes| <[u8; 8]>::try_from(bytes)) {
        Some(Ok(bytes)) => i64::from_be_bytes(bytes),
        Some(Err(_)) => {
            debug!("Key is not an 8-byte integer, using 0");
            0
        }
        None => 0,
    }
}
