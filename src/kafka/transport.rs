use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// An encoded record addressed to an explicit partition.
#[derive(Debug, Clone, Copy)]
pub struct OutboundRecord<'a> {
    pub topic: &'a str,
    pub partition: u32,
    pub key: Option<&'a [u8]>,
    pub payload: &'a [u8],
}

/// Where the broker stored an acknowledged record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub topic: String,
    pub partition: u32,
    pub offset: i64,
}

/// Delivers encoded records to the broker.
///
/// Retries, batching and per-partition ordering are the transport's
/// business; an error returned here is final for that record.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, record: OutboundRecord<'_>) -> Result<DeliveryResult>;

    /// Waits for in-flight records to be acknowledged.
    fn flush(&self, timeout: Duration) -> Result<()>;
}

/// librdkafka addresses partitions as `i32`.
fn wire_partition(topic: &str, partition: u32) -> Result<i32> {
    i32::try_from(partition).map_err(|_| Error::InvalidPartitionCount {
        topic: topic.to_string(),
        count: partition,
    })
}

/// librdkafka-backed transport.
pub struct KafkaTransport {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaTransport {
    /// Creates a producer from librdkafka properties. `queue_timeout`
    /// bounds how long `deliver` waits for room in the local queue.
    pub fn new(properties: &BTreeMap<String, String>, queue_timeout: Duration) -> Result<Self> {
        let mut client_config = ClientConfig::new();
        for (key, value) in properties {
            client_config.set(key, value);
        }

        let producer: FutureProducer = client_config.create().map_err(Error::Transport)?;

        info!(
            brokers = properties.get("bootstrap.servers").map(String::as_str).unwrap_or(""),
            "Kafka producer created"
        );

        Ok(Self {
            producer,
            queue_timeout,
        })
    }

    pub fn producer(&self) -> &FutureProducer {
        &self.producer
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    async fn deliver(&self, record: OutboundRecord<'_>) -> Result<DeliveryResult> {
        let partition = wire_partition(record.topic, record.partition)?;
        let mut future_record = FutureRecord::<[u8], [u8]>::to(record.topic)
            .payload(record.payload)
            .partition(partition);
        if let Some(key) = record.key {
            future_record = future_record.key(key);
        }

        let (acked_partition, offset) = self
            .producer
            .send(future_record, self.queue_timeout)
            .await
            .map_err(|(e, _)| Error::Transport(e))?;

        debug!(topic = %record.topic, partition = acked_partition, offset, "Record acknowledged");

        // The record was addressed to an explicit partition, so that is
        // where it was stored.
        Ok(DeliveryResult {
            topic: record.topic.to_string(),
            partition: record.partition,
            offset,
        })
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout).map_err(Error::Transport)
    }
}
