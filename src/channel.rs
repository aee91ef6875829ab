use crate::codec::{EncodingProfile, ValueCodec};
use crate::kafka::{ClusterTopology, DeliveryResult, OutboundRecord, Transport};
use crate::observer::{SendContext, SendObserver};
use crate::partitioner::{Partitioner, UserIdPartitioner};
use crate::{Error, Result};
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// One configured send path: an encoding profile, the partitioner, a view
/// of the cluster topology and a transport.
///
/// Channels hold no per-send state and can be shared freely between tasks.
pub struct ProducerChannel<C> {
    profile: EncodingProfile<C>,
    partitioner: Arc<dyn Partitioner>,
    topology: Arc<dyn ClusterTopology>,
    transport: Arc<dyn Transport>,
    observer: Option<Arc<dyn SendObserver>>,
}

impl<C: ValueCodec> ProducerChannel<C> {
    /// Creates a channel routing with [`UserIdPartitioner`].
    pub fn new(
        profile: EncodingProfile<C>,
        topology: Arc<dyn ClusterTopology>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            profile,
            partitioner: Arc::new(UserIdPartitioner),
            topology,
            transport,
            observer: None,
        }
    }

    pub fn with_partitioner(mut self, partitioner: Arc<dyn Partitioner>) -> Self {
        self.partitioner = partitioner;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SendObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn name(&self) -> &'static str {
        self.profile.name()
    }

    pub fn profile(&self) -> &EncodingProfile<C> {
        &self.profile
    }

    /// Encodes `value`, routes the record by `key` and waits for the
    /// broker's acknowledgement.
    ///
    /// Encoding failures are reported before anything is written.
    /// Dropping the returned future abandons the wait but not necessarily
    /// the write.
    #[instrument(skip(self, value), fields(channel = self.name()))]
    pub async fn send(
        &self,
        topic: &str,
        key: Option<i64>,
        value: &C::Value,
    ) -> Result<DeliveryResult> {
        let ctx = SendContext {
            channel: self.name(),
            topic,
            key,
        };
        if let Some(observer) = &self.observer {
            observer.on_send(&ctx);
        }

        let result = self.encode_and_deliver(topic, key, value).await;

        match &result {
            Ok(delivery) => {
                debug!(partition = delivery.partition, offset = delivery.offset, "Delivered");
                if let Some(observer) = &self.observer {
                    observer.on_delivered(&ctx, delivery);
                }
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "Send failed");
                if let Some(observer) = &self.observer {
                    observer.on_failed(&ctx, e);
                }
            }
        }

        result
    }

    async fn encode_and_deliver(
        &self,
        topic: &str,
        key: Option<i64>,
        value: &C::Value,
    ) -> Result<DeliveryResult> {
        let payload = self.profile.encode_value(topic, value).await?;
        let key_bytes = key.map(|k| self.profile.encode_key(k));

        let partition_count = self.topology.partition_count(topic).await?;
        let partition = self.partitioner.partition(topic, key, partition_count)?;

        let record = OutboundRecord {
            topic,
            partition,
            key: key_bytes.as_deref(),
            payload: &payload,
        };

        self.transport.deliver(record).await.map_err(|e| {
            if is_stale_partition(&e) {
                self.topology.invalidate(topic);
            }
            e
        })
    }

    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.transport.flush(timeout)
    }
}

/// The broker rejected the partition we picked, so our partition count
/// for the topic is out of date.
fn is_stale_partition(error: &Error) -> bool {
    matches!(
        error,
        Error::Transport(KafkaError::MessageProduction(
            RDKafkaErrorCode::UnknownPartition
        ))
    )
}
