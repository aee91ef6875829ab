use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, Producer};
use rdkafka::types::RDKafkaErrorCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Read-only view of how many partitions each topic has.
#[async_trait]
pub trait ClusterTopology: Send + Sync {
    /// Fails with [`Error::UnknownTopic`] if the cluster does not know the
    /// topic.
    async fn partition_count(&self, topic: &str) -> Result<u32>;

    /// Drops any cached count for `topic` so the next lookup goes back to
    /// the cluster.
    fn invalidate(&self, _topic: &str) {}
}

/// Fixed topic → partition count snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticTopology {
    counts: HashMap<String, u32>,
}

impl StaticTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, topic: impl Into<String>, partitions: u32) -> Self {
        self.counts.insert(topic.into(), partitions);
        self
    }
}

#[async_trait]
impl ClusterTopology for StaticTopology {
    async fn partition_count(&self, topic: &str) -> Result<u32> {
        self.counts
            .get(topic)
            .copied()
            .ok_or_else(|| Error::UnknownTopic(topic.to_string()))
    }
}

/// Blocking lookup of a topic's partition count in cluster metadata.
pub trait MetadataSource: Send + Sync + 'static {
    fn fetch_partition_count(&self, topic: &str, timeout: Duration) -> Result<u32>;
}

impl MetadataSource for FutureProducer {
    fn fetch_partition_count(&self, topic: &str, timeout: Duration) -> Result<u32> {
        let metadata = self
            .client()
            .fetch_metadata(Some(topic), timeout)
            .map_err(Error::Transport)?;

        let topic_metadata = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .ok_or_else(|| Error::UnknownTopic(topic.to_string()))?;

        if let Some(err) = topic_metadata.error() {
            return Err(match RDKafkaErrorCode::from(err) {
                RDKafkaErrorCode::UnknownTopicOrPartition => Error::UnknownTopic(topic.to_string()),
                code => Error::Transport(KafkaError::MetadataFetch(code)),
            });
        }

        let partitions = topic_metadata.partitions().len() as u32;
        if partitions == 0 {
            return Err(Error::UnknownTopic(topic.to_string()));
        }
        Ok(partitions)
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedCount {
    partitions: u32,
    fetched_at: Instant,
}

/// Partition counts taken from cluster metadata and cached for
/// `max_age`, so a resized topic is picked up on the next refresh.
///
/// Fetches run on tokio's blocking pool; librdkafka's metadata call blocks
/// for up to the fetch timeout.
pub struct MetadataTopology {
    source: Arc<dyn MetadataSource>,
    max_age: Duration,
    fetch_timeout: Duration,
    cache: RwLock<HashMap<String, CachedCount>>,
}

impl MetadataTopology {
    pub fn new(producer: FutureProducer, max_age: Duration) -> Self {
        Self::with_source(Arc::new(producer), max_age)
    }

    pub fn with_source(source: Arc<dyn MetadataSource>, max_age: Duration) -> Self {
        Self {
            source,
            max_age,
            fetch_timeout: Duration::from_secs(5),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cached(&self, topic: &str) -> Option<u32> {
        let cache = self.cache.read();
        cache
            .get(topic)
            .filter(|entry| entry.fetched_at.elapsed() < self.max_age)
            .map(|entry| entry.partitions)
    }

    async fn fetch(&self, topic: &str) -> Result<u32> {
        let source = self.source.clone();
        let owned_topic = topic.to_string();
        let timeout = self.fetch_timeout;

        tokio::task::spawn_blocking(move || source.fetch_partition_count(&owned_topic, timeout))
            .await
            .map_err(|e| {
                warn!(error = %e, "Metadata fetch task did not complete");
                Error::Transport(KafkaError::Canceled)
            })?
    }
}

#[async_trait]
impl ClusterTopology for MetadataTopology {
    #[instrument(skip(self))]
    async fn partition_count(&self, topic: &str) -> Result<u32> {
        if let Some(partitions) = self.cached(topic) {
            return Ok(partitions);
        }

        let partitions = self.fetch(topic).await?;
        let previous = self.cache.write().insert(
            topic.to_string(),
            CachedCount {
                partitions,
                fetched_at: Instant::now(),
            },
        );

        match previous {
            Some(entry) if entry.partitions != partitions => {
                warn!(
                    old = entry.partitions,
                    new = partitions,
                    "Partition count changed, keys will route differently"
                );
            }
            Some(_) => debug!(partitions, "Refreshed partition count"),
            None => info!(partitions, "Loaded partition count"),
        }

        Ok(partitions)
    }

    fn invalidate(&self, topic: &str) {
        self.cache.write().remove(topic);
    }
}
