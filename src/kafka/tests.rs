use super::*;
use crate::config::Config;
use crate::registry::ChannelName;
use crate::Error;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn create_test_config() -> Config {
    Config::from_properties([
        ("bootstrap.servers", "localhost:9092"),
        ("compression.type", "none"),
        ("acks", "1"),
        ("linger.ms", "0"),
        ("message.timeout.ms", "5000"),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_static_topology() {
    let topology = StaticTopology::new()
        .with_topic("orders", 4)
        .with_topic("users", 12);

    assert_eq!(topology.partition_count("orders").await.unwrap(), 4);
    assert_eq!(topology.partition_count("users").await.unwrap(), 12);

    let err = topology.partition_count("payments").await.unwrap_err();
    assert!(matches!(err, Error::UnknownTopic(ref t) if t == "payments"));
}

/// Metadata source with a settable partition count that counts fetches.
struct ScriptedMetadata {
    partitions: Mutex<Option<u32>>,
    fetches: AtomicUsize,
    latency: Duration,
}

impl ScriptedMetadata {
    fn new(partitions: u32) -> Arc<Self> {
        Self::with_latency(partitions, Duration::ZERO)
    }

    fn with_latency(partitions: u32, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            partitions: Mutex::new(Some(partitions)),
            fetches: AtomicUsize::new(0),
            latency,
        })
    }

    fn resize(&self, partitions: Option<u32>) {
        *self.partitions.lock() = partitions;
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl MetadataSource for ScriptedMetadata {
    fn fetch_partition_count(&self, topic: &str, _timeout: Duration) -> crate::Result<u32> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.latency);
        (*self.partitions.lock()).ok_or_else(|| Error::UnknownTopic(topic.to_string()))
    }
}

#[tokio::test]
async fn test_metadata_topology_caches_counts() {
    let source = ScriptedMetadata::new(4);
    let topology = MetadataTopology::with_source(source.clone(), Duration::from_secs(300));

    for _ in 0..5 {
        assert_eq!(topology.partition_count("orders").await.unwrap(), 4);
    }
    assert_eq!(source.fetches(), 1);

    assert_eq!(topology.partition_count("users").await.unwrap(), 4);
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn test_metadata_topology_refetches_after_max_age() {
    let source = ScriptedMetadata::new(4);
    let topology = MetadataTopology::with_source(source.clone(), Duration::from_millis(200));

    assert_eq!(topology.partition_count("orders").await.unwrap(), 4);

    source.resize(Some(6));
    assert_eq!(topology.partition_count("orders").await.unwrap(), 4);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(topology.partition_count("orders").await.unwrap(), 6);
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn test_metadata_topology_invalidate_forces_refetch() {
    let source = ScriptedMetadata::new(4);
    let topology = MetadataTopology::with_source(source.clone(), Duration::from_secs(300));

    assert_eq!(topology.partition_count("orders").await.unwrap(), 4);
    source.resize(Some(8));

    topology.invalidate("orders");
    assert_eq!(topology.partition_count("orders").await.unwrap(), 8);
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn test_metadata_topology_does_not_cache_failures() {
    let source = ScriptedMetadata::new(4);
    source.resize(None);
    let topology = MetadataTopology::with_source(source.clone(), Duration::from_secs(300));

    let err = topology.partition_count("orders").await.unwrap_err();
    assert!(matches!(err, Error::UnknownTopic(ref t) if t == "orders"));

    source.resize(Some(3));
    assert_eq!(topology.partition_count("orders").await.unwrap(), 3);
    assert_eq!(source.fetches(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn test_metadata_fetch_does_not_stall_other_tasks() {
    let source = ScriptedMetadata::with_latency(4, Duration::from_millis(300));
    let topology = MetadataTopology::with_source(source, Duration::from_secs(300));

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = tokio::spawn({
        let ticks = ticks.clone();
        async move {
            let mut interval = tokio::time::interval(Duration::from_millis(10));
            loop {
                interval.tick().await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    assert_eq!(topology.partition_count("orders").await.unwrap(), 4);
    ticker.abort();

    let ticked = ticks.load(Ordering::SeqCst);
    assert!(ticked >= 5, "only {} ticks while metadata was fetched", ticked);
}

#[test]
fn test_invalid_client_property_is_rejected() {
    let mut properties = BTreeMap::new();
    properties.insert("bootstrap.servers".to_string(), "localhost:9092".to_string());
    properties.insert("no.such.property".to_string(), "1".to_string());

    let result = KafkaTransport::new(&properties, Duration::from_secs(1));
    assert!(matches!(result, Err(Error::Transport(_))));
}

#[tokio::test]
#[ignore] // May fail if system has specific network configurations
async fn test_transport_creation() {
    let config = create_test_config();
    let properties = config.client_properties(ChannelName::Generic);

    // Should succeed even if Kafka is not running (just creates the producer)
    let result = KafkaTransport::new(&properties, config.message_timeout());
    assert!(result.is_ok());
}

#[tokio::test]
#[ignore] // Requires running Kafka with auto topic creation disabled
async fn test_metadata_topology_unknown_topic() {
    let config = create_test_config();
    let transport =
        KafkaTransport::new(&config.client_properties(ChannelName::Generic), config.message_timeout())
            .unwrap();
    let topology = MetadataTopology::new(transport.producer().clone(), config.metadata_max_age());

    let err = topology
        .partition_count("keyed-producer-missing-topic")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTopic(_)));
}

#[tokio::test]
#[ignore] // Requires running Kafka
async fn test_deliver_to_explicit_partition() {
    let config = create_test_config();
    let transport =
        KafkaTransport::new(&config.client_properties(ChannelName::Generic), config.message_timeout())
            .unwrap();

    let key = 7i64.to_be_bytes();
    let result = transport
        .deliver(OutboundRecord {
            topic: "keyed-producer-test",
            partition: 0,
            key: Some(&key),
            payload: b"hello",
        })
        .await
        .unwrap();

    assert_eq!(result.topic, "keyed-producer-test");
    assert_eq!(result.partition, 0);
    assert!(result.offset >= 0);

    transport.flush(Duration::from_secs(5)).unwrap();
}
