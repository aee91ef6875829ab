#![allow(dead_code)]

use apache_avro::types::Value;
use apache_avro::Schema;
use async_trait::async_trait;
use keyed_producer::kafka::{DeliveryResult, OutboundRecord, StaticTopology, Transport};
use keyed_producer::schema::MemorySchemaRegistry;
use keyed_producer::{
    AvroCodec, EncodingProfile, ProducerChannel, ProducerRegistry, Result, SendObserver,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

pub const ORDER_SCHEMA: &str = r#"{
    "type": "record",
    "name": "Order",
    "namespace": "shop.events",
    "fields": [
        {"name": "order_id", "type": "string"},
        {"name": "user_id", "type": "long"},
        {"name": "amount", "type": "double"},
        {"name": "note", "type": ["null", "string"], "default": null}
    ]
}"#;

pub fn order_schema() -> Schema {
    Schema::parse_str(ORDER_SCHEMA).unwrap()
}

pub fn order(order_id: &str, user_id: i64, amount: f64) -> Value {
    Value::Record(vec![
        ("order_id".to_string(), Value::String(order_id.to_string())),
        ("user_id".to_string(), Value::Long(user_id)),
        ("amount".to_string(), Value::Double(amount)),
        ("note".to_string(), Value::Union(0, Box::new(Value::Null))),
    ])
}

/// A record as the broker would have received it.
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub topic: String,
    pub partition: u32,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

/// Transport that keeps every record in memory and assigns offsets per
/// partition.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentRecord>>,
    offsets: Mutex<HashMap<(String, u32), i64>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn deliver(&self, record: OutboundRecord<'_>) -> Result<DeliveryResult> {
        let offset = {
            let mut offsets = self.offsets.lock();
            let next = offsets
                .entry((record.topic.to_string(), record.partition))
                .or_insert(0);
            let offset = *next;
            *next += 1;
            offset
        };

        self.sent.lock().push(SentRecord {
            topic: record.topic.to_string(),
            partition: record.partition,
            key: record.key.map(<[u8]>::to_vec),
            payload: record.payload.to_vec(),
        });

        Ok(DeliveryResult {
            topic: record.topic.to_string(),
            partition: record.partition,
            offset,
        })
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

pub struct TestHarness {
    pub registry: ProducerRegistry,
    pub generic_transport: Arc<RecordingTransport>,
    pub schema_transport: Arc<RecordingTransport>,
    pub schemas: Arc<MemorySchemaRegistry>,
}

/// Registry over in-memory transports: topic "orders" has 4 partitions,
/// "users" has 12, and "orders-value" is registered.
pub fn test_harness(observer: Option<Arc<dyn SendObserver>>) -> TestHarness {
    let topology = Arc::new(
        StaticTopology::new()
            .with_topic("orders", 4)
            .with_topic("users", 12),
    );
    let schemas = Arc::new(MemorySchemaRegistry::new());
    schemas.insert("orders-value", &order_schema());

    let generic_transport = Arc::new(RecordingTransport::default());
    let schema_transport = Arc::new(RecordingTransport::default());

    let mut builder = ProducerRegistry::builder()
        .generic(ProducerChannel::new(
            EncodingProfile::generic(),
            topology.clone(),
            generic_transport.clone(),
        ))
        .schema_based(ProducerChannel::new(
            EncodingProfile::schema_based(AvroCodec::new(schemas.clone())),
            topology,
            schema_transport.clone(),
        ));
    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }

    TestHarness {
        registry: builder.build().unwrap(),
        generic_transport,
        schema_transport,
        schemas,
    }
}

/// Broker list for tests that need a running Kafka.
pub fn test_brokers() -> String {
    env::var("TEST_KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string())
}

pub fn test_schema_registry_url() -> String {
    env::var("TEST_SCHEMA_REGISTRY_URL").unwrap_or_else(|_| "http://localhost:8081".to_string())
}
