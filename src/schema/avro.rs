//! Avro values framed for a schema registry.
//!
//! Wire format: `[0x00][schema id: u32 big-endian][avro datum]`.

use super::registry::{subject_for_topic, RegisteredSchema, SchemaRegistry};
use crate::codec::ValueCodec;
use crate::{Error, Result};
use apache_avro::types::Value;
use apache_avro::Schema;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const MAGIC_BYTE: u8 = 0x00;

const HEADER_LEN: usize = 5;

pub struct AvroCodec {
    registry: Arc<dyn SchemaRegistry>,
    auto_register: bool,
    /// Schemas supplied by the application, keyed by topic.
    local_schemas: HashMap<String, Arc<Schema>>,
    by_subject: RwLock<HashMap<String, RegisteredSchema>>,
    by_id: RwLock<HashMap<u32, Arc<Schema>>>,
}

impl AvroCodec {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            auto_register: true,
            local_schemas: HashMap::new(),
            by_subject: RwLock::new(HashMap::new()),
            by_id: RwLock::new(HashMap::new()),
        }
    }

    /// When enabled (the default), a local schema is registered on first
    /// use. When disabled, the latest registered version is used even if a
    /// local schema is present.
    pub fn auto_register(mut self, enabled: bool) -> Self {
        self.auto_register = enabled;
        self
    }

    /// Uses `schema` for values produced to `topic`.
    pub fn with_topic_schema(mut self, topic: impl Into<String>, schema: Schema) -> Self {
        self.local_schemas.insert(topic.into(), Arc::new(schema));
        self
    }

    /// Schema and id used for `topic`, resolving it through the registry
    /// on first use.
    #[instrument(skip(self))]
    pub async fn resolve(&self, topic: &str) -> Result<RegisteredSchema> {
        let subject = subject_for_topic(topic);
        let cached = self.by_subject.read().get(&subject).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let resolved = match self.local_schemas.get(topic) {
            Some(schema) if self.auto_register => {
                let id = self.registry.register(&subject, schema).await?;
                RegisteredSchema {
                    id,
                    schema: schema.clone(),
                }
            }
            _ => self.registry.latest(&subject).await?,
        };

        info!(subject = %subject, schema_id = resolved.id, "Resolved value schema");
        self.by_id
            .write()
            .insert(resolved.id, resolved.schema.clone());
        self.by_subject.write().insert(subject, resolved.clone());
        Ok(resolved)
    }

    async fn schema_by_id(&self, id: u32) -> Result<Arc<Schema>> {
        let cached = self.by_id.read().get(&id).cloned();
        if let Some(schema) = cached {
            return Ok(schema);
        }

        let schema = self.registry.schema_by_id(id).await?;
        debug!(schema_id = id, "Fetched schema for decoding");
        self.by_id.write().insert(id, schema.clone());
        Ok(schema)
    }
}

#[async_trait]
impl ValueCodec for AvroCodec {
    type Value = Value;

    async fn encode(&self, topic: &str, value: &Value) -> Result<Bytes> {
        let resolved = self.resolve(topic).await?;

        // Encode the schema-normalised value (promoted types, schema field
        // order) so decoding yields the same value.
        let normalized = value.clone().resolve(&resolved.schema).map_err(|e| {
            Error::schema_encoding(format!(
                "Value does not conform to schema {} for topic '{}': {}",
                resolved.id, topic, e
            ))
        })?;

        let datum = apache_avro::to_avro_datum(&resolved.schema, normalized)
            .map_err(|e| Error::schema_encoding(format!("Avro encoding failed: {}", e)))?;

        let mut buf = BytesMut::with_capacity(HEADER_LEN + datum.len());
        buf.put_u8(MAGIC_BYTE);
        buf.put_u32(resolved.id);
        buf.extend_from_slice(&datum);
        Ok(buf.freeze())
    }

    async fn decode(&self, topic: &str, payload: &[u8]) -> Result<Value> {
        if payload.len() < HEADER_LEN || payload[0] != MAGIC_BYTE {
            return Err(Error::schema_encoding(format!(
                "Payload on topic '{}' is not schema-registry framed",
                topic
            )));
        }

        let id = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
        let schema = self.schema_by_id(id).await?;

        let mut datum = &payload[HEADER_LEN..];
        apache_avro::from_avro_datum(&schema, &mut datum, None)
            .map_err(|e| Error::schema_encoding(format!("Avro decoding failed: {}", e)))
    }
}
