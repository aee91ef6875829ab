use super::registry::{RegisteredSchema, SchemaRegistry};
use crate::{Error, Result};
use apache_avro::Schema;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// In-process schema registry for local development and tests.
///
/// Ids start at 1 and are shared across subjects for identical schemas,
/// like the real registry.
#[derive(Default)]
pub struct MemorySchemaRegistry {
    inner: RwLock<Inner>,
    unavailable: AtomicBool,
    requests: AtomicUsize,
}

#[derive(Default)]
struct Inner {
    schemas: Vec<Arc<Schema>>,
    subjects: HashMap<String, Vec<u32>>,
}

impl Inner {
    fn register(&mut self, subject: &str, schema: &Schema) -> u32 {
        let canonical = schema.canonical_form();
        let id = match self
            .schemas
            .iter()
            .position(|s| s.canonical_form() == canonical)
        {
            Some(index) => index as u32 + 1,
            None => {
                self.schemas.push(Arc::new(schema.clone()));
                self.schemas.len() as u32
            }
        };

        let versions = self.subjects.entry(subject.to_string()).or_default();
        if !versions.contains(&id) {
            versions.push(id);
        }
        id
    }
}

impl MemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema without counting it as a client request.
    pub fn insert(&self, subject: &str, schema: &Schema) -> u32 {
        self.inner.write().register(subject, schema)
    }

    /// Makes every subsequent request fail as if the registry were down.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of requests served through [`SchemaRegistry`].
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn begin_request(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::registry_unavailable("Connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaRegistry for MemorySchemaRegistry {
    async fn latest(&self, subject: &str) -> Result<RegisteredSchema> {
        self.begin_request()?;
        let inner = self.inner.read();
        let id = inner
            .subjects
            .get(subject)
            .and_then(|versions| versions.last().copied())
            .ok_or_else(|| Error::schema_encoding(format!("Subject '{}' not found", subject)))?;

        Ok(RegisteredSchema {
            id,
            schema: inner.schemas[id as usize - 1].clone(),
        })
    }

    async fn register(&self, subject: &str, schema: &Schema) -> Result<u32> {
        self.begin_request()?;
        Ok(self.inner.write().register(subject, schema))
    }

    async fn schema_by_id(&self, id: u32) -> Result<Arc<Schema>> {
        self.begin_request()?;
        let inner = self.inner.read();
        (id as usize)
            .checked_sub(1)
            .and_then(|index| inner.schemas.get(index))
            .cloned()
            .ok_or_else(|| Error::schema_encoding(format!("Schema id {} not found", id)))
    }
}
