//! Schema registry client.
//!
//! Speaks the Confluent schema registry REST API: subjects are named
//! `<topic>-value` and schema ids are 32-bit integers assigned by the
//! registry.

use crate::config::SchemaRegistryConfig;
use crate::{Error, Result};
use apache_avro::Schema;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const SCHEMA_REGISTRY_V1: &str = "application/vnd.schemaregistry.v1+json";

/// A schema together with the id the registry assigned to it.
#[derive(Debug, Clone)]
pub struct RegisteredSchema {
    pub id: u32,
    pub schema: Arc<Schema>,
}

#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Latest schema version registered under `subject`.
    async fn latest(&self, subject: &str) -> Result<RegisteredSchema>;

    /// Registers `schema` under `subject` and returns its id. Registering
    /// a schema that already exists returns the existing id.
    async fn register(&self, subject: &str, schema: &Schema) -> Result<u32>;

    async fn schema_by_id(&self, id: u32) -> Result<Arc<Schema>>;
}

/// Subject name for a topic's values (topic-name strategy).
pub fn subject_for_topic(topic: &str) -> String {
    format!("{}-value", topic)
}

#[derive(Deserialize)]
struct SubjectVersionResponse {
    id: u32,
    schema: String,
}

#[derive(Deserialize)]
struct SchemaResponse {
    schema: String,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: u32,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    schema: &'a str,
}

pub struct HttpSchemaRegistry {
    client: reqwest::Client,
    base_url: String,
    basic_auth: Option<(String, Option<String>)>,
}

impl HttpSchemaRegistry {
    pub fn new(config: &SchemaRegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build registry client: {}", e)))?;

        let basic_auth = config.basic_auth_user_info.as_deref().map(|info| {
            match info.split_once(':') {
                Some((user, password)) => (user.to_string(), Some(password.to_string())),
                None => (info.to_string(), None),
            }
        });

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            basic_auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.basic_auth {
            Some((user, password)) => request.basic_auth(user, password.as_deref()),
            None => request,
        };

        let response = request
            .header(ACCEPT, SCHEMA_REGISTRY_V1)
            .send()
            .await
            .map_err(|e| Error::registry_unavailable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| Error::registry_unavailable(format!("Malformed response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }
}

/// Server-side and access failures are environmental; anything else means
/// the registry rejected what we asked for.
fn classify_failure(status: StatusCode, body: &str) -> Error {
    let message = format!("Registry answered {}: {}", status, body);

    if status.is_server_error()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        Error::registry_unavailable(message)
    } else {
        Error::schema_encoding(message)
    }
}

fn parse_schema(raw: &str) -> Result<Arc<Schema>> {
    Schema::parse_str(raw)
        .map(Arc::new)
        .map_err(|e| Error::schema_encoding(format!("Registered schema is not valid Avro: {}", e)))
}

/// Full schema JSON as sent to the registry. Unlike the parsing canonical
/// form it keeps field defaults, logical types, docs and aliases.
pub(crate) fn schema_json(schema: &Schema) -> Result<String> {
    serde_json::to_string(schema)
        .map_err(|e| Error::schema_encoding(format!("Failed to serialize schema: {}", e)))
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    #[instrument(skip(self))]
    async fn latest(&self, subject: &str) -> Result<RegisteredSchema> {
        let url = format!("{}/subjects/{}/versions/latest", self.base_url, subject);
        let response: SubjectVersionResponse = self.execute(self.client.get(url)).await?;

        debug!(id = response.id, "Fetched latest schema");
        Ok(RegisteredSchema {
            id: response.id,
            schema: parse_schema(&response.schema)?,
        })
    }

    #[instrument(skip(self, schema))]
    async fn register(&self, subject: &str, schema: &Schema) -> Result<u32> {
        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        let full = schema_json(schema)?;
        let request = self.client.post(url).json(&RegisterRequest { schema: &full });
        let response: RegisterResponse = self.execute(request).await?;

        debug!(id = response.id, "Registered schema");
        Ok(response.id)
    }

    #[instrument(skip(self))]
    async fn schema_by_id(&self, id: u32) -> Result<Arc<Schema>> {
        let url = format!("{}/schemas/ids/{}", self.base_url, id);
        let response: SchemaResponse = self.execute(self.client.get(url)).await?;
        parse_schema(&response.schema)
    }
}
