use crate::registry::ChannelName;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const CHANNEL_PREFIX: &str = "channel.";
const VALUE_SCHEMA_PREFIX: &str = "value.schema.";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub schema_registry: SchemaRegistryConfig,
    /// Per-channel librdkafka overrides, keyed by channel name.
    #[serde(default)]
    pub channels: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    #[serde(default = "default_metadata_max_age_ms")]
    pub metadata_max_age_ms: u64,
    /// Extra librdkafka properties passed through verbatim.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaRegistryConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,
    #[serde(default = "default_registry_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_auto_register")]
    pub auto_register: bool,
    /// `user:password` for HTTP basic auth.
    #[serde(default)]
    pub basic_auth_user_info: Option<String>,
    /// Avro schema files for values, keyed by topic.
    #[serde(default)]
    pub value_schemas: HashMap<String, PathBuf>,
}

impl Default for SchemaRegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            timeout_ms: default_registry_timeout_ms(),
            auto_register: default_auto_register(),
            basic_auth_user_info: None,
            value_schemas: HashMap::new(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("PRODUCER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from flat producer properties.
    ///
    /// Recognised keys are `bootstrap.servers`, `compression.type`, `acks`,
    /// `linger.ms`, `batch.size`, `message.timeout.ms`,
    /// `metadata.max.age.ms`, `schema.registry.url`,
    /// `schema.registry.timeout.ms`, `auto.register.schemas` and
    /// `basic.auth.user.info`. Keys of the form `channel.<name>.<property>`
    /// override `<property>` for one channel, and `value.schema.<topic>`
    /// names an Avro schema file for that topic's values. Everything else is
    /// passed to librdkafka unchanged.
    pub fn from_properties<K, V, I>(props: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut kafka = KafkaConfig {
            brokers: Vec::new(),
            compression: default_compression(),
            acks: default_acks(),
            linger_ms: default_linger_ms(),
            batch_size: default_batch_size(),
            message_timeout_ms: default_message_timeout_ms(),
            metadata_max_age_ms: default_metadata_max_age_ms(),
            properties: HashMap::new(),
        };
        let mut schema_registry = SchemaRegistryConfig::default();
        let mut channels: HashMap<String, HashMap<String, String>> = HashMap::new();

        for (key, value) in props {
            let key = key.into();
            let value = value.into();

            match key.as_str() {
                "bootstrap.servers" => {
                    kafka.brokers = value
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                }
                "compression.type" => kafka.compression = value,
                "acks" => kafka.acks = value,
                "linger.ms" => kafka.linger_ms = parse_property(&key, &value)?,
                "batch.size" => kafka.batch_size = parse_property(&key, &value)?,
                "message.timeout.ms" => kafka.message_timeout_ms = parse_property(&key, &value)?,
                "metadata.max.age.ms" => kafka.metadata_max_age_ms = parse_property(&key, &value)?,
                "schema.registry.url" => schema_registry.url = value,
                "schema.registry.timeout.ms" => {
                    schema_registry.timeout_ms = parse_property(&key, &value)?
                }
                "auto.register.schemas" => {
                    schema_registry.auto_register = parse_property(&key, &value)?
                }
                "basic.auth.user.info" => schema_registry.basic_auth_user_info = Some(value),
                _ if key.starts_with(VALUE_SCHEMA_PREFIX) => {
                    let topic = &key[VALUE_SCHEMA_PREFIX.len()..];
                    schema_registry
                        .value_schemas
                        .insert(topic.to_string(), PathBuf::from(value));
                }
                _ => match key.strip_prefix(CHANNEL_PREFIX) {
                    Some(rest) => {
                        let (channel, property) = rest.split_once('.').ok_or_else(|| {
                            Error::Config(format!("Malformed channel override '{}'", key))
                        })?;
                        channels
                            .entry(channel.to_string())
                            .or_default()
                            .insert(property.to_string(), value);
                    }
                    None => {
                        kafka.properties.insert(key, value);
                    }
                },
            }
        }

        let config = Config {
            kafka,
            schema_registry,
            channels,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.is_empty() {
            return Err(Error::Config("No Kafka brokers configured".to_string()));
        }

        for name in self.channels.keys() {
            ChannelName::from_str(name)
                .map_err(|_| Error::Config(format!("Override for unknown channel '{}'", name)))?;
        }

        Ok(())
    }

    /// librdkafka properties for one channel: shared settings, then
    /// pass-through properties, then that channel's overrides.
    pub fn client_properties(&self, channel: ChannelName) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("bootstrap.servers".to_string(), self.kafka.brokers.join(","));
        props.insert("compression.type".to_string(), self.kafka.compression.clone());
        props.insert("acks".to_string(), self.kafka.acks.clone());
        props.insert("linger.ms".to_string(), self.kafka.linger_ms.to_string());
        props.insert("batch.size".to_string(), self.kafka.batch_size.to_string());
        props.insert(
            "message.timeout.ms".to_string(),
            self.kafka.message_timeout_ms.to_string(),
        );
        props.insert(
            "metadata.max.age.ms".to_string(),
            self.kafka.metadata_max_age_ms.to_string(),
        );

        props.extend(self.kafka.properties.clone());

        if let Some(overrides) = self.channels.get(channel.as_str()) {
            props.extend(overrides.clone());
        }

        props
    }

    pub fn metadata_max_age(&self) -> Duration {
        Duration::from_millis(self.kafka.metadata_max_age_ms)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka.message_timeout_ms)
    }
}

fn parse_property<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value '{}' for '{}'", value, key)))
}

fn default_compression() -> String {
    "lz4".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_linger_ms() -> u32 {
    5
}

fn default_batch_size() -> usize {
    16384
}

fn default_message_timeout_ms() -> u64 {
    30_000
}

fn default_metadata_max_age_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_registry_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_registry_timeout_ms() -> u64 {
    10_000
}

fn default_auto_register() -> bool {
    true
}
