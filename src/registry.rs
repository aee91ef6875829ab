//! Named producer channels.
//!
//! A [`ProducerRegistry`] is built once at startup, from configuration or
//! from injected parts, and handed to callers by reference.
//!
//! # Example
//!
//! ```rust,no_run
//! use keyed_producer::{Config, ProducerRegistry};
//!
//! # async fn example() -> keyed_producer::Result<()> {
//! let config = Config::from_properties([
//!     ("bootstrap.servers", "localhost:9092"),
//!     ("schema.registry.url", "http://localhost:8081"),
//! ])?;
//! let registry = ProducerRegistry::from_config(&config)?;
//!
//! let delivery = registry
//!     .generic()
//!     .send("orders", Some(42), &"order created".to_string())
//!     .await?;
//! println!("stored at {}:{}", delivery.partition, delivery.offset);
//! # Ok(())
//! # }
//! ```

use crate::channel::ProducerChannel;
use crate::codec::{EncodingProfile, Utf8Codec};
use crate::config::Config;
use crate::kafka::{KafkaTransport, MetadataTopology};
use crate::observer::SendObserver;
use crate::schema::{AvroCodec, HttpSchemaRegistry};
use crate::{Error, Result};
use apache_avro::Schema;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    /// Plain UTF-8 text values.
    Generic,
    /// Schema-registry framed Avro values.
    SchemaBased,
}

impl ChannelName {
    pub const ALL: [ChannelName; 2] = [ChannelName::Generic, ChannelName::SchemaBased];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelName::Generic => "generic",
            ChannelName::SchemaBased => "schema-based",
        }
    }
}

impl FromStr for ChannelName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "generic" => Ok(ChannelName::Generic),
            "schema-based" => Ok(ChannelName::SchemaBased),
            other => Err(Error::UnknownChannel(other.to_string())),
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel looked up by name.
///
/// The two channels take different value types, so the lookup hands back
/// whichever one was asked for.
#[derive(Clone, Copy)]
pub enum Channel<'a> {
    Generic(&'a ProducerChannel<Utf8Codec>),
    SchemaBased(&'a ProducerChannel<AvroCodec>),
}

impl<'a> Channel<'a> {
    pub fn name(&self) -> ChannelName {
        match self {
            Channel::Generic(_) => ChannelName::Generic,
            Channel::SchemaBased(_) => ChannelName::SchemaBased,
        }
    }

    pub fn as_generic(&self) -> Option<&'a ProducerChannel<Utf8Codec>> {
        match *self {
            Channel::Generic(channel) => Some(channel),
            Channel::SchemaBased(_) => None,
        }
    }

    pub fn as_schema_based(&self) -> Option<&'a ProducerChannel<AvroCodec>> {
        match *self {
            Channel::SchemaBased(channel) => Some(channel),
            Channel::Generic(_) => None,
        }
    }
}

pub struct ProducerRegistry {
    generic: ProducerChannel<Utf8Codec>,
    schema_based: ProducerChannel<AvroCodec>,
}

impl ProducerRegistry {
    pub fn builder() -> ProducerRegistryBuilder {
        ProducerRegistryBuilder::default()
    }

    /// Builds both channels against the configured cluster and schema
    /// registry. Each channel gets its own librdkafka producer so channel
    /// overrides stay independent.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_observer(config, None)
    }

    /// Like [`from_config`](Self::from_config), installing `observer` on
    /// both channels.
    pub fn from_config_with_observer(
        config: &Config,
        observer: Option<Arc<dyn SendObserver>>,
    ) -> Result<Self> {
        config.validate()?;

        let generic = build_channel(config, ChannelName::Generic, &observer, |_| {
            Ok(EncodingProfile::generic())
        })?;

        let schema_based = build_channel(config, ChannelName::SchemaBased, &observer, |config| {
            let registry = Arc::new(HttpSchemaRegistry::new(&config.schema_registry)?);
            let mut codec =
                AvroCodec::new(registry).auto_register(config.schema_registry.auto_register);

            for (topic, path) in &config.schema_registry.value_schemas {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read schema file {:?}: {}", path, e))
                })?;
                let schema = Schema::parse_str(&raw).map_err(|e| {
                    Error::Config(format!("Invalid Avro schema in {:?}: {}", path, e))
                })?;
                codec = codec.with_topic_schema(topic.clone(), schema);
            }

            Ok(EncodingProfile::schema_based(codec))
        })?;

        info!(
            brokers = ?config.kafka.brokers,
            schema_registry = %config.schema_registry.url,
            observed = observer.is_some(),
            "Producer registry ready"
        );

        Ok(Self {
            generic,
            schema_based,
        })
    }

    /// Looks a channel up by name. Anything other than `"generic"` or
    /// `"schema-based"` fails with [`Error::UnknownChannel`].
    pub fn channel(&self, name: &str) -> Result<Channel<'_>> {
        Ok(match name.parse::<ChannelName>()? {
            ChannelName::Generic => Channel::Generic(&self.generic),
            ChannelName::SchemaBased => Channel::SchemaBased(&self.schema_based),
        })
    }

    pub fn generic(&self) -> &ProducerChannel<Utf8Codec> {
        &self.generic
    }

    pub fn schema_based(&self) -> &ProducerChannel<AvroCodec> {
        &self.schema_based
    }

    /// Flushes both channels, reporting the first failure.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let generic = self.generic.flush(timeout);
        let schema_based = self.schema_based.flush(timeout);
        generic.and(schema_based)
    }
}

fn build_channel<C, F>(
    config: &Config,
    name: ChannelName,
    observer: &Option<Arc<dyn SendObserver>>,
    profile: F,
) -> Result<ProducerChannel<C>>
where
    C: crate::codec::ValueCodec,
    F: FnOnce(&Config) -> Result<EncodingProfile<C>>,
{
    let transport = KafkaTransport::new(&config.client_properties(name), config.message_timeout())?;
    let topology = MetadataTopology::new(transport.producer().clone(), config.metadata_max_age());

    let channel = ProducerChannel::new(profile(config)?, Arc::new(topology), Arc::new(transport));
    Ok(match observer {
        Some(observer) => channel.with_observer(observer.clone()),
        None => channel,
    })
}

/// Assembles a registry from already-built channels.
#[derive(Default)]
pub struct ProducerRegistryBuilder {
    generic: Option<ProducerChannel<Utf8Codec>>,
    schema_based: Option<ProducerChannel<AvroCodec>>,
    observer: Option<Arc<dyn SendObserver>>,
}

impl ProducerRegistryBuilder {
    pub fn generic(mut self, channel: ProducerChannel<Utf8Codec>) -> Self {
        self.generic = Some(channel);
        self
    }

    pub fn schema_based(mut self, channel: ProducerChannel<AvroCodec>) -> Self {
        self.schema_based = Some(channel);
        self
    }

    /// Installs `observer` on every channel.
    pub fn observer(mut self, observer: Arc<dyn SendObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<ProducerRegistry> {
        let mut generic = self
            .generic
            .ok_or_else(|| Error::Config("Missing 'generic' channel".to_string()))?;
        let mut schema_based = self
            .schema_based
            .ok_or_else(|| Error::Config("Missing 'schema-based' channel".to_string()))?;

        if let Some(observer) = self.observer {
            generic = generic.with_observer(observer.clone());
            schema_based = schema_based.with_observer(observer);
        }

        Ok(ProducerRegistry {
            generic,
            schema_based,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        for name in ChannelName::ALL {
            assert_eq!(name.as_str().parse::<ChannelName>().unwrap(), name);
            assert_eq!(name.to_string(), name.as_str());
        }
    }

    #[test]
    fn test_unknown_channel_name() {
        for name in ["unknown", "Generic", "schema_based", ""] {
            let err = name.parse::<ChannelName>().unwrap_err();
            assert!(matches!(err, Error::UnknownChannel(ref n) if n == name));
        }
    }

    #[test]
    fn test_builder_requires_both_channels() {
        let err = ProducerRegistry::builder().build().err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
