//! Kafka producer channels with deterministic user-id partitioning.
//!
//! Records are keyed by a numeric user id and always sent to an explicit
//! partition, `user_id mod partition_count`, instead of the client's
//! default hash partitioner. Two channels are available: `generic` for
//! UTF-8 text values and `schema-based` for Avro values framed with a
//! schema registry id.

pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod observer;
pub mod partitioner;
pub mod registry;

pub mod kafka;
pub mod schema;

pub use channel::ProducerChannel;
pub use codec::{EncodingProfile, Utf8Codec, ValueCodec};
pub use config::Config;
pub use error::{Error, Result};
pub use kafka::DeliveryResult;
pub use observer::{SendContext, SendObserver};
pub use partitioner::{Partitioner, UserIdPartitioner};
pub use registry::{Channel, ChannelName, ProducerRegistry};
pub use schema::AvroCodec;
