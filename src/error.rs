//! Error types and result handling for keyed-producer.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use keyed_producer::{Error, Result};
//!
//! fn lookup(name: &str) -> Result<()> {
//!     Err(Error::UnknownChannel(name.to_string()))
//! }
//!
//! match lookup("audit") {
//!     Ok(()) => println!("found"),
//!     Err(e) if e.is_retryable() => eprintln!("try again later: {}", e),
//!     Err(e) => eprintln!("giving up: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for keyed-producer operations.
///
/// Every failed send yields one of these variants so callers can tell
/// caller misuse and payload problems apart from environmental failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The topic is not known to the cluster topology.
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// The requested channel is not one of the configured set.
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// A topic reported zero partitions, or a partition index is beyond
    /// what librdkafka can address.
    #[error("Invalid partition count {count} for topic '{topic}'")]
    InvalidPartitionCount {
        /// Topic the count was reported for
        topic: String,
        /// The offending count
        count: u32,
    },

    /// Plain key or value encoding failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The payload does not conform to the registered schema, or the
    /// schema framing of a payload is malformed.
    #[error("Schema encoding error: {message}")]
    SchemaEncoding {
        /// Description of the mismatch
        message: String,
    },

    /// The schema registry could not be reached or answered with a
    /// server error.
    #[error("Schema registry unavailable: {message}")]
    SchemaRegistryUnavailable {
        /// Description of the failure
        message: String,
    },

    /// Kafka client or producer error, surfaced once librdkafka has
    /// exhausted its own retries.
    #[error("Transport error: {0}")]
    Transport(#[from] rdkafka::error::KafkaError),
}

impl Error {
    pub(crate) fn schema_encoding(message: impl Into<String>) -> Self {
        Error::SchemaEncoding {
            message: message.into(),
        }
    }

    pub(crate) fn registry_unavailable(message: impl Into<String>) -> Self {
        Error::SchemaRegistryUnavailable {
            message: message.into(),
        }
    }

    /// Returns `true` for environmental failures where retrying the same
    /// logical operation later may succeed.
    ///
    /// Caller misuse (`UnknownChannel`, `UnknownTopic`) and payload
    /// problems (`Encoding`, `SchemaEncoding`) are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SchemaRegistryUnavailable { .. } | Error::Transport(_)
        )
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

/// A convenient Result type alias for keyed-producer operations.
///
/// This is equivalent to `std::result::Result<T, keyed_producer::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
