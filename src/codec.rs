//! Encoding profiles: how a channel turns `(key, value)` into bytes.
//!
//! Keys are always user ids written as 8-byte big-endian integers. The
//! value codec is what distinguishes one profile from another.

use crate::schema::AvroCodec;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// Width of an encoded key.
pub const KEY_WIDTH: usize = 8;

pub fn encode_key(key: i64) -> Bytes {
    Bytes::copy_from_slice(&key.to_be_bytes())
}

pub fn decode_key(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; KEY_WIDTH] = bytes.try_into().map_err(|_| {
        Error::Encoding(format!(
            "Key must be {} bytes, got {}",
            KEY_WIDTH,
            bytes.len()
        ))
    })?;
    Ok(i64::from_be_bytes(raw))
}

/// Converts record values to and from their wire form.
///
/// `topic` is passed through because some codecs (schema-registry ones)
/// resolve their schema per topic.
#[async_trait]
pub trait ValueCodec: Send + Sync {
    type Value: Send + Sync;

    async fn encode(&self, topic: &str, value: &Self::Value) -> Result<Bytes>;

    async fn decode(&self, topic: &str, payload: &[u8]) -> Result<Self::Value>;
}

/// Plain UTF-8 text values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

#[async_trait]
impl ValueCodec for Utf8Codec {
    type Value = String;

    async fn encode(&self, _topic: &str, value: &String) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }

    async fn decode(&self, _topic: &str, payload: &[u8]) -> Result<String> {
        String::from_utf8(payload.to_vec())
            .map_err(|e| Error::Encoding(format!("Value is not valid UTF-8: {}", e)))
    }
}

/// A named pairing of the user-id key codec with one value codec.
#[derive(Debug)]
pub struct EncodingProfile<C> {
    name: &'static str,
    value_codec: C,
}

impl EncodingProfile<Utf8Codec> {
    pub fn generic() -> Self {
        Self {
            name: crate::registry::ChannelName::Generic.as_str(),
            value_codec: Utf8Codec,
        }
    }
}

impl EncodingProfile<AvroCodec> {
    pub fn schema_based(codec: AvroCodec) -> Self {
        Self {
            name: crate::registry::ChannelName::SchemaBased.as_str(),
            value_codec: codec,
        }
    }
}

impl<C: ValueCodec> EncodingProfile<C> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value_codec(&self) -> &C {
        &self.value_codec
    }

    pub fn encode_key(&self, key: i64) -> Bytes {
        encode_key(key)
    }

    pub fn decode_key(&self, bytes: &[u8]) -> Result<i64> {
        decode_key(bytes)
    }

    pub async fn encode_value(&self, topic: &str, value: &C::Value) -> Result<Bytes> {
        self.value_codec.encode(topic, value).await
    }

    pub async fn decode_value(&self, topic: &str, payload: &[u8]) -> Result<C::Value> {
        self.value_codec.decode(topic, payload).await
    }
}
