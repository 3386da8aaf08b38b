//! Value codecs.
//!
//! Backends store strings, so binary formats are base64-encoded on the way in.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors raised while encoding or decoding a cached value.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack encode: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decode: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Wire format for cached values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Plain JSON text, readable with any Redis client.
    #[default]
    Json,
    /// MessagePack, base64-encoded for string-valued backends.
    #[serde(alias = "messagepack")]
    Msgpack,
}

impl Codec {
    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<String, CodecError> {
        match self {
            Codec::Json => Ok(serde_json::to_string(value)?),
            Codec::Msgpack => {
                let bytes = rmp_serde::to_vec_named(value)?;
                Ok(STANDARD.encode(bytes))
            }
        }
    }

    pub fn decode<T: DeserializeOwned>(self, raw: &str) -> Result<T, CodecError> {
        match self {
            Codec::Json => Ok(serde_json::from_str(raw)?),
            Codec::Msgpack => {
                let bytes = STANDARD.decode(raw)?;
                Ok(rmp_serde::from_slice(&bytes)?)
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::Msgpack => "msgpack",
        }
    }
}
