//! Opaque identifier exposure at the service boundary.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
#[error("invalid identifier: {0}")]
pub struct CodecError(pub String);

/// Bijective encode/decode of storage ids for external exposure.
///
/// The concrete obfuscation scheme belongs to the embedding application;
/// the engine only requires that `decode(encode(id)) == id` and that decode
/// rejects values it did not produce.
pub trait IdCodec: Send + Sync {
    fn encode(&self, id: Uuid) -> String;
    fn decode(&self, value: &str) -> Result<Uuid, CodecError>;
}

/// Passthrough codec exposing hyphenated UUID strings.
#[derive(Default, Clone, Copy, Debug)]
pub struct PlainIdCodec;

impl IdCodec for PlainIdCodec {
    fn encode(&self, id: Uuid) -> String {
        id.to_string()
    }

    fn decode(&self, value: &str) -> Result<Uuid, CodecError> {
        Uuid::parse_str(value).map_err(|_| CodecError(value.to_string()))
    }
}
