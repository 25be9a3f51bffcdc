//! Serialization adapter
//!
//! Turns a typed value into envelope bytes and back, honouring the
//! compatibility contract: unknown fields are dropped, and missing fields
//! default when the target type opts in with `#[serde(default)]`.

use std::any::type_name;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, ShelfError};

use super::{open_envelope, seal_envelope, BodyFormat, SerializerRegistry};

/// MessagePack `nil`, what `None` and `()` encode to
const MSGPACK_NIL: u8 = 0xc0;

/// Pure value <-> bytes transform (no I/O)
#[derive(Clone, Default)]
pub struct Codec {
    registry: Arc<SerializerRegistry>,
}

impl Codec {
    pub fn new(registry: Arc<SerializerRegistry>) -> Self {
        Self { registry }
    }

    /// Encode a value into envelope bytes
    ///
    /// Uses the registered serializer for `T` if there is one, otherwise the
    /// structural encoder. A null root is rejected.
    pub fn encode<T: Serialize + 'static>(&self, value: &T) -> Result<Vec<u8>> {
        let (body_format, body) = match self.registry.get::<T>() {
            Some(custom) => (BodyFormat::Custom, custom.encode(value)?),
            None => {
                let body = rmp_serde::to_vec_named(value)
                    .map_err(|e| ShelfError::Serialization(e.to_string()))?;
                (BodyFormat::Structural, body)
            }
        };

        if body_format == BodyFormat::Structural && body == [MSGPACK_NIL] {
            return Err(ShelfError::Serialization(
                "Null root values cannot be written".to_string(),
            ));
        }

        seal_envelope(type_name::<T>(), body_format, &body)
    }

    /// Decode envelope bytes into the caller's target type
    ///
    /// Framing problems are `CorruptData`. Unknown fields are dropped and
    /// `#[serde(default)]` fields fill in whatever the stored shape lacks.
    pub fn decode<T: DeserializeOwned + 'static>(&self, bytes: &[u8]) -> Result<T> {
        let (header, body) = open_envelope(bytes)?;

        let requested = type_name::<T>();
        if header.type_name != requested {
            tracing::debug!(
                stored = %header.type_name,
                requested,
                "Decoding entry into a different type than it was written with"
            );
        }

        match header.body_format {
            BodyFormat::Structural => rmp_serde::from_slice(body).map_err(|e| {
                ShelfError::Serialization(format!(
                    "Stored '{}' cannot be read as '{}': {}",
                    header.type_name, requested, e
                ))
            }),
            BodyFormat::Custom => {
                let custom = self.registry.get::<T>().ok_or_else(|| {
                    ShelfError::Serialization(format!(
                        "Entry was written by a custom serializer but none is registered for '{}'",
                        requested
                    ))
                })?;
                custom.decode(body)
            }
        }
    }
}
