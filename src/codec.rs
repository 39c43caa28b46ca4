//! Value codecs.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Capability set every stored value type must have.
///
/// Equality is structural: change detection compares decoded values, never
/// encoded bytes.
pub trait StoreValue: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync + 'static {}

impl<T> StoreValue for T where
    T: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync + 'static
{
}

/// Converts values to and from the blobs a byte store holds.
///
/// Codecs are pure and stateless. A decode error is never fatal to the
/// caller; it means "no usable data".
pub trait Codec: Send + Sync + 'static {
    /// Encode a value.
    fn encode<V: Serialize>(&self, value: &V) -> Result<Vec<u8>>;

    /// Decode a value previously produced by [`Codec::encode`].
    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V>;
}

/// JSON codec on top of `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<V: Serialize>(&self, value: &V) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
