//! Schema-agnostic record payloads.

use crate::error::{CoreError, CoreResult};
use serde::de::{self, DeserializeOwned, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The serialized body of a record.
///
/// The queue and the mirror never look inside a payload. Each consumer
/// decides the structure of its table's records and encodes them with
/// [`Payload::encode`] / [`Payload::decode`] (CBOR via serde).
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use tideline_core::Payload;
///
/// #[derive(Serialize, Deserialize, PartialEq, Debug)]
/// struct Setting {
///     value: String,
/// }
///
/// let payload = Payload::encode(&Setting { value: "dark".into() }).unwrap();
/// let setting: Setting = payload.decode().unwrap();
/// assert_eq!(setting.value, "dark");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Encodes a value as a payload.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Codec` if the value cannot be serialized.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> CoreResult<Self> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes).map_err(|e| CoreError::codec(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Decodes the payload into a value.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Codec` if the bytes do not describe a `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> CoreResult<T> {
        ciborium::from_reader(self.0.as_slice()).map_err(|e| CoreError::codec(e.to_string()))
    }

    /// Wraps already-serialized bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the serialized bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the payload, returning the serialized bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the serialized size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the payload holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_byte_buf(PayloadVisitor)
    }
}

struct PayloadVisitor;

impl<'de> Visitor<'de> for PayloadVisitor {
    type Value = Payload;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(Payload(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(Payload(v))
    }

    // Self-describing formats without a bytes type (JSON) hand us a sequence.
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.push(byte);
        }
        Ok(Payload(bytes))
    }
}
