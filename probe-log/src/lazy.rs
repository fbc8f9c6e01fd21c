//! Lazily validated event fields.
//!
//! Some event fields (notably a model event's output) are large and rarely
//! read. When a transcript is decoded, [`Lazy`] keeps the field in its raw
//! JSON form and builds the typed value on first access. The transition from
//! raw to decoded happens at most once per value, even with concurrent
//! readers, and a decode failure is remembered rather than retried.

use std::fmt;
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::DecodeError;

/// A field stored raw and decoded on first read.
#[derive(Clone)]
pub struct Lazy<T> {
    raw: Option<Value>,
    decoded: OnceLock<Result<T, DecodeError>>,
}

impl<T> Lazy<T> {
    /// Wrap an already-decoded value.
    pub fn new(value: T) -> Self {
        Self {
            raw: None,
            decoded: OnceLock::from(Ok(value)),
        }
    }

    /// Wrap a raw value to be decoded on first access.
    pub fn from_raw(raw: Value) -> Self {
        Self {
            raw: Some(raw),
            decoded: OnceLock::new(),
        }
    }

    /// Whether the typed value has been built (or failed to build).
    pub fn is_materialized(&self) -> bool {
        self.decoded.get().is_some()
    }

    /// The raw form, if this value came off the wire.
    pub fn raw(&self) -> Option<&Value> {
        self.raw.as_ref()
    }
}

impl<T: DeserializeOwned> Lazy<T> {
    /// The typed value, decoding it on first access.
    pub fn get(&self) -> Result<&T, DecodeError> {
        self.decoded
            .get_or_init(|| match &self.raw {
                Some(raw) => T::deserialize(raw).map_err(|e| DecodeError::field(e.to_string())),
                None => Err(DecodeError::field("no value")),
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl<T: fmt::Debug> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decoded.get() {
            Some(Ok(value)) => f.debug_tuple("Lazy").field(value).finish(),
            _ => f.debug_tuple("Lazy::Raw").field(&self.raw).finish(),
        }
    }
}

impl<T: PartialEq + DeserializeOwned> PartialEq for Lazy<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.get(), other.get()) {
            (Ok(a), Ok(b)) => a == b,
            (Err(_), Err(_)) => self.raw == other.raw,
            _ => false,
        }
    }
}

impl<T> From<T> for Lazy<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Serialize> Serialize for Lazy<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (self.decoded.get(), &self.raw) {
            (Some(Ok(value)), _) => value.serialize(serializer),
            (_, Some(raw)) => raw.serialize(serializer),
            (_, None) => serializer.serialize_none(),
        }
    }
}

impl<'de, T> Deserialize<'de> for Lazy<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_raw)
    }
}
