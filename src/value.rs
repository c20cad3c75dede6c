use serde::{Serialize, de::DeserializeOwned};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::CacheError;

type JsonSerializerFn = Arc<dyn Fn() -> Result<serde_json::Value, CacheError> + Send + Sync>;

/// Type-erased payload that moves between tiers.
///
/// Tiers never see the caller's value type. In-process tiers keep the shared
/// typed value (`Typed`), remote tiers keep a JSON document (`Serialized`)
/// which they encode with their own [`CacheSerializer`](crate::CacheSerializer).
#[derive(Clone)]
pub enum CachedValue {
    /// For in-process tiers: the value behind an `Arc`, cloned by reference.
    ///
    /// The serializer allows conversion to `Serialized` when the value has to be
    /// written to a remote tier (set fan-out, backfill).
    Typed {
        value: Arc<dyn Any + Send + Sync>,
        serializer: Option<JsonSerializerFn>,
    },
    /// For remote tiers: the value as a JSON document.
    Serialized(serde_json::Value),
}

/// Storage mode preference for tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Tier prefers typed values (in-memory tiers).
    Typed,
    /// Tier prefers serialized values (remote tiers).
    Serialized,
}

impl fmt::Debug for CachedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachedValue::Typed { serializer, .. } => f
                .debug_struct("Typed")
                .field("serializable", &serializer.is_some())
                .finish_non_exhaustive(),
            CachedValue::Serialized(data) => f.debug_tuple("Serialized").field(data).finish(),
        }
    }
}

impl CachedValue {
    /// Wrap a typed value without serialization support.
    ///
    /// Such a value can only live in `Typed` tiers; converting it for a remote
    /// tier fails.
    pub fn from_typed<V>(value: V) -> Self
    where
        V: Send + Sync + 'static,
    {
        CachedValue::Typed {
            value: Arc::new(value),
            serializer: None,
        }
    }

    /// Wrap a typed value together with a serializer so it can be converted for
    /// remote tiers on demand.
    pub fn from_typed_with_serializer<V>(value: V) -> Self
    where
        V: Serialize + Send + Sync + 'static,
    {
        let value_arc = Arc::new(value);
        let value_for_serializer = value_arc.clone();

        let serializer: JsonSerializerFn = Arc::new(move || {
            serde_json::to_value(value_for_serializer.as_ref())
                .map_err(|e| CacheError::Serialization(format!("Serialization failed: {}", e)))
        });

        CachedValue::Typed {
            value: value_arc,
            serializer: Some(serializer),
        }
    }

    /// Wrap an already serialized JSON document.
    pub fn from_serialized(data: serde_json::Value) -> Self {
        CachedValue::Serialized(data)
    }

    /// Convert into the caller's value type.
    ///
    /// - `Typed`: downcasts and clones the shared value
    /// - `Serialized`: deserializes the JSON document
    pub fn into_typed<V>(self) -> Result<V, CacheError>
    where
        V: Clone + DeserializeOwned + Send + Sync + 'static,
    {
        match self {
            CachedValue::Typed { value, .. } => {
                let typed_arc = value
                    .downcast::<V>()
                    .map_err(|_| CacheError::Serialization("Type downcast failed".to_string()))?;
                Ok((*typed_arc).clone())
            }
            CachedValue::Serialized(data) => serde_json::from_value(data)
                .map_err(|e| CacheError::Serialization(format!("Deserialization failed: {}", e))),
        }
    }

    /// Produce the JSON document for this value.
    ///
    /// Fails for a `Typed` value created without a serializer.
    pub fn to_json(&self) -> Result<serde_json::Value, CacheError> {
        match self {
            CachedValue::Serialized(data) => Ok(data.clone()),
            CachedValue::Typed {
                serializer: Some(ser),
                ..
            } => ser(),
            CachedValue::Typed {
                serializer: None, ..
            } => Err(CacheError::Serialization(
                "Cannot serialize Typed value: no serializer available".to_string(),
            )),
        }
    }

    /// Convert the value to match the target storage mode.
    ///
    /// `Serialized` values are kept as-is for `Typed` tiers; the reader
    /// deserializes them on the way out.
    pub fn convert_for_mode(self, target_mode: StorageMode) -> Result<Self, CacheError> {
        match (&self, target_mode) {
            (CachedValue::Typed { .. }, StorageMode::Serialized) => {
                Ok(CachedValue::Serialized(self.to_json()?))
            }
            _ => Ok(self),
        }
    }

    /// Returns the storage mode this value is currently in.
    pub fn mode(&self) -> StorageMode {
        match self {
            CachedValue::Typed { .. } => StorageMode::Typed,
            CachedValue::Serialized(_) => StorageMode::Serialized,
        }
    }
}
