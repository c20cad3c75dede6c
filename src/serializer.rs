use serde_json::Value;

use crate::error::CacheError;

/// Codec used by remote tiers to turn JSON documents into stored strings.
///
/// `deserialize(serialize(v))` must return `v`.
pub trait CacheSerializer: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<String, CacheError>;

    fn deserialize(&self, data: &str) -> Result<Value, CacheError>;
}

/// Compact JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl CacheSerializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<String, CacheError> {
        serde_json::to_string(value)
            .map_err(|e| CacheError::Serialization(format!("Serialization failed: {}", e)))
    }

    fn deserialize(&self, data: &str) -> Result<Value, CacheError> {
        serde_json::from_str(data)
            .map_err(|e| CacheError::Serialization(format!("Deserialization failed: {}", e)))
    }
}

/// Hex-encodes the output of another serializer.
///
/// Keeps stored payloads to `[0-9A-F]`, for stores or tooling that mangle
/// arbitrary text.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexSerializer<S = JsonSerializer> {
    inner: S,
}

impl<S> HexSerializer<S> {
    pub fn new(inner: S) -> Self {
        HexSerializer { inner }
    }
}

impl<S: CacheSerializer> CacheSerializer for HexSerializer<S> {
    fn serialize(&self, value: &Value) -> Result<String, CacheError> {
        let inner = self.inner.serialize(value)?;
        Ok(hex::encode_upper(inner.as_bytes()))
    }

    fn deserialize(&self, data: &str) -> Result<Value, CacheError> {
        if data.len() % 2 != 0 {
            return Err(CacheError::Serialization(
                "Data is corrupt, it should contain 2*n amount of chars".to_string(),
            ));
        }
        let bytes = hex::decode(data)
            .map_err(|e| CacheError::Serialization(format!("Data is corrupt: {}", e)))?;
        let inner = String::from_utf8(bytes)
            .map_err(|e| CacheError::Serialization(format!("Data is corrupt: {}", e)))?;
        self.inner.deserialize(&inner)
    }
}
