/// Error type for cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// A tier operation failed.
    #[error("[{tier}] cache error for key '{key}': {message}")]
    Operation {
        tier: String,
        key: String,
        message: String,
    },
    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The dispatcher or one of its tiers is misconfigured.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The tier does not implement an optional capability.
    #[error("[{tier}] does not support {operation}")]
    Unsupported { tier: String, operation: String },
}

impl CacheError {
    /// Create a new operation error.
    pub fn operation(
        tier: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CacheError::Operation {
            tier: tier.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new unsupported-capability error.
    pub fn unsupported(tier: impl Into<String>, operation: impl Into<String>) -> Self {
        CacheError::Unsupported {
            tier: tier.into(),
            operation: operation.into(),
        }
    }
}
