//! Error types for the XP ledger.

use thiserror::Error;

/// Main error type for ledger and store operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("No record for user {user_id} in guild {guild_id}")]
    RecordNotFound { user_id: String, guild_id: String },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Chart rendering failed: {0}")]
    Render(String),
}

impl LedgerError {
    /// Whether this error was raised by argument validation, before any
    /// store access took place.
    pub fn is_validation(&self) -> bool {
        matches!(self, LedgerError::InvalidArgument(_))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            LedgerError::Deserialization(e.to_string())
        } else {
            LedgerError::Serialization(e.to_string())
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(LedgerError::InvalidArgument("x".into()).is_validation());
        assert!(!LedgerError::Locked.is_validation());
        assert!(!LedgerError::RecordNotFound {
            user_id: "u".into(),
            guild_id: "g".into(),
        }
        .is_validation());
    }

    #[test]
    fn test_json_syntax_error_is_deserialization() {
        let err: LedgerError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, LedgerError::Deserialization(_)));
    }
}
