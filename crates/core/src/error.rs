//! Error types for DroidKit
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Main error type for DroidKit
#[derive(Error, Debug)]
pub enum DroidKitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload for a dispatch round could not be built from the raw event
    #[error("Payload derivation failed: {0}")]
    Derivation(String),

    /// A single observer rejected a notification
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// `dispatch` was called from inside a round of the same registry
    #[error("A dispatch round is already in progress on this thread")]
    DispatchInProgress,

    #[error("Unknown network interface: {0}")]
    UnknownInterface(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Receiver disconnected")]
    Disconnected,
}

/// Result type alias for DroidKit operations
pub type Result<T> = std::result::Result<T, DroidKitError>;

impl DroidKitError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DroidKitError::Delivery(_)
                | DroidKitError::Derivation(_)
                | DroidKitError::DispatchInProgress
                | DroidKitError::UnknownInterface(_)
                | DroidKitError::NotFound(_)
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            DroidKitError::Io(e) => format!("File operation failed: {}", e),
            DroidKitError::Config(msg) => format!("Configuration error: {}", msg),
            DroidKitError::UnknownInterface(name) => {
                format!("'{}' is not a recognised network interface", name)
            }
            DroidKitError::NotFound(key) => format!("No value stored under '{}'", key),
            DroidKitError::InvalidValue(msg) => format!("Invalid value: {}", msg),
            DroidKitError::Disconnected => "The listener is no longer receiving updates".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        assert!(DroidKitError::DispatchInProgress.is_recoverable());
        assert!(DroidKitError::Delivery("boom".into()).is_recoverable());
        assert!(!DroidKitError::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn test_user_message() {
        let err = DroidKitError::UnknownInterface("zz0".into());
        assert_eq!(err.user_message(), "'zz0' is not a recognised network interface");

        let err = DroidKitError::Store("locked".into());
        assert_eq!(err.user_message(), "Store error: locked");
    }
}
