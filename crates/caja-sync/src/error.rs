//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Remote      │  │       Mapping           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Transport      │  │  MissingField           │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  InvalidField           │ │
//! │  │  ConfigLoad/Save│  │  Status(code)   │  │  UnresolvedLink         │ │
//! │  └─────────────────┘  │  Decode         │  │  SerializationFailed    │ │
//! │                       └─────────────────┘  └─────────────────────────┘ │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐ │
//! │  │    Database     │  │      Internal                               │ │
//! │  │  DatabaseError  │  │  UnitPanicked, ShuttingDown, ChannelError   │ │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type alias for calls against the remote ERP.
pub type RemoteResult<T> = Result<T, RemoteError>;

// =============================================================================
// Remote Error
// =============================================================================

/// Failure of a single call against the remote ERP.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    /// The request never produced a response (DNS, TCP, TLS).
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    /// The ERP answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not the JSON shape we expect.
    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// Transport failures, timeouts, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport(_) | RemoteError::Timeout => true,
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Decode(_) | RemoteError::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for RemoteError {
    fn from(err: url::ParseError) -> Self {
        RemoteError::InvalidUrl(err.to_string())
    }
}

// =============================================================================
// Sync Error
// =============================================================================

/// Sync error type covering all possible sync failures.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Errors are categorized for different handling strategies
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid remote URL.
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    // =========================================================================
    // Mapping Errors
    // =========================================================================
    /// A remote record lacks a field we need.
    #[error("{doc_type} record is missing '{field}'")]
    MissingField { doc_type: String, field: String },

    /// A remote field has a value we cannot interpret.
    #[error("{doc_type} field '{field}' is invalid: {reason}")]
    InvalidField {
        doc_type: String,
        field: String,
        reason: String,
    },

    /// A document links to a local document the ERP has not acknowledged yet.
    #[error("{doc_type} {name} has not been synced yet")]
    UnresolvedLink { doc_type: String, name: String },

    /// Failed to serialize or deserialize a payload.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database query failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// A unit panicked; the panic was caught at the unit boundary.
    #[error("Sync unit panicked: {0}")]
    UnitPanicked(String),

    /// Internal sync agent error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Agent is shutting down.
    #[error("Sync agent is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<caja_db::DbError> for SyncError {
    fn from(err: caja_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if this error is recoverable and the operation can be retried.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - HTTP 429 and 5xx answers
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - ERP validation rejections (4xx)
    /// - Mapping failures
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    pub(crate) fn missing(doc_type: impl Into<String>, field: impl Into<String>) -> Self {
        SyncError::MissingField {
            doc_type: doc_type.into(),
            field: field.into(),
        }
    }

    pub(crate) fn invalid(
        doc_type: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SyncError::InvalidField {
            doc_type: doc_type.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Remote(RemoteError::Timeout).is_retryable());
        assert!(SyncError::Remote(RemoteError::Transport("reset".into())).is_retryable());
        assert!(SyncError::Remote(RemoteError::Status {
            status: 503,
            message: "unavailable".into()
        })
        .is_retryable());
        assert!(SyncError::Remote(RemoteError::Status {
            status: 429,
            message: "slow down".into()
        })
        .is_retryable());

        assert!(!SyncError::Remote(RemoteError::Status {
            status: 417,
            message: "ValidationError".into()
        })
        .is_retryable());
        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::DatabaseError("locked".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("ftp://x".into()).is_config_error());
        assert!(!SyncError::Remote(RemoteError::Timeout).is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::UnresolvedLink {
            doc_type: "Sales Order".into(),
            name: "LOCAL-SO-abc".into(),
        };
        assert_eq!(err.to_string(), "Sales Order LOCAL-SO-abc has not been synced yet");
    }
}
