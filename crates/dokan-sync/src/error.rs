//! # Sync Error Types
//!
//! Error types for backend calls and the cart sync queue.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Backend             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Rejected               │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  (success: false)       │ │
//! │  │  ConfigLoad/Save│  │  Status (5xx)   │  │  NotAuthenticated       │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Storage      │  │    Protocol     │                              │
//! │  │                 │  │                 │                              │
//! │  │  DatabaseError  │  │  Serialization  │                              │
//! │  │                 │  │  Deserialization│                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transport errors are retryable; a rejection is the backend's final word.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error code the backend attaches to a login for an account created by
/// guest checkout that never chose a password.
pub const PASSWORD_NOT_SET: &str = "PASSWORD_NOT_SET";

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The backend could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    /// The backend answered with a server error.
    #[error("Backend error (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    // =========================================================================
    // Backend Errors
    // =========================================================================
    /// The backend processed the request and refused it.
    #[error("{message}")]
    Rejected {
        message: String,
        code: Option<String>,
    },

    /// The call needs a session token and none is stored.
    #[error("Not signed in")]
    NotAuthenticated,

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Unexpected response: {0}")]
    DeserializationFailed(String),

    // =========================================================================
    // Storage / Internal
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Sync processor is shutting down")]
    ShuttingDown,

    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<dokan_db::DbError> for SyncError {
    fn from(err: dokan_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::DeserializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout
        } else if err.is_connect() {
            SyncError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            SyncError::DeserializationFailed(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            SyncError::Http(err.to_string())
        }
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
    pub fn rejected(message: impl Into<String>) -> Self {
        SyncError::Rejected {
            message: message.into(),
            code: None,
        }
    }

    /// Returns true if the same request may succeed later.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - Server errors (5xx) and rate limiting (429)
    ///
    /// ## Non-Retryable Errors
    /// - Rejections (`success: false`, 4xx)
    /// - Configuration and protocol errors
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout | SyncError::Http(_) => true,
            SyncError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// The backend's machine-readable code, when it sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            SyncError::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Login refused because the account has no password yet.
    pub fn is_password_not_set(&self) -> bool {
        self.code() == Some(PASSWORD_NOT_SET)
    }
}
