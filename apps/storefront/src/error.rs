//! # API Error Type
//!
//! Unified error type for storefront commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Storefront                         │
//! │                                                                         │
//! │  dokan cart add p1 --size M                                             │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Validation Error? ─── ValidationError::Required ──┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Backend Error? ─────── SyncError::Rejected ────── ApiError ────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  text mode:  Command failed: [VALIDATION_ERROR] size is required        │
//! │  --json:     { "code": "VALIDATION_ERROR", "message": "..." }           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Checkout has its own [`CheckoutError`] so callers can tell a refused draft
//! from a failed submission and from a double submit.

use serde::Serialize;
use thiserror::Error;

use dokan_core::{CoreError, ValidationError};
use dokan_db::DbError;
use dokan_sync::SyncError;

/// API error returned from storefront commands.
///
/// ## Serialization
/// This is what `--json` prints when a command fails:
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Product not found: p-123"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found
    NotFound,

    /// Input validation failed; nothing was sent
    ValidationError,

    /// Local storage failed
    DatabaseError,

    /// Command needs a signed-in session
    NotAuthenticated,

    /// Account exists but was created by a guest order and has no password
    PasswordNotSet,

    /// Backend answered and said no
    Rejected,

    /// Backend could not be reached or failed; retrying may help
    NetworkError,

    /// An order submission is already in flight
    AlreadySubmitting,

    /// Configuration could not be loaded or is invalid
    ConfigError,

    /// Internal error
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::NotAuthenticated => "NOT_AUTHENTICATED",
            ErrorCode::PasswordNotSet => "PASSWORD_NOT_SET",
            ErrorCode::Rejected => "REJECTED",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::AlreadySubmitting => "ALREADY_SUBMITTING",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Result alias for command and state functions.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn not_authenticated() -> Self {
        ApiError::new(ErrorCode::NotAuthenticated, "Sign in first")
    }

    pub fn config(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ConfigError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::CorruptValue { key, reason } => {
                tracing::error!(key = %key, "Corrupt local slot: {}", reason);
                ApiError::new(ErrorCode::DatabaseError, format!("Local data for '{}' is unreadable", key))
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::UnknownDeliveryZone(zone) => {
                ApiError::config(format!("Unknown delivery zone: {}", zone))
            }
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts backend errors to API errors.
impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        if err.is_password_not_set() {
            return ApiError::new(ErrorCode::PasswordNotSet, err.to_string());
        }
        match err {
            SyncError::NotAuthenticated => ApiError::not_authenticated(),
            SyncError::Rejected { message, .. } => ApiError::new(ErrorCode::Rejected, message),
            SyncError::DatabaseError(e) => {
                tracing::error!("Database error during sync: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            e if e.is_config_error() => ApiError::config(e.to_string()),
            e if e.is_retryable() => ApiError::new(ErrorCode::NetworkError, e.to_string()),
            e => ApiError::internal(e.to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Checkout Error
// =============================================================================

/// Why an order was not placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The draft failed validation; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend refused the order or could not be reached. The draft and
    /// its source are untouched.
    #[error("Order was not placed: {0}")]
    Submission(#[from] SyncError),

    /// Another submission is still pending.
    #[error("An order is already being placed")]
    AlreadySubmitting,

    /// Local storage failed before the order was sent.
    #[error(transparent)]
    Storage(#[from] DbError),
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(e) => e.into(),
            CheckoutError::Submission(e) => {
                let mut api: ApiError = e.into();
                api.message = format!("Order was not placed: {}", api.message);
                api
            }
            CheckoutError::AlreadySubmitting => ApiError::new(
                ErrorCode::AlreadySubmitting,
                "An order is already being placed",
            ),
            CheckoutError::Storage(e) => e.into(),
        }
    }
}
