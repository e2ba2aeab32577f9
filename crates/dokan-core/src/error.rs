//! # Error Types
//!
//! Domain-specific error types for dokan-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dokan-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input rejected before anything runs            │
//! │                                                                         │
//! │  dokan-db errors                                                       │
//! │  └── DbError          - Local storage failures                         │
//! │                                                                         │
//! │  dokan-sync errors                                                     │
//! │  └── SyncError        - Backend / transport failures                   │
//! │                                                                         │
//! │  storefront app                                                        │
//! │  ├── CheckoutError    - Validation / submission / already pending      │
//! │  └── ApiError         - What the CLI prints (code + message)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id is not in the loaded catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A delivery table references a zone key it does not define.
    #[error("Unknown delivery zone: {0}")]
    UnknownDeliveryZone(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Each variant names the offending field using the wire name the front end
/// shows next to the input (`recipientName`, `addressLine1`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Invalid format (e.g. a phone number that is not a mobile number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// The field this error is about.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooShort { field, .. }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. } => field,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
