//! # Error Types
//!
//! Domain-specific error types for fuelpos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fuelpos-core errors (this file)                                       │
//! │  ├── CoreError        - Shape errors at the data-access boundary       │
//! │  └── ValidationError  - Field-level validation failures                │
//! │                                                                         │
//! │  fuelpos-db errors (separate crate)                                    │
//! │  └── DbError          - Local storage failures                         │
//! │                                                                         │
//! │  fuelpos-sync errors (separate crate)                                  │
//! │  └── DispatchError    - What UI code receives from the dispatcher      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DispatchError → UI                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while turning loosely-typed payloads into entities.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Payload is not a JSON object.
    #[error("Entity payload must be a JSON object, got {0}")]
    NotAnObject(String),

    /// Payload could not be converted into the requested entity type.
    #[error("Invalid {collection} entity: {reason}")]
    InvalidEntity { collection: String, reason: String },

    /// Collection name is not one of the tracked collections.
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Method name is not one of GET/POST/PUT/PATCH/DELETE.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// A read was described as a pending write.
    #[error("{0} requests are never queued")]
    NotAWrite(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidEntity error for a collection.
    pub fn invalid_entity(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidEntity {
            collection: collection.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when an entity built by calling code doesn't meet the
/// minimum shape the console relies on (ids, names, quantities).
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., float id, malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
