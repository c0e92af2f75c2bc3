//! # Error Types
//!
//! Domain-specific error types for stockroom-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockroom-core errors (this file)                                     │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockroom-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Server errors (apps/server)                                           │
//! │  └── ApiError         - What the client sees (JSON)                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → Client                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row-local import problems are NOT errors at this level: the planner folds
//! them into the batch report. Only whole-request problems (unreadable sheet,
//! no name column) surface as `CoreError`.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Variant index or id does not exist on the product.
    #[error("Variant {variant} not found on product {product_id}")]
    VariantNotFound { product_id: String, variant: String },

    /// Explicit create collided with an existing entry or variant.
    ///
    /// ## When This Occurs
    /// - `POST /products` with a 5-digit code already in the owner's catalog
    /// - `POST /products` without such a code but with a name already in use
    ///
    /// Bulk import never raises this; it records a duplicate row instead.
    #[error("Duplicate {field} '{value}': already used by '{existing_name}' ({existing_id})")]
    DuplicateProduct {
        field: String,
        value: String,
        existing_id: String,
        existing_name: String,
    },

    /// Every sequential short code up to the widest allocatable one is taken.
    #[error("No short codes left to allocate")]
    CodesExhausted,

    /// The uploaded spreadsheet could not be read at all.
    #[error("Invalid spreadsheet: {0}")]
    InvalidSpreadsheet(String),

    /// The spreadsheet has no data rows.
    #[error("Spreadsheet contains no data rows")]
    EmptySpreadsheet,

    /// No column could be mapped to the product name.
    #[error("Spreadsheet has no name column; provide a column mapping")]
    MissingNameColumn,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before any store call.
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

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
