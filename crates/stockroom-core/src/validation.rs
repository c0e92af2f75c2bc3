//! # Validation Module
//!
//! Input validation utilities for Stockroom.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Client (offline app)                                         │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Server handler (Rust)                                        │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: identifiers rejected before any store call           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  └── PRIMARY KEY constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Numeric inputs (price, stock, markup) are NOT validated here: malformed
//! values are coerced to defaults by the import planner instead of rejected.

use crate::error::ValidationError;
use crate::SHORT_CODE_DIGITS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID-shaped identifier.
///
/// ## Example
/// ```rust
/// use stockroom_core::validation::validate_uuid;
///
/// assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates an owner (account) id.
///
/// Owner ids are issued by the external account system, so only the shape
/// is checked: non-empty, at most 128 characters, no whitespace.
pub fn validate_owner_id(owner_id: &str) -> ValidationResult<()> {
    if owner_id.is_empty() {
        return Err(ValidationError::Required {
            field: "userId".to_string(),
        });
    }

    if owner_id.len() > 128 {
        return Err(ValidationError::TooLong {
            field: "userId".to_string(),
            max: 128,
        });
    }

    if owner_id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "userId".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 200 characters
///
/// ## Example
/// ```rust
/// use stockroom_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Brake Pad Front").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a three-letter currency code.
pub fn validate_currency(currency: &str) -> ValidationResult<()> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a 3-letter uppercase ISO code".to_string(),
        });
    }
    Ok(())
}

/// Returns true for a short code the dedup compares by code (exactly five
/// ASCII digits).
///
/// ## Example
/// ```rust
/// use stockroom_core::validation::is_short_code;
///
/// assert!(is_short_code("10042"));
/// assert!(!is_short_code("1004"));
/// assert!(!is_short_code("A1004"));
/// ```
pub fn is_short_code(code: &str) -> bool {
    code.len() == SHORT_CODE_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}

// =============================================================================
// Unit Tests
// =============================================================================
