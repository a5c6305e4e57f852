//! # Validation Module
//!
//! Boundary validation for entities handed to the data-access layer.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Console forms                                                │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Entity construction (Rust)                                   │
//! │  ├── Type validation (deserialization into Product, Sale, ...)         │
//! │  └── THIS MODULE: id / name / quantity / price rules                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Upstream API                                                 │
//! │  └── Authoritative business rules                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fuelpos_core::validation::{validate_name, validate_quantity};
//!
//! validate_name("name", "Diesel").unwrap();
//! validate_quantity("qty", 2).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::EntityId;
use crate::{MAX_NAME_LENGTH, MAX_SALE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates an entity id.
///
/// ## Rules
/// - Text ids must not be blank
/// - Numeric ids must be positive
pub fn validate_entity_id(id: &EntityId) -> ValidationResult<()> {
    match id {
        EntityId::Text(s) if s.trim().is_empty() => Err(ValidationError::Required {
            field: "id".to_string(),
        }),
        EntityId::Number(n) if *n <= 0 => Err(ValidationError::MustBePositive {
            field: "id".to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, branch, outlet, customer...).
///
/// ## Example
/// ```rust
/// use fuelpos_core::validation::validate_name;
///
/// assert!(validate_name("name", "North Forecourt").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

/// Validates an optional email address.
///
/// Only the obvious shape is checked (`local@domain`); the server owns
/// deliverability.
pub fn validate_email(field: &str, email: Option<&str>) -> ValidationResult<()> {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(());
    };

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected local@domain".to_string(),
        }),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale quantity (units or whole litres).
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_SALE_QUANTITY
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_SALE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_SALE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price or amount in cents. Zero is allowed.
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a tank level against its capacity.
pub fn validate_tank_level(capacity_litres: i64, level_litres: i64) -> ValidationResult<()> {
    if capacity_litres <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "capacity_litres".to_string(),
        });
    }

    if level_litres < 0 || level_litres > capacity_litres {
        return Err(ValidationError::OutOfRange {
            field: "level_litres".to_string(),
            min: 0,
            max: capacity_litres,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_rules() {
        assert!(validate_entity_id(&EntityId::Number(1)).is_ok());
        assert!(validate_entity_id(&EntityId::Number(0)).is_err());
        assert!(validate_entity_id(&EntityId::Text("".into())).is_err());
        assert!(validate_entity_id(&EntityId::generate()).is_ok());
    }

    #[test]
    fn test_name_length_limit() {
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(matches!(
            validate_name("name", &long),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_email_is_optional() {
        assert!(validate_email("email", None).is_ok());
        assert!(validate_email("email", Some("")).is_ok());
        assert!(validate_email("email", Some("ops@fuel.example")).is_ok());
        assert!(validate_email("email", Some("not-an-email")).is_err());
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_quantity("qty", 2).is_ok());
        assert!(validate_quantity("qty", 0).is_err());
        assert!(validate_quantity("qty", MAX_SALE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_tank_level() {
        assert!(validate_tank_level(30_000, 12_500).is_ok());
        assert!(validate_tank_level(30_000, 30_001).is_err());
        assert!(validate_tank_level(0, 0).is_err());
    }
}
