//! # Validation Module
//!
//! Field-level validators shared by the draft aggregate and the
//! repository entry points. Business rules (status machine, edit policy)
//! live in [`crate::order`] and [`crate::policy`]; this module only
//! rejects malformed input before any of that runs.

use crate::error::ValidationError;
use crate::{MAX_LINE_QUANTITY, MAX_ORDER_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, customer, table label).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }
    Ok(())
}

/// Validates a customer tax id (cedula/RUC): digits only, at most 13
/// characters.
pub fn validate_tax_id(value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: "tax_id".to_string(),
        });
    }
    if value.len() > 13 {
        return Err(ValidationError::TooLong {
            field: "tax_id".to_string(),
            max: 13,
        });
    }
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "tax_id".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }
    Ok(())
}

/// Shallow e-mail shape check; real deliverability is the mailer's
/// problem.
pub fn validate_email(value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }
    let Some((local, domain)) = value.split_once('@') else {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "missing @".to_string(),
        });
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "malformed address".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line-item quantity.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a monetary amount that must be strictly positive
/// (expense amounts, opening floats may be zero and use their own
/// check).
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a non-negative amount (opening float).
pub fn validate_non_negative_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a floor-plan coordinate (percentage, 0..=90 so the shape
/// stays inside the map).
pub fn validate_position(field: &str, value: i64) -> ValidationResult<()> {
    if !(0..=90).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 90,
        });
    }
    Ok(())
}

/// Validates a draft line count against the order cap.
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Ceviche Mixto").is_ok());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_tax_id() {
        assert!(validate_tax_id("9999999999").is_ok());
        assert!(validate_tax_id("1712345678001").is_ok());
        assert!(validate_tax_id("").is_err());
        assert!(validate_tax_id("12345678901234").is_err());
        assert!(validate_tax_id("17-1234567").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("juan@example.com").is_ok());
        assert!(validate_email("juan").is_err());
        assert!(validate_email("juan@").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("juan@localhost").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_positive_amount("amount", 500).is_ok());
        assert!(validate_positive_amount("amount", 0).is_err());
        assert!(validate_non_negative_amount("opening", 0).is_ok());
        assert!(validate_non_negative_amount("opening", -1).is_err());
    }

    #[test]
    fn test_validate_position() {
        assert!(validate_position("pos_x", 0).is_ok());
        assert!(validate_position("pos_x", 90).is_ok());
        assert!(validate_position("pos_x", 91).is_err());
        assert!(validate_position("pos_y", -5).is_err());
    }
}
