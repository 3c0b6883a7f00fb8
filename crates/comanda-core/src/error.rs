//! # Error Types
//!
//! Domain errors for comanda-core. `CoreError` covers business rule
//! violations, `ValidationError` covers bad input caught before any
//! business logic runs. Database failures live in `comanda-db::DbError`.

use thiserror::Error;

use crate::order::OrderStatus;
use crate::policy::OrderField;
use crate::types::StaffRole;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested status change is not allowed by the state machine.
    ///
    /// No transition leaves `Paid` or `Cancelled`.
    #[error("Order cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The acting role may not edit this field at the order's current
    /// status (e.g. line edits on a paid order, a waiter reassigning a
    /// table).
    #[error("{role:?} may not edit {field:?} while order is {status:?}")]
    EditForbidden {
        role: StaffRole,
        status: OrderStatus,
        field: OrderField,
    },

    /// Order has exceeded the maximum allowed line items.
    #[error("Order cannot have more than {max} line items")]
    TooManyLines { max: usize },

    /// Line quantity exceeds the maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Only a superuser may perform this operation.
    #[error("{role:?} may not {action}")]
    PermissionDenied { role: StaffRole, action: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
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

    /// Invalid format (e.g. malformed e-mail address).
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
