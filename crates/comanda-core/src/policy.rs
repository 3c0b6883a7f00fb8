//! # Edit Policy
//!
//! One function decides which order fields a role may edit at a given
//! order status. Every mutation entry point in the persistence layer
//! consults this module instead of carrying its own permission checks.
//!
//! ## Matrix
//! ```text
//! status \ field   Lines  Notes  Customer  Payment  Table  Waiter  Status
//! ---------------  -----  -----  --------  -------  -----  ------  ------
//! active, waiter     x      x       x         x       -      -       -
//! active, cashier    x      x       x         x       x      x       x
//! active, super      x      x       x         x       x      x       x
//! Paid / Cancelled   -      -       x         -       -      -       -
//! ```
//! "active" = Pending, InPreparation, Ready.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::order::OrderStatus;
use crate::types::StaffRole;

/// Editable parts of an order, as seen by the permission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    /// Line items (add, edit, remove).
    Lines,
    /// General notes.
    Notes,
    /// Customer identity fields (invoice data).
    Customer,
    /// Payment method and proof image.
    Payment,
    /// Table assignment.
    Table,
    /// Waiter assignment.
    Waiter,
    /// Order status.
    Status,
}

/// Whether `role` may edit `field` while the order is in `status`.
pub fn can_edit(role: StaffRole, status: OrderStatus, field: OrderField) -> bool {
    // Terminal orders only accept invoice corrections.
    if status.is_terminal() {
        return field == OrderField::Customer;
    }

    match field {
        // Assignment and status fields are off-limits for waiters.
        OrderField::Table | OrderField::Waiter | OrderField::Status => {
            matches!(role, StaffRole::Cashier | StaffRole::Superuser)
        }
        OrderField::Lines | OrderField::Notes | OrderField::Customer | OrderField::Payment => true,
    }
}

/// Policy check that produces the domain error on refusal.
pub fn ensure_can_edit(role: StaffRole, status: OrderStatus, field: OrderField) -> CoreResult<()> {
    if can_edit(role, status, field) {
        Ok(())
    } else {
        Err(CoreError::EditForbidden {
            role,
            status,
            field,
        })
    }
}

/// Expense deletion is reserved for the superuser.
pub fn ensure_can_delete_expense(role: StaffRole) -> CoreResult<()> {
    if role == StaffRole::Superuser {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied {
            role,
            action: "delete expenses".to_string(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_FIELDS: [OrderField; 7] = [
        OrderField::Lines,
        OrderField::Notes,
        OrderField::Customer,
        OrderField::Payment,
        OrderField::Table,
        OrderField::Waiter,
        OrderField::Status,
    ];

    const ALL_ROLES: [StaffRole; 3] = [StaffRole::Waiter, StaffRole::Cashier, StaffRole::Superuser];

    const ACTIVE_STATUSES: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::InPreparation,
        OrderStatus::Ready,
    ];

    #[test]
    fn test_paid_order_freezes_everything_but_customer() {
        for role in ALL_ROLES {
            for field in ALL_FIELDS {
                let expected = field == OrderField::Customer;
                assert_eq!(
                    can_edit(role, OrderStatus::Paid, field),
                    expected,
                    "{role:?} {field:?}"
                );
            }
        }
    }

    #[test]
    fn test_cancelled_behaves_like_paid() {
        assert!(!can_edit(
            StaffRole::Superuser,
            OrderStatus::Cancelled,
            OrderField::Lines
        ));
        assert!(can_edit(
            StaffRole::Superuser,
            OrderStatus::Cancelled,
            OrderField::Customer
        ));
    }

    #[test]
    fn test_waiter_restrictions_on_active_orders() {
        for status in ACTIVE_STATUSES {
            assert!(can_edit(StaffRole::Waiter, status, OrderField::Lines));
            assert!(can_edit(StaffRole::Waiter, status, OrderField::Notes));
            assert!(can_edit(StaffRole::Waiter, status, OrderField::Customer));
            assert!(!can_edit(StaffRole::Waiter, status, OrderField::Table));
            assert!(!can_edit(StaffRole::Waiter, status, OrderField::Waiter));
            assert!(!can_edit(StaffRole::Waiter, status, OrderField::Status));
        }
    }

    #[test]
    fn test_cashier_unrestricted_on_active_orders() {
        for field in ALL_FIELDS {
            assert!(can_edit(StaffRole::Cashier, OrderStatus::Pending, field));
            assert!(can_edit(StaffRole::Superuser, OrderStatus::Ready, field));
        }
    }

    #[test]
    fn test_ensure_can_edit_error() {
        let err =
            ensure_can_edit(StaffRole::Waiter, OrderStatus::Pending, OrderField::Status)
                .unwrap_err();
        assert!(matches!(err, CoreError::EditForbidden { .. }));
    }

    #[test]
    fn test_expense_deletion_gate() {
        assert!(ensure_can_delete_expense(StaffRole::Superuser).is_ok());
        assert!(ensure_can_delete_expense(StaffRole::Cashier).is_err());
        assert!(ensure_can_delete_expense(StaffRole::Waiter).is_err());
    }
}
