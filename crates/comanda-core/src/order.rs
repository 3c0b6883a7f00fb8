//! # Order Aggregate
//!
//! The order (ticket) and its line items, plus the status state machine.
//!
//! ## Lifecycle
//! ```text
//! Pending ──► InPreparation ──► Ready ──► Paid
//!    │              │             │
//!    │              │             │        (kitchen may jump
//!    └──────────────┴─────────────┴──► Cancelled    Pending ──► Ready)
//!
//! Paid and Cancelled are terminal.
//! ```
//!
//! Invariant: `total_cents == sum(line.quantity * line.unit_price_cents)`
//! over current lines. [`Order::recompute_total`] is the one place that
//! derives it; the persistence layer re-runs the same sum inside every
//! line-mutating transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::PaymentMethod;
use crate::{DEFAULT_CUSTOMER_NAME, DEFAULT_CUSTOMER_TAX_ID, MAX_LINE_QUANTITY, MAX_ORDER_LINES};

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Just created; waiting for the kitchen.
    Pending,
    /// Kitchen is working on it.
    InPreparation,
    /// Ready to serve / collect payment.
    Ready,
    /// Payment collected; lines are frozen.
    Paid,
    /// Cancelled without payment; kept for the ticket count.
    Cancelled,
}

impl OrderStatus {
    /// Whether no further transitions leave this status.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// State machine check. Forward-only within the kitchen flow,
    /// `Cancelled` reachable from every non-terminal status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, InPreparation) | (Pending, Ready) | (Pending, Paid) => true,
            (InPreparation, Ready) | (InPreparation, Paid) => true,
            (Ready, Paid) => true,
            (Pending, Cancelled) | (InPreparation, Cancelled) | (Ready, Cancelled) => true,
            _ => false,
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order ticket bound to one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Human-facing sequence number, unique among orders of the same
    /// calendar day and never reused. Assigned once at creation.
    pub ticket_number: i64,

    pub table_id: String,

    /// Username of the waiter who owns the ticket.
    pub waiter: String,

    pub status: OrderStatus,

    /// Derived: sum of line subtotals. Never written directly.
    pub total_cents: i64,

    /// Free-text general notes.
    pub notes: Option<String>,

    // Customer identity, defaulted to the generic walk-in customer.
    // Stays editable after payment for invoice corrections.
    pub customer_name: String,
    pub customer_tax_id: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,

    pub payment_method: PaymentMethod,

    /// Transfer receipt photo, when paid by transfer.
    pub payment_proof_path: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Returns the running total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Recomputes the total from the given current lines.
    ///
    /// Always a full recompute from source, never an incremental
    /// adjustment.
    pub fn recompute_total(&mut self, lines: &[OrderLine]) {
        self.total_cents = lines.iter().map(|l| l.subtotal_cents()).sum();
    }

    /// Applies a status transition, rejecting anything the state machine
    /// forbids.
    pub fn transition(&mut self, next: OrderStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

// =============================================================================
// Order Line
// =============================================================================

/// One product+quantity+price entry within an order.
///
/// `unit_price_cents` is captured at line-creation time: it defaults to
/// the catalog price of the moment and does not follow later catalog
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Per-line note ("sin cebolla", "salsa aparte", ...).
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    /// Derived subtotal: quantity x unit price.
    #[inline]
    pub fn subtotal_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents())
    }
}

// =============================================================================
// Customer Update
// =============================================================================

/// Partial update of the customer identity fields. Only the provided
/// fields change; used by the cashier at payment time and for invoice
/// corrections afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl CustomerUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.tax_id.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.address.is_none()
    }

    /// Applies the provided fields onto an order.
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(name) = &self.name {
            order.customer_name = name.clone();
        }
        if let Some(tax_id) = &self.tax_id {
            order.customer_tax_id = tax_id.clone();
        }
        if let Some(phone) = &self.phone {
            order.customer_phone = Some(phone.clone());
        }
        if let Some(email) = &self.email {
            order.customer_email = Some(email.clone());
        }
        if let Some(address) = &self.address {
            order.customer_address = Some(address.clone());
        }
    }
}

// =============================================================================
// New Order (draft)
// =============================================================================

/// A line of a not-yet-persisted order.
///
/// `unit_price_cents: None` means "use the catalog price at persist
/// time".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: Option<i64>,
    pub note: Option<String>,
}

/// A new order being assembled by a waiter, before anything is written.
///
/// Lines merge by (product, note): adding the same dish with the same
/// note bumps the quantity instead of duplicating the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub table_id: String,
    pub waiter: String,
    pub notes: Option<String>,
    pub customer_name: String,
    pub customer_tax_id: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub payment_method: PaymentMethod,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    /// Creates an empty draft for a table, with walk-in customer
    /// defaults.
    pub fn new(table_id: impl Into<String>, waiter: impl Into<String>) -> Self {
        NewOrder {
            table_id: table_id.into(),
            waiter: waiter.into(),
            notes: None,
            customer_name: DEFAULT_CUSTOMER_NAME.to_string(),
            customer_tax_id: DEFAULT_CUSTOMER_TAX_ID.to_string(),
            customer_phone: None,
            customer_email: None,
            customer_address: None,
            payment_method: PaymentMethod::Pending,
            lines: Vec::new(),
        }
    }

    /// Adds a dish, merging with an existing line for the same product
    /// and note.
    pub fn add_line(
        &mut self,
        product_id: &str,
        quantity: i64,
        note: Option<&str>,
    ) -> CoreResult<()> {
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id && l.note.as_deref() == note)
        {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_LINE_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_LINE_QUANTITY,
                });
            }
            line.quantity = new_qty;
            return Ok(());
        }

        if quantity > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_LINE_QUANTITY,
            });
        }
        if self.lines.len() >= MAX_ORDER_LINES {
            return Err(CoreError::TooManyLines {
                max: MAX_ORDER_LINES,
            });
        }

        self.lines.push(NewOrderLine {
            product_id: product_id.to_string(),
            quantity,
            unit_price_cents: None,
            note: note.map(str::to_string),
        });
        Ok(())
    }

    /// Removes every line for a product.
    pub fn remove_product(&mut self, product_id: &str) {
        self.lines.retain(|l| l.product_id != product_id);
    }

    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Rejects drafts that cannot become a valid order: a missing table
    /// or an empty dish list. Nothing is persisted for an invalid draft.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "table".to_string(),
            });
        }
        if self.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            });
        }
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
