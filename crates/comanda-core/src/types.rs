//! # Domain Types
//!
//! Core domain types used throughout Comanda.
//!
//! Every entity carries a surrogate `id` (UUID v4 as TEXT) used for
//! database relations, plus any human-facing identifier it needs (table
//! number, ticket number). The order aggregate itself lives in
//! [`crate::order`].

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::LATE_CUTOFF;

// =============================================================================
// Staff Role
// =============================================================================

/// The acting staff member's role, supplied by the authentication
/// collaborator on every permission-checked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// Takes orders; may not reassign tables, staff, or status.
    Waiter,
    /// Collects payments, opens/closes the register.
    Cashier,
    /// Unrestricted; the only role allowed to delete expenses.
    Superuser,
}

// =============================================================================
// Product
// =============================================================================

/// Menu category. Normalized to an enum at write time; filtering is a
/// direct enum comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Drink,
    Rice,
    Soup,
    Extra,
    Other,
}

impl ProductCategory {
    /// Stock counts are only meaningful for these categories; kitchen
    /// dishes are made to order and never tracked.
    pub const fn is_stock_tracked(&self) -> bool {
        matches!(self, ProductCategory::Drink | ProductCategory::Extra)
    }
}

impl Default for ProductCategory {
    fn default() -> Self {
        ProductCategory::Other
    }
}

/// A product on the menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on the menu and on tickets.
    pub name: String,

    /// Menu category.
    pub category: ProductCategory,

    /// Price in cents.
    pub price_cents: i64,

    /// Current stock level. Only meaningful when the category is
    /// stock-tracked; edited manually by staff, never decremented by
    /// sales.
    pub stock: i64,

    /// Optional image path for the menu.
    pub image_path: Option<String>,

    /// Optional short description of the dish.
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Whether this product's stock level is meaningful.
    #[inline]
    pub fn tracks_stock(&self) -> bool {
        self.category.is_stock_tracked()
    }
}

// =============================================================================
// Dining Table
// =============================================================================

/// Floor a table sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Floor {
    Ground,
    Terrace,
}

/// Rendered shape on the floor-plan map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TableShape {
    Square,
    Round,
    Long,
}

impl Default for TableShape {
    fn default() -> Self {
        TableShape::Square
    }
}

/// A physical table. Pure data holder; position coordinates are
/// percentages (0..=90) used by the floor-plan layout tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DiningTable {
    pub id: String,
    /// Human-facing table number, unique across floors.
    pub number: i64,
    pub floor: Floor,
    pub capacity: i64,
    pub shape: TableShape,
    /// Distance from the left edge, percent.
    pub pos_x: i64,
    /// Distance from the top edge, percent.
    pub pos_y: i64,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How an order was (or will be) paid. `Pending` means no payment
/// recorded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pending,
    Cash,
    Transfer,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Pending
    }
}

// =============================================================================
// Sale Snapshot
// =============================================================================

/// Historical sale record, written once when an order is paid.
///
/// Snapshot pattern: product name and line total are frozen at payment
/// time so reports stay stable if the catalog changes later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Line total in cents (quantity x unit price at order time).
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub sold_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the line total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Register Session
// =============================================================================

/// Register session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum RegisterStatus {
    Open,
    Closed,
}

/// A cashier's open-to-close working period.
///
/// Invariant: at most one session is Open system-wide at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RegisterSession {
    pub id: String,
    /// Staff member operating the register.
    pub operator: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Opening float in cents.
    pub opening_cents: i64,
    /// Counted amount at close, in cents.
    pub closing_cents: Option<i64>,
    pub status: RegisterStatus,
}

impl RegisterSession {
    #[inline]
    pub fn opening_float(&self) -> Money {
        Money::from_cents(self.opening_cents)
    }
}

// =============================================================================
// Expense
// =============================================================================

/// Operating expense category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Suppliers,
    Utilities,
    Personnel,
    Maintenance,
    Other,
}

impl Default for ExpenseCategory {
    fn default() -> Self {
        ExpenseCategory::Other
    }
}

/// An operating expense recorded against today's register.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    pub id: String,
    /// Staff member who recorded the expense.
    pub staff: String,
    pub description: String,
    pub amount_cents: i64,
    pub category: ExpenseCategory,
    /// Optional receipt photo path.
    pub receipt_path: Option<String>,
    pub spent_at: DateTime<Utc>,
}

impl Expense {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Attendance
// =============================================================================

/// A daily check-in record. Date and entry time are set once at creation
/// and never updated; at most one record exists per employee per day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Attendance {
    pub id: String,
    pub employee: String,
    pub date: NaiveDate,
    pub entry_time: NaiveTime,
    /// Late-excuse note, if any.
    pub note: Option<String>,
}

impl Attendance {
    /// Whether the entry time is past the punctuality cutoff.
    pub fn is_late(&self) -> bool {
        let (h, m) = LATE_CUTOFF;
        self.entry_time > NaiveTime::from_hms_opt(h, m, 0).expect("valid cutoff")
    }
}

// =============================================================================
// Reservation
// =============================================================================

/// Reservation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Finalized,
}

impl Default for ReservationStatus {
    fn default() -> Self {
        ReservationStatus::Pending
    }
}

/// A table reservation, optionally carrying pre-ordered dishes.
///
/// Invariant: once `attended` is true the reservation has been converted
/// into an order and must never convert again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reservation {
    pub id: String,
    pub customer_name: String,
    pub phone: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub table_id: String,
    pub party_size: i64,
    pub status: ReservationStatus,
    pub attended: bool,
    /// Special requests / decoration notes.
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A pre-ordered dish attached to a reservation. Owned exclusively by
/// the reservation; carries no price (conversion always uses the current
/// catalog price).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PreorderDish {
    pub id: String,
    pub reservation_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub note: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
