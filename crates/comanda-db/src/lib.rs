//! # comanda-db: Database Layer for Comanda
//!
//! SQLite persistence for the Comanda restaurant POS, built on sqlx.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use comanda_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("comanda.db")).await?;
//!
//! let mut draft = comanda_core::NewOrder::new(table_id, "carlos");
//! draft.add_line(&product_id, 2, None)?;
//! let order = db.orders().create(&draft).await?;
//! ```
//!
//! Every multi-step mutation (order + lines, payment + sale snapshots,
//! reservation conversion) runs inside a single transaction; a failure
//! part-way leaves no partial state behind.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::DbError;
pub use pool::{Database, DbConfig};

pub use repository::attendance::{AttendanceDaySummary, AttendanceRepository, CheckIn};
pub use repository::expense::ExpenseRepository;
pub use repository::order::OrderRepository;
pub use repository::outbox::{OutboxRepository, TicketEmail};
pub use repository::product::ProductRepository;
pub use repository::register::{RegisterRepository, RegisterSummary};
pub use repository::report::ReportRepository;
pub use repository::reservation::{ConversionOutcome, ReservationRepository};
pub use repository::table::TableRepository;
