//! # Reservation Repository
//!
//! Reservations with optional pre-ordered dishes, and the conversion
//! that turns an arriving reservation into a live order.
//!
//! ## Conversion
//! ```text
//! convert_to_order(reservation_id, waiter)
//!     |
//!     +-- attended already?  -> AlreadyAttended (no-op, caller warns)
//!     |
//!     +-- else, one transaction:
//!           new Pending order on the reservation's table
//!           one line per pre-ordered dish, at the CURRENT catalog
//!             price (never a price remembered on the reservation)
//!           total recompute
//!           reservation: attended = true, status = Finalized
//!     |
//!     +-- returns the new order id for direct navigation
//! ```

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::order::recompute_total;
use comanda_core::validation::{validate_name, validate_quantity};
use comanda_core::{
    PreorderDish, Reservation, ReservationStatus, DEFAULT_CUSTOMER_TAX_ID,
};

const RESERVATION_COLUMNS: &str = "id, customer_name, phone, date, time, table_id, party_size, \
     status, attended, notes, created_at";

/// A dish pre-ordered with a reservation. No price: conversion always
/// prices at the catalog of the conversion moment.
#[derive(Debug, Clone)]
pub struct NewPreorderDish {
    pub product_id: String,
    pub quantity: i64,
    pub note: Option<String>,
}

/// Input for creating a reservation.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub customer_name: String,
    pub phone: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub table_id: String,
    pub party_size: i64,
    pub notes: Option<String>,
    pub dishes: Vec<NewPreorderDish>,
}

/// Result of a conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionOutcome {
    /// A new order was created.
    Converted { order_id: String },
    /// The reservation had already been converted; nothing changed.
    /// Surfaced to the user as a warning, not an error.
    AlreadyAttended,
}

/// Day rollup for the reservation dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationDaySummary {
    pub total: i64,
    pub persons: i64,
    pub pending: i64,
}

/// Repository for reservation database operations.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
}

impl ReservationRepository {
    /// Creates a new ReservationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReservationRepository { pool }
    }

    /// Creates a reservation with its pre-ordered dishes, in one
    /// transaction.
    pub async fn create(&self, new: NewReservation) -> DbResult<Reservation> {
        validate_name("customer_name", &new.customer_name)?;
        for dish in &new.dishes {
            validate_quantity(dish.quantity)?;
        }

        let reservation = Reservation {
            id: Uuid::new_v4().to_string(),
            customer_name: new.customer_name.trim().to_string(),
            phone: new.phone,
            date: new.date,
            time: new.time,
            table_id: new.table_id,
            party_size: new.party_size,
            status: ReservationStatus::Pending,
            attended: false,
            notes: new.notes,
            created_at: Utc::now(),
        };

        let mut tx = self.pool.begin().await?;

        let table_exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM dining_tables WHERE id = ?1")
                .bind(&reservation.table_id)
                .fetch_optional(&mut *tx)
                .await?;
        if table_exists.is_none() {
            return Err(DbError::not_found("Table", &reservation.table_id));
        }

        sqlx::query(
            r#"
            INSERT INTO reservations (
                id, customer_name, phone, date, time, table_id,
                party_size, status, attended, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', 0, ?8, ?9)
            "#,
        )
        .bind(&reservation.id)
        .bind(&reservation.customer_name)
        .bind(&reservation.phone)
        .bind(reservation.date)
        .bind(reservation.time)
        .bind(&reservation.table_id)
        .bind(reservation.party_size)
        .bind(&reservation.notes)
        .bind(reservation.created_at)
        .execute(&mut *tx)
        .await?;

        for dish in &new.dishes {
            sqlx::query(
                r#"
                INSERT INTO reservation_dishes (id, reservation_id, product_id, quantity, note)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&reservation.id)
            .bind(&dish.product_id)
            .bind(dish.quantity)
            .bind(&dish.note)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            reservation_id = %reservation.id,
            customer = %reservation.customer_name,
            dishes = new.dishes.len(),
            "Reservation created"
        );

        Ok(reservation)
    }

    /// Gets a reservation by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Reservation>> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1");
        let reservation = sqlx::query_as::<_, Reservation>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reservation)
    }

    /// Pre-ordered dishes of a reservation.
    pub async fn get_dishes(&self, reservation_id: &str) -> DbResult<Vec<PreorderDish>> {
        let dishes = sqlx::query_as::<_, PreorderDish>(
            "SELECT id, reservation_id, product_id, quantity, note \
             FROM reservation_dishes WHERE reservation_id = ?1",
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(dishes)
    }

    /// Changes a reservation's status (confirm, cancel).
    pub async fn set_status(&self, id: &str, status: ReservationStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE reservations SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Reservation", id));
        }
        Ok(())
    }

    /// Upcoming reservations from a date onward, not cancelled,
    /// soonest first.
    pub async fn upcoming(&self, from: NaiveDate, limit: u32) -> DbResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE date >= ?1 AND status != 'cancelled' \
             ORDER BY date, time LIMIT ?2"
        );
        let reservations = sqlx::query_as::<_, Reservation>(&sql)
            .bind(from)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(reservations)
    }

    /// Count / headcount / pending rollup for one day, cancelled
    /// excluded.
    pub async fn day_summary(&self, date: NaiveDate) -> DbResult<ReservationDaySummary> {
        let (total, persons): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(party_size), 0) FROM reservations \
             WHERE date = ?1 AND status != 'cancelled'",
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE date = ?1 AND status = 'pending'",
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(ReservationDaySummary {
            total,
            persons,
            pending,
        })
    }

    /// Converts an arriving reservation into a new `Pending` order.
    ///
    /// Idempotent: a reservation that already attended is a no-op
    /// returning [`ConversionOutcome::AlreadyAttended`]. Otherwise one
    /// transaction creates the order with one line per pre-ordered
    /// dish at the current catalog price, recomputes the total, and
    /// stamps the reservation `attended` / `Finalized`.
    pub async fn convert_to_order(
        &self,
        reservation_id: &str,
        waiter: &str,
    ) -> DbResult<ConversionOutcome> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1");
        let reservation = sqlx::query_as::<_, Reservation>(&sql)
            .bind(reservation_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Reservation", reservation_id))?;

        if reservation.attended {
            warn!(
                reservation_id = %reservation_id,
                customer = %reservation.customer_name,
                "Reservation already attended; conversion skipped"
            );
            return Ok(ConversionOutcome::AlreadyAttended);
        }

        let order_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, ticket_number, table_id, waiter, status, total_cents, notes,
                customer_name, customer_tax_id, customer_phone, customer_email,
                customer_address, payment_method, payment_proof_path,
                created_at, updated_at, paid_at
            ) VALUES (
                ?1, (SELECT COALESCE(MAX(ticket_number), 0) + 1 FROM orders),
                ?2, ?3, 'pending', 0, ?4,
                ?5, ?6, ?7, NULL,
                NULL, 'pending', NULL,
                ?8, ?8, NULL
            )
            "#,
        )
        .bind(&order_id)
        .bind(&reservation.table_id)
        .bind(waiter)
        .bind(&reservation.notes)
        .bind(&reservation.customer_name)
        .bind(DEFAULT_CUSTOMER_TAX_ID)
        .bind(&reservation.phone)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let dishes = sqlx::query_as::<_, PreorderDish>(
            "SELECT id, reservation_id, product_id, quantity, note \
             FROM reservation_dishes WHERE reservation_id = ?1",
        )
        .bind(reservation_id)
        .fetch_all(&mut *tx)
        .await?;

        for dish in &dishes {
            // Current catalog price, never a remembered one.
            let price: Option<i64> =
                sqlx::query_scalar("SELECT price_cents FROM products WHERE id = ?1")
                    .bind(&dish.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let price = price.ok_or_else(|| DbError::not_found("Product", &dish.product_id))?;

            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, product_id, quantity, unit_price_cents, note, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order_id)
            .bind(&dish.product_id)
            .bind(dish.quantity)
            .bind(price)
            .bind(&dish.note)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        recompute_total(&mut tx, &order_id, now).await?;

        sqlx::query(
            "UPDATE reservations SET attended = 1, status = 'finalized' WHERE id = ?1",
        )
        .bind(reservation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            reservation_id = %reservation_id,
            order_id = %order_id,
            dishes = dishes.len(),
            "Reservation converted to order"
        );

        Ok(ConversionOutcome::Converted { order_id })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
