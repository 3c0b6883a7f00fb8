//! # Order Repository
//!
//! Persistence for the order aggregate.
//!
//! ## Lifecycle
//! ```text
//! 1. CREATE
//!    create(draft) -> Order { status: Pending, ticket_number assigned }
//!    One transaction: order row + line rows + total recompute.
//!
//! 2. EDIT
//!    add_line / update_line / remove_line
//!    Each runs in one transaction and ends with a full total
//!    recompute from the current line rows.
//!
//! 3. KITCHEN
//!    mark_in_preparation / mark_ready (orders may jump Pending -> Ready)
//!
//! 4. PAY
//!    pay() -> status Paid, paid_at stamped, one Sale snapshot per line.
//!    Lines are frozen afterwards; only customer fields stay editable.
//!
//! 5. CANCEL
//!    cancel() from any non-terminal status. Never deleted.
//! ```
//!
//! Ticket numbers are assigned inside the INSERT statement itself
//! (`MAX(ticket_number) + 1` subselect), so concurrent creations
//! serialize on SQLite's writer lock and can never draw the same
//! number.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::day_bounds;
use comanda_core::policy::{ensure_can_edit, OrderField};
use comanda_core::validation::{
    validate_email, validate_line_count, validate_quantity, validate_tax_id,
};
use comanda_core::{
    CustomerUpdate, NewOrder, Order, OrderLine, OrderStatus, PaymentMethod, Sale, StaffRole,
    ValidationError,
};

/// Column list matching the `Order` struct, used by every read.
const ORDER_COLUMNS: &str = "id, ticket_number, table_id, waiter, status, total_cents, notes, \
     customer_name, customer_tax_id, customer_phone, customer_email, customer_address, \
     payment_method, payment_proof_path, created_at, updated_at, paid_at";

const LINE_COLUMNS: &str =
    "id, order_id, product_id, quantity, unit_price_cents, note, created_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Persists a draft as a new `Pending` order.
    ///
    /// One transaction covers the order row, its lines, and the total
    /// recompute; nothing is left behind on failure. Lines without an
    /// explicit unit price capture the catalog price of this moment.
    pub async fn create(&self, draft: &NewOrder) -> DbResult<Order> {
        draft.validate()?;
        validate_line_count(draft.lines.len())?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let table_exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM dining_tables WHERE id = ?1")
                .bind(&draft.table_id)
                .fetch_optional(&mut *tx)
                .await?;
        if table_exists.is_none() {
            return Err(DbError::not_found("Table", &draft.table_id));
        }

        // Ticket number is computed inside the statement: atomic under
        // SQLite's single-writer rule.
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
                ?5, ?6, ?7, ?8,
                ?9, ?10, NULL,
                ?11, ?11, NULL
            )
            "#,
        )
        .bind(&id)
        .bind(&draft.table_id)
        .bind(&draft.waiter)
        .bind(&draft.notes)
        .bind(&draft.customer_name)
        .bind(&draft.customer_tax_id)
        .bind(&draft.customer_phone)
        .bind(&draft.customer_email)
        .bind(&draft.customer_address)
        .bind(draft.payment_method)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &draft.lines {
            validate_quantity(line.quantity)?;
            let unit_price = match line.unit_price_cents {
                Some(price) => price,
                None => self.catalog_price(&mut tx, &line.product_id).await?,
            };

            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, product_id, quantity, unit_price_cents, note, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(unit_price)
            .bind(&line.note)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        recompute_total(&mut tx, &id, now).await?;

        tx.commit().await?;

        let order = self
            .get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", &id))?;

        info!(
            order_id = %order.id,
            ticket = order.ticket_number,
            total = order.total_cents,
            lines = draft.lines.len(),
            "Order created"
        );

        Ok(order)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Gets all current lines of an order, oldest first.
    pub async fn get_lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let sql =
            format!("SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY created_at");
        let lines = sqlx::query_as::<_, OrderLine>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    /// Gets an order together with its current lines.
    pub async fn get_with_lines(&self, id: &str) -> DbResult<Option<(Order, Vec<OrderLine>)>> {
        let Some(order) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let lines = self.get_lines(id).await?;
        Ok(Some((order, lines)))
    }

    /// Kitchen queue: orders waiting on the kitchen, oldest first.
    pub async fn kitchen_queue(&self) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE status IN ('pending', 'in_preparation') ORDER BY created_at"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Cashier queue: everything still to be collected, newest first.
    pub async fn cashier_queue(&self) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE status IN ('pending', 'in_preparation', 'ready') ORDER BY created_at DESC"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// A waiter's ticket history, newest first, optionally bounded by
    /// creation date.
    pub async fn history_for_waiter(
        &self,
        waiter: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        limit: u32,
    ) -> DbResult<Vec<Order>> {
        let start = from.map(|d| day_bounds(d).0);
        let end = to.map(|d| day_bounds(d).1);

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE waiter = ?1 \
               AND (?2 IS NULL OR created_at >= ?2) \
               AND (?3 IS NULL OR created_at < ?3) \
             ORDER BY created_at DESC \
             LIMIT ?4"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(waiter)
            .bind(start)
            .bind(end)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Sale snapshots written when the order was paid.
    pub async fn sales_for_order(&self, order_id: &str) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            "SELECT id, order_id, product_id, product_name, quantity, total_cents, payment_method, sold_at \
             FROM sales WHERE order_id = ?1 ORDER BY sold_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }

    // =========================================================================
    // Line mutations
    // =========================================================================

    /// Adds a line to an order and recomputes the total, in one
    /// transaction. `unit_price_cents: None` captures the current
    /// catalog price.
    pub async fn add_line(
        &self,
        order_id: &str,
        product_id: &str,
        quantity: i64,
        unit_price_cents: Option<i64>,
        note: Option<&str>,
        role: StaffRole,
    ) -> DbResult<OrderLine> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let status = load_status(&mut tx, order_id).await?;
        ensure_can_edit(role, status, OrderField::Lines)?;

        let unit_price = match unit_price_cents {
            Some(price) => price,
            None => self.catalog_price(&mut tx, product_id).await?,
        };

        let now = Utc::now();
        let line = OrderLine {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            unit_price_cents: unit_price,
            note: note.map(str::to_string),
            created_at: now,
        };

        debug!(order_id = %order_id, product_id = %product_id, quantity, "Adding order line");

        sqlx::query(
            r#"
            INSERT INTO order_lines (id, order_id, product_id, quantity, unit_price_cents, note, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&line.id)
        .bind(&line.order_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(&line.note)
        .bind(line.created_at)
        .execute(&mut *tx)
        .await?;

        recompute_total(&mut tx, order_id, now).await?;

        tx.commit().await?;
        Ok(line)
    }

    /// Changes a line's quantity (and optionally its note) and
    /// recomputes the total.
    pub async fn update_line(
        &self,
        line_id: &str,
        quantity: i64,
        note: Option<&str>,
        role: StaffRole,
    ) -> DbResult<()> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let (order_id, status) = load_line_order(&mut tx, line_id).await?;
        ensure_can_edit(role, status, OrderField::Lines)?;

        let now = Utc::now();
        sqlx::query("UPDATE order_lines SET quantity = ?2, note = ?3 WHERE id = ?1")
            .bind(line_id)
            .bind(quantity)
            .bind(note)
            .execute(&mut *tx)
            .await?;

        recompute_total(&mut tx, &order_id, now).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Removes a line and recomputes the total.
    pub async fn remove_line(&self, line_id: &str, role: StaffRole) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let (order_id, status) = load_line_order(&mut tx, line_id).await?;
        ensure_can_edit(role, status, OrderField::Lines)?;

        let now = Utc::now();
        sqlx::query("DELETE FROM order_lines WHERE id = ?1")
            .bind(line_id)
            .execute(&mut *tx)
            .await?;

        recompute_total(&mut tx, &order_id, now).await?;

        tx.commit().await?;

        debug!(order_id = %order_id, line_id = %line_id, "Order line removed");
        Ok(())
    }

    // =========================================================================
    // Status transitions
    // =========================================================================

    /// Applies a status transition other than payment.
    ///
    /// `Paid` is only reachable through [`OrderRepository::pay`], which
    /// also writes the sale snapshots.
    pub async fn set_status(
        &self,
        order_id: &str,
        next: OrderStatus,
        role: StaffRole,
    ) -> DbResult<()> {
        if next == OrderStatus::Paid {
            return Err(DbError::invalid_state(
                "Order",
                order_id,
                "unpaid; payment goes through pay()",
            ));
        }

        let mut tx = self.pool.begin().await?;

        let status = load_status(&mut tx, order_id).await?;
        ensure_can_edit(role, status, OrderField::Status)?;
        if !status.can_transition_to(next) {
            return Err(comanda_core::CoreError::InvalidTransition { from: status, to: next }.into());
        }

        let now = Utc::now();
        sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(next)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(order_id = %order_id, from = ?status, to = ?next, "Order status changed");
        Ok(())
    }

    /// Kitchen started working on the order.
    pub async fn mark_in_preparation(&self, order_id: &str, role: StaffRole) -> DbResult<()> {
        self.set_status(order_id, OrderStatus::InPreparation, role)
            .await
    }

    /// Kitchen finished; ready to serve. Orders may jump here straight
    /// from `Pending`.
    pub async fn mark_ready(&self, order_id: &str, role: StaffRole) -> DbResult<()> {
        self.set_status(order_id, OrderStatus::Ready, role).await
    }

    /// Cancels the order. A status change, not a delete: the ticket
    /// count keeps the number.
    pub async fn cancel(&self, order_id: &str, role: StaffRole) -> DbResult<()> {
        self.set_status(order_id, OrderStatus::Cancelled, role).await
    }

    // =========================================================================
    // Field updates
    // =========================================================================

    /// Updates the general notes.
    pub async fn update_notes(
        &self,
        order_id: &str,
        notes: Option<&str>,
        role: StaffRole,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let status = load_status(&mut tx, order_id).await?;
        ensure_can_edit(role, status, OrderField::Notes)?;

        let now = Utc::now();
        sqlx::query("UPDATE orders SET notes = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(notes)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Moves the order to another table. Not available to waiters.
    pub async fn reassign_table(
        &self,
        order_id: &str,
        table_id: &str,
        role: StaffRole,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let status = load_status(&mut tx, order_id).await?;
        ensure_can_edit(role, status, OrderField::Table)?;

        let table_exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM dining_tables WHERE id = ?1")
                .bind(table_id)
                .fetch_optional(&mut *tx)
                .await?;
        if table_exists.is_none() {
            return Err(DbError::not_found("Table", table_id));
        }

        let now = Utc::now();
        sqlx::query("UPDATE orders SET table_id = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(table_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Updates customer identity fields. The one edit that stays open
    /// after payment, so invoices can be corrected without reopening
    /// the order.
    pub async fn update_customer(
        &self,
        order_id: &str,
        update: &CustomerUpdate,
        role: StaffRole,
    ) -> DbResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        validate_customer(update)?;

        let mut tx = self.pool.begin().await?;

        let status = load_status(&mut tx, order_id).await?;
        ensure_can_edit(role, status, OrderField::Customer)?;

        apply_customer_update(&mut tx, order_id, update).await?;

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Collects payment for an order.
    ///
    /// One transaction: customer corrections, one `Sale` snapshot per
    /// current line (product name frozen at this moment), payment
    /// method and proof, `paid_at`, status `Paid`. Already-terminal
    /// orders are rejected untouched.
    pub async fn pay(
        &self,
        order_id: &str,
        method: PaymentMethod,
        customer: Option<&CustomerUpdate>,
        proof_path: Option<&str>,
        role: StaffRole,
    ) -> DbResult<Order> {
        if method == PaymentMethod::Pending {
            return Err(ValidationError::Required {
                field: "payment_method".to_string(),
            }
            .into());
        }

        if let Some(update) = customer {
            validate_customer(update)?;
        }

        let mut tx = self.pool.begin().await?;

        let status = load_status(&mut tx, order_id).await?;
        if status.is_terminal() {
            return Err(DbError::invalid_state(
                "Order",
                order_id,
                format!("{status:?}"),
            ));
        }
        ensure_can_edit(role, status, OrderField::Payment)?;

        if let Some(update) = customer {
            apply_customer_update(&mut tx, order_id, update).await?;
        }

        let now = Utc::now();

        // Snapshot every current line for reporting stability.
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY created_at"
        );
        let lines = sqlx::query_as::<_, OrderLine>(&sql)
            .bind(order_id)
            .fetch_all(&mut *tx)
            .await?;

        for line in &lines {
            let product_name: Option<String> =
                sqlx::query_scalar("SELECT name FROM products WHERE id = ?1")
                    .bind(&line.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let product_name =
                product_name.ok_or_else(|| DbError::not_found("Product", &line.product_id))?;

            sqlx::query(
                r#"
                INSERT INTO sales (id, order_id, product_id, product_name, quantity, total_cents, payment_method, sold_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(order_id)
            .bind(&line.product_id)
            .bind(&product_name)
            .bind(line.quantity)
            .bind(line.subtotal_cents())
            .bind(method)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = 'paid',
                payment_method = ?2,
                payment_proof_path = COALESCE(?3, payment_proof_path),
                paid_at = ?4,
                updated_at = ?4
            WHERE id = ?1 AND status NOT IN ('paid', 'cancelled')
            "#,
        )
        .bind(order_id)
        .bind(method)
        .bind(proof_path)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order (active)", order_id));
        }

        tx.commit().await?;

        let order = self
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        info!(
            order_id = %order_id,
            ticket = order.ticket_number,
            total = order.total_cents,
            method = ?method,
            snapshots = lines.len(),
            "Payment collected"
        );

        Ok(order)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Current catalog price of a product, inside the caller's
    /// transaction.
    async fn catalog_price(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        product_id: &str,
    ) -> DbResult<i64> {
        let price: Option<i64> = sqlx::query_scalar("SELECT price_cents FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await?;
        price.ok_or_else(|| DbError::not_found("Product", product_id))
    }
}

/// Re-derives the order total from all current lines, inside the
/// mutating transaction. Full recompute, never incremental.
pub(crate) async fn recompute_total(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE orders SET
            total_cents = (
                SELECT COALESCE(SUM(quantity * unit_price_cents), 0)
                FROM order_lines WHERE order_id = ?1
            ),
            updated_at = ?2
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Loads an order's status or fails with not-found.
async fn load_status(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: &str,
) -> DbResult<OrderStatus> {
    let status: Option<OrderStatus> =
        sqlx::query_scalar("SELECT status FROM orders WHERE id = ?1")
            .bind(order_id)
            .fetch_optional(&mut **tx)
            .await?;
    status.ok_or_else(|| DbError::not_found("Order", order_id))
}

/// Resolves a line to its owning order and that order's status.
async fn load_line_order(
    tx: &mut Transaction<'_, Sqlite>,
    line_id: &str,
) -> DbResult<(String, OrderStatus)> {
    let row: Option<(String, OrderStatus)> = sqlx::query_as(
        "SELECT o.id, o.status FROM order_lines l JOIN orders o ON o.id = l.order_id WHERE l.id = ?1",
    )
    .bind(line_id)
    .fetch_optional(&mut **tx)
    .await?;
    row.ok_or_else(|| DbError::not_found("Order line", line_id))
}

/// Rejects malformed customer corrections before anything is written.
fn validate_customer(update: &CustomerUpdate) -> DbResult<()> {
    if let Some(tax_id) = &update.tax_id {
        validate_tax_id(tax_id)?;
    }
    if let Some(email) = &update.email {
        validate_email(email)?;
    }
    Ok(())
}

/// Writes the provided customer fields, leaving the rest untouched.
async fn apply_customer_update(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: &str,
    update: &CustomerUpdate,
) -> DbResult<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        UPDATE orders SET
            customer_name = COALESCE(?2, customer_name),
            customer_tax_id = COALESCE(?3, customer_tax_id),
            customer_phone = COALESCE(?4, customer_phone),
            customer_email = COALESCE(?5, customer_email),
            customer_address = COALESCE(?6, customer_address),
            updated_at = ?7
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(&update.name)
    .bind(&update.tax_id)
    .bind(&update.phone)
    .bind(&update.email)
    .bind(&update.address)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;
    use crate::repository::table::NewTable;
    use comanda_core::{Floor, ProductCategory, TableShape, DEFAULT_CUSTOMER_NAME};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_table(db: &Database) -> String {
        db.tables()
            .create(NewTable {
                number: 3,
                floor: Floor::Ground,
                capacity: 4,
                shape: TableShape::Square,
                pos_x: 10,
                pos_y: 10,
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_product(db: &Database, name: &str, price_cents: i64) -> String {
        db.products()
            .create(NewProduct {
                name: name.to_string(),
                category: ProductCategory::Other,
                price_cents,
                stock: 0,
                image_path: None,
                description: None,
            })
            .await
            .unwrap()
            .id
    }

    /// A x2 @ $5.00 + B x1 @ $3.50 = $13.50; drop B -> $10.00;
    /// pay -> snapshots match the remaining lines.
    #[tokio::test]
    async fn test_order_lifecycle_with_totals() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product_a = seed_product(&db, "Product A", 500).await;
        let product_b = seed_product(&db, "Product B", 350).await;

        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line(&product_a, 2, None).unwrap();
        draft.add_line(&product_b, 1, None).unwrap();

        let order = db.orders().create(&draft).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_cents, 1350);

        // Remove the $3.50 line
        let lines = db.orders().get_lines(&order.id).await.unwrap();
        let line_b = lines.iter().find(|l| l.product_id == product_b).unwrap();
        db.orders()
            .remove_line(&line_b.id, StaffRole::Waiter)
            .await
            .unwrap();

        let (order, lines) = db
            .orders()
            .get_with_lines(&order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.total_cents, 1000);
        assert_eq!(lines.len(), 1);

        // Pay and check the snapshots
        let paid = db
            .orders()
            .pay(&order.id, PaymentMethod::Cash, None, None, StaffRole::Cashier)
            .await
            .unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert!(paid.paid_at.is_some());
        assert_eq!(paid.payment_method, PaymentMethod::Cash);

        let sales = db.orders().sales_for_order(&order.id).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].product_name, "Product A");
        assert_eq!(sales[0].quantity, 2);
        let total: i64 = sales.iter().map(|s| s.total_cents).sum();
        assert_eq!(total, 1000);
    }

    #[tokio::test]
    async fn test_update_line_recomputes_total() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Ceviche", 1200).await;

        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line(&product, 2, None).unwrap();
        let order = db.orders().create(&draft).await.unwrap();
        assert_eq!(order.total_cents, 2400);

        let lines = db.orders().get_lines(&order.id).await.unwrap();
        db.orders()
            .update_line(&lines[0].id, 3, Some("bien picante"), StaffRole::Waiter)
            .await
            .unwrap();

        let order = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.total_cents, 3600);
        let lines = db.orders().get_lines(&order.id).await.unwrap();
        assert_eq!(lines[0].quantity, 3);
        assert_eq!(lines[0].note.as_deref(), Some("bien picante"));
    }

    #[tokio::test]
    async fn test_line_price_captured_at_creation() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Ceviche", 1200).await;

        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line(&product, 1, None).unwrap();
        let order = db.orders().create(&draft).await.unwrap();
        assert_eq!(order.total_cents, 1200);

        // Raise the catalog price; the order must not move.
        let mut p = db.products().get_by_id(&product).await.unwrap().unwrap();
        p.price_cents = 1500;
        db.products().update(&p).await.unwrap();

        let lines = db.orders().get_lines(&order.id).await.unwrap();
        assert_eq!(lines[0].unit_price_cents, 1200);
        let order = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.total_cents, 1200);
    }

    #[tokio::test]
    async fn test_ticket_numbers_strictly_increase() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Cola", 150).await;

        let mut tickets = Vec::new();
        for _ in 0..3 {
            let mut draft = NewOrder::new(&table_id, "carlos");
            draft.add_line(&product, 1, None).unwrap();
            tickets.push(db.orders().create(&draft).await.unwrap().ticket_number);
        }
        assert_eq!(tickets, vec![1, 2, 3]);

        // Cancellation keeps the number; the next order continues.
        let orders = db.orders().cashier_queue().await.unwrap();
        db.orders()
            .cancel(&orders[0].id, StaffRole::Cashier)
            .await
            .unwrap();

        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line(&product, 1, None).unwrap();
        assert_eq!(db.orders().create(&draft).await.unwrap().ticket_number, 4);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_draft() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;

        let draft = NewOrder::new(&table_id, "carlos");
        let err = db.orders().create(&draft).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_table_and_product() {
        let db = test_db().await;
        let product = seed_product(&db, "Cola", 150).await;

        let mut draft = NewOrder::new("no-such-table", "carlos");
        draft.add_line(&product, 1, None).unwrap();
        let err = db.orders().create(&draft).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let table_id = seed_table(&db).await;
        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line("no-such-product", 1, None).unwrap();
        let err = db.orders().create(&draft).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        // The failed create must not leave an order behind
        assert!(db.orders().cashier_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paid_order_freezes_lines_but_not_customer() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Cola", 150).await;

        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line(&product, 1, None).unwrap();
        let order = db.orders().create(&draft).await.unwrap();

        db.orders()
            .pay(&order.id, PaymentMethod::Cash, None, None, StaffRole::Cashier)
            .await
            .unwrap();

        // Line mutations rejected for every role
        let err = db
            .orders()
            .add_line(&order.id, &product, 1, None, None, StaffRole::Superuser)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));

        let lines = db.orders().get_lines(&order.id).await.unwrap();
        let err = db
            .orders()
            .remove_line(&lines[0].id, StaffRole::Cashier)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));

        // Customer fields stay editable
        let update = CustomerUpdate {
            name: Some("Juan Perez".to_string()),
            tax_id: Some("1712345678".to_string()),
            ..Default::default()
        };
        db.orders()
            .update_customer(&order.id, &update, StaffRole::Waiter)
            .await
            .unwrap();

        let order = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.customer_name, "Juan Perez");
        // Total unchanged by all of the above
        assert_eq!(order.total_cents, 150);
    }

    #[tokio::test]
    async fn test_pay_twice_rejected() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Cola", 150).await;

        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line(&product, 1, None).unwrap();
        let order = db.orders().create(&draft).await.unwrap();

        db.orders()
            .pay(&order.id, PaymentMethod::Cash, None, None, StaffRole::Cashier)
            .await
            .unwrap();
        let err = db
            .orders()
            .pay(&order.id, PaymentMethod::Cash, None, None, StaffRole::Cashier)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidState { .. }));

        // Exactly one snapshot batch
        assert_eq!(db.orders().sales_for_order(&order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pay_applies_customer_correction() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Cola", 150).await;

        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line(&product, 1, None).unwrap();
        let order = db.orders().create(&draft).await.unwrap();
        assert_eq!(order.customer_name, DEFAULT_CUSTOMER_NAME);

        let update = CustomerUpdate {
            name: Some("Ana Lopez".to_string()),
            email: Some("ana@example.com".to_string()),
            ..Default::default()
        };
        let paid = db
            .orders()
            .pay(
                &order.id,
                PaymentMethod::Transfer,
                Some(&update),
                Some("comprobantes/t-4.jpg"),
                StaffRole::Cashier,
            )
            .await
            .unwrap();

        assert_eq!(paid.customer_name, "Ana Lopez");
        assert_eq!(paid.payment_method, PaymentMethod::Transfer);
        assert_eq!(paid.payment_proof_path.as_deref(), Some("comprobantes/t-4.jpg"));
    }

    #[tokio::test]
    async fn test_pay_rejects_malformed_customer() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Cola", 150).await;

        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line(&product, 1, None).unwrap();
        let order = db.orders().create(&draft).await.unwrap();

        let update = CustomerUpdate {
            tax_id: Some("17-1234567".to_string()),
            ..Default::default()
        };
        let err = db
            .orders()
            .pay(
                &order.id,
                PaymentMethod::Cash,
                Some(&update),
                None,
                StaffRole::Cashier,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        // Order untouched
        let order = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_waiter_cannot_change_status_or_table() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Cola", 150).await;

        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line(&product, 1, None).unwrap();
        let order = db.orders().create(&draft).await.unwrap();

        let err = db
            .orders()
            .mark_ready(&order.id, StaffRole::Waiter)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));

        let err = db
            .orders()
            .reassign_table(&order.id, &table_id, StaffRole::Waiter)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));

        // Cashier may do both
        db.orders()
            .mark_ready(&order.id, StaffRole::Cashier)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_kitchen_jump_pending_to_ready() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Cola", 150).await;

        let mut draft = NewOrder::new(&table_id, "carlos");
        draft.add_line(&product, 1, None).unwrap();
        let order = db.orders().create(&draft).await.unwrap();

        db.orders()
            .mark_ready(&order.id, StaffRole::Cashier)
            .await
            .unwrap();
        let order = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Ready);

        // Backwards is rejected
        let err = db
            .orders()
            .mark_in_preparation(&order.id, StaffRole::Cashier)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }

    #[tokio::test]
    async fn test_queues() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Cola", 150).await;

        for _ in 0..3 {
            let mut draft = NewOrder::new(&table_id, "carlos");
            draft.add_line(&product, 1, None).unwrap();
            db.orders().create(&draft).await.unwrap();
        }

        let kitchen = db.orders().kitchen_queue().await.unwrap();
        assert_eq!(kitchen.len(), 3);

        // Ready orders leave the kitchen queue but stay collectable
        db.orders()
            .mark_ready(&kitchen[0].id, StaffRole::Cashier)
            .await
            .unwrap();
        assert_eq!(db.orders().kitchen_queue().await.unwrap().len(), 2);
        assert_eq!(db.orders().cashier_queue().await.unwrap().len(), 3);

        // Paid orders leave both
        db.orders()
            .pay(&kitchen[0].id, PaymentMethod::Cash, None, None, StaffRole::Cashier)
            .await
            .unwrap();
        assert_eq!(db.orders().cashier_queue().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_history_for_waiter() {
        let db = test_db().await;
        let table_id = seed_table(&db).await;
        let product = seed_product(&db, "Cola", 150).await;

        for waiter in ["carlos", "carlos", "maria"] {
            let mut draft = NewOrder::new(&table_id, waiter);
            draft.add_line(&product, 1, None).unwrap();
            db.orders().create(&draft).await.unwrap();
        }

        let history = db
            .orders()
            .history_for_waiter("carlos", None, None, 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);

        let today = Utc::now().date_naive();
        let history = db
            .orders()
            .history_for_waiter("carlos", Some(today), Some(today), 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);

        let tomorrow = today.succ_opt().unwrap();
        let history = db
            .orders()
            .history_for_waiter("carlos", Some(tomorrow), None, 10)
            .await
            .unwrap();
        assert!(history.is_empty());
    }
}
