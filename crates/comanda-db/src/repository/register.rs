//! # Register Repository
//!
//! Cash-register sessions and the scoped money summary every reporting
//! surface is built from.
//!
//! Invariant: at most one Open session system-wide. The opening
//! transaction checks explicitly and a partial unique index on
//! `status = 'open'` settles concurrent openers; the loser gets
//! [`DbError::RegisterAlreadyOpen`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::day_bounds;
use comanda_core::validation::validate_non_negative_amount;
use comanda_core::{RegisterSession, RegisterStatus};

const SESSION_COLUMNS: &str =
    "id, operator, opened_at, closed_at, opening_cents, closing_cents, status";

/// Money totals scoped to the current session (or to today when no
/// session is open).
///
/// `net = opening + income - expenses`; `drawer` counts only cash
/// income, since transfers never enter the drawer. The dashboard, the
/// printable report, and the spreadsheet export all consume this one
/// struct, so the formula cannot drift between surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSummary {
    /// The open session, if any.
    pub session: Option<RegisterSession>,
    /// Instant income is counted from: session opening, else midnight.
    pub since: DateTime<Utc>,
    pub opening_cents: i64,
    /// Paid-order totals since `since`.
    pub income_cents: i64,
    pub cash_income_cents: i64,
    pub transfer_income_cents: i64,
    /// Today's expenses.
    pub expense_cents: i64,
    pub net_cents: i64,
    pub drawer_cents: i64,
}

/// Repository for register-session database operations.
#[derive(Debug, Clone)]
pub struct RegisterRepository {
    pool: SqlitePool,
}

impl RegisterRepository {
    /// Creates a new RegisterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RegisterRepository { pool }
    }

    /// Opens a session with the given float.
    ///
    /// Fails with [`DbError::RegisterAlreadyOpen`] if any session is
    /// still open.
    pub async fn open(&self, operator: &str, opening_cents: i64) -> DbResult<RegisterSession> {
        validate_non_negative_amount("opening_float", opening_cents)?;

        let mut tx = self.pool.begin().await?;

        let open_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM register_sessions WHERE status = 'open' LIMIT 1")
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(id) = open_id {
            return Err(DbError::RegisterAlreadyOpen { id });
        }

        let session = RegisterSession {
            id: Uuid::new_v4().to_string(),
            operator: operator.to_string(),
            opened_at: Utc::now(),
            closed_at: None,
            opening_cents,
            closing_cents: None,
            status: RegisterStatus::Open,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO register_sessions (id, operator, opened_at, closed_at, opening_cents, closing_cents, status)
            VALUES (?1, ?2, ?3, NULL, ?4, NULL, 'open')
            "#,
        )
        .bind(&session.id)
        .bind(&session.operator)
        .bind(session.opened_at)
        .bind(session.opening_cents)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            // The partial unique index catches the concurrent opener
            // that slipped past the explicit check.
            Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE constraint failed") => {
                warn!(operator = %operator, "Concurrent register open lost the race");
                return Err(DbError::RegisterAlreadyOpen {
                    id: "concurrent".to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;

        info!(session_id = %session.id, operator = %operator, opening = opening_cents, "Register opened");
        Ok(session)
    }

    /// Closes the most recent Open session, stamping the closing time
    /// and the optionally counted closing amount.
    pub async fn close(&self, closing_cents: Option<i64>) -> DbResult<RegisterSession> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM register_sessions \
             WHERE status = 'open' ORDER BY opened_at DESC LIMIT 1"
        );
        let session = sqlx::query_as::<_, RegisterSession>(&sql)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NoOpenSession)?;

        let now = Utc::now();
        sqlx::query(
            "UPDATE register_sessions SET status = 'closed', closed_at = ?2, closing_cents = ?3 WHERE id = ?1",
        )
        .bind(&session.id)
        .bind(now)
        .bind(closing_cents)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(session_id = %session.id, "Register closed");

        Ok(RegisterSession {
            closed_at: Some(now),
            closing_cents,
            status: RegisterStatus::Closed,
            ..session
        })
    }

    /// The currently open session, if any.
    pub async fn current_open(&self) -> DbResult<Option<RegisterSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM register_sessions \
             WHERE status = 'open' ORDER BY opened_at DESC LIMIT 1"
        );
        let session = sqlx::query_as::<_, RegisterSession>(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    /// Session history, newest first.
    pub async fn history(&self, limit: u32) -> DbResult<Vec<RegisterSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM register_sessions ORDER BY opened_at DESC LIMIT ?1"
        );
        let sessions = sqlx::query_as::<_, RegisterSession>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    /// Computes the scoped money summary at `now`.
    ///
    /// Income counts `Paid` orders with `paid_at` at or after the open
    /// session's start, or after midnight of `now`'s UTC day when no
    /// session is open. Expenses always cover the whole calendar day.
    pub async fn summary(&self, now: DateTime<Utc>) -> DbResult<RegisterSummary> {
        let session = self.current_open().await?;
        let (day_start, day_end) = day_bounds(now.date_naive());
        let since = session.as_ref().map(|s| s.opened_at).unwrap_or(day_start);
        let opening_cents = session.as_ref().map(|s| s.opening_cents).unwrap_or(0);

        let income_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_cents), 0) FROM orders WHERE status = 'paid' AND paid_at >= ?1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let cash_income_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_cents), 0) FROM orders \
             WHERE status = 'paid' AND paid_at >= ?1 AND payment_method = 'cash'",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let transfer_income_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_cents), 0) FROM orders \
             WHERE status = 'paid' AND paid_at >= ?1 AND payment_method = 'transfer'",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let expense_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM expenses \
             WHERE spent_at >= ?1 AND spent_at < ?2",
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(RegisterSummary {
            session,
            since,
            opening_cents,
            income_cents,
            cash_income_cents,
            transfer_income_cents,
            expense_cents,
            net_cents: opening_cents + income_cents - expense_cents,
            drawer_cents: opening_cents + cash_income_cents - expense_cents,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::expense::NewExpense;
    use crate::repository::product::NewProduct;
    use crate::repository::table::NewTable;
    use comanda_core::{
        ExpenseCategory, Floor, NewOrder, PaymentMethod, ProductCategory, StaffRole, TableShape,
    };

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_paid_order(db: &Database, price_cents: i64, method: PaymentMethod) {
        let table = db
            .tables()
            .list()
            .await
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        let product = db
            .products()
            .create(NewProduct {
                name: format!("Dish {price_cents}"),
                category: ProductCategory::Other,
                price_cents,
                stock: 0,
                image_path: None,
                description: None,
            })
            .await
            .unwrap();

        let mut draft = NewOrder::new(&table.id, "carlos");
        draft.add_line(&product.id, 1, None).unwrap();
        let order = db.orders().create(&draft).await.unwrap();
        db.orders()
            .pay(&order.id, method, None, None, StaffRole::Cashier)
            .await
            .unwrap();
    }

    async fn seed_table(db: &Database) {
        db.tables()
            .create(NewTable {
                number: 1,
                floor: Floor::Ground,
                capacity: 4,
                shape: TableShape::Square,
                pos_x: 10,
                pos_y: 10,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_single_open_session() {
        let db = test_db().await;
        let repo = db.register();

        let session = repo.open("laura", 5000).await.unwrap();
        assert_eq!(session.status, RegisterStatus::Open);

        let err = repo.open("pedro", 3000).await.unwrap_err();
        assert!(matches!(err, DbError::RegisterAlreadyOpen { .. }));

        // Closing frees the slot
        repo.close(None).await.unwrap();
        repo.open("pedro", 3000).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_without_open_session() {
        let db = test_db().await;
        let err = db.register().close(None).await.unwrap_err();
        assert!(matches!(err, DbError::NoOpenSession));
    }

    /// Float $50, one paid order $20, one expense $5
    /// -> net = 50 + 20 - 5 = $65.
    #[tokio::test]
    async fn test_net_balance_formula() {
        let db = test_db().await;
        seed_table(&db).await;

        db.register().open("laura", 5000).await.unwrap();
        seed_paid_order(&db, 2000, PaymentMethod::Cash).await;
        db.expenses()
            .create(NewExpense {
                staff: "laura".to_string(),
                description: "Agua".to_string(),
                amount_cents: 500,
                category: ExpenseCategory::Utilities,
                receipt_path: None,
            })
            .await
            .unwrap();

        let summary = db.register().summary(Utc::now()).await.unwrap();
        assert_eq!(summary.opening_cents, 5000);
        assert_eq!(summary.income_cents, 2000);
        assert_eq!(summary.expense_cents, 500);
        assert_eq!(summary.net_cents, 6500);
        // All income was cash, so the drawer matches net
        assert_eq!(summary.drawer_cents, 6500);
    }

    #[tokio::test]
    async fn test_income_split_by_method() {
        let db = test_db().await;
        seed_table(&db).await;

        db.register().open("laura", 0).await.unwrap();
        seed_paid_order(&db, 1000, PaymentMethod::Cash).await;
        seed_paid_order(&db, 2500, PaymentMethod::Transfer).await;

        let summary = db.register().summary(Utc::now()).await.unwrap();
        assert_eq!(summary.income_cents, 3500);
        assert_eq!(summary.cash_income_cents, 1000);
        assert_eq!(summary.transfer_income_cents, 2500);
        // Transfers never enter the drawer
        assert_eq!(summary.drawer_cents, 1000);
    }

    #[tokio::test]
    async fn test_summary_without_session_scopes_to_midnight() {
        let db = test_db().await;
        seed_table(&db).await;

        seed_paid_order(&db, 1200, PaymentMethod::Cash).await;

        let summary = db.register().summary(Utc::now()).await.unwrap();
        assert!(summary.session.is_none());
        assert_eq!(summary.opening_cents, 0);
        assert_eq!(summary.income_cents, 1200);
        assert_eq!(summary.net_cents, 1200);
    }

    #[tokio::test]
    async fn test_income_scoped_to_session_open() {
        let db = test_db().await;
        seed_table(&db).await;

        // Paid before the session opened: counted only by the
        // midnight scope, not by the session scope.
        seed_paid_order(&db, 999, PaymentMethod::Cash).await;

        // Small pause so paid_at < opened_at is unambiguous.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        db.register().open("laura", 1000).await.unwrap();
        seed_paid_order(&db, 2000, PaymentMethod::Cash).await;

        let summary = db.register().summary(Utc::now()).await.unwrap();
        assert_eq!(summary.income_cents, 2000);
        assert_eq!(summary.net_cents, 3000);
    }
}
