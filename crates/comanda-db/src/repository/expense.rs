//! # Expense Repository
//!
//! Operating expenses recorded against today's register. Deletion is
//! gated to the superuser; everyone else corrects by adding a
//! compensating record.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::day_bounds;
use comanda_core::policy::ensure_can_delete_expense;
use comanda_core::validation::{validate_name, validate_positive_amount};
use comanda_core::{Expense, ExpenseCategory, StaffRole};

const EXPENSE_COLUMNS: &str =
    "id, staff, description, amount_cents, category, receipt_path, spent_at";

/// Input for recording an expense.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub staff: String,
    pub description: String,
    pub amount_cents: i64,
    pub category: ExpenseCategory,
    pub receipt_path: Option<String>,
}

/// Repository for expense database operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Records an expense, stamped with the current time.
    pub async fn create(&self, new: NewExpense) -> DbResult<Expense> {
        validate_name("description", &new.description)?;
        validate_positive_amount("amount", new.amount_cents)?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            staff: new.staff,
            description: new.description.trim().to_string(),
            amount_cents: new.amount_cents,
            category: new.category,
            receipt_path: new.receipt_path,
            spent_at: Utc::now(),
        };

        debug!(id = %expense.id, amount = expense.amount_cents, "Recording expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (id, staff, description, amount_cents, category, receipt_path, spent_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.staff)
        .bind(&expense.description)
        .bind(expense.amount_cents)
        .bind(expense.category)
        .bind(&expense.receipt_path)
        .bind(expense.spent_at)
        .execute(&self.pool)
        .await?;

        Ok(expense)
    }

    /// Quick expense from the register screen: description and amount
    /// only, category defaults to Other.
    pub async fn quick_create(
        &self,
        staff: &str,
        description: &str,
        amount_cents: i64,
    ) -> DbResult<Expense> {
        self.create(NewExpense {
            staff: staff.to_string(),
            description: description.to_string(),
            amount_cents,
            category: ExpenseCategory::default(),
            receipt_path: None,
        })
        .await
    }

    /// Gets an expense by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Expense>> {
        let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1");
        let expense = sqlx::query_as::<_, Expense>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(expense)
    }

    /// Expenses of one calendar day, newest first.
    pub async fn list_for_day(&self, date: NaiveDate) -> DbResult<Vec<Expense>> {
        let (start, end) = day_bounds(date);
        let sql = format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses \
             WHERE spent_at >= ?1 AND spent_at < ?2 ORDER BY spent_at DESC"
        );
        let expenses = sqlx::query_as::<_, Expense>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(expenses)
    }

    /// Total spent on one calendar day.
    pub async fn total_for_day(&self, date: NaiveDate) -> DbResult<i64> {
        let (start, end) = day_bounds(date);
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM expenses WHERE spent_at >= ?1 AND spent_at < ?2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    /// Deletes an expense. Superuser only.
    pub async fn delete(&self, id: &str, role: StaffRole) -> DbResult<()> {
        ensure_can_delete_expense(role)?;

        let result = sqlx::query("DELETE FROM expenses WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Expense", id));
        }

        info!(expense_id = %id, "Expense deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
