//! # Report Repository
//!
//! Read-only rollups consumed by the three reporting surfaces: the
//! register dashboard, the printable day report, and the spreadsheet
//! export. All of them are built on the same
//! [`RegisterSummary`](crate::repository::register::RegisterSummary),
//! so the net-balance formula cannot diverge between surfaces.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::day_bounds;
use crate::repository::register::{RegisterRepository, RegisterSummary};
use comanda_core::{Expense, Order, Sale};

/// One product's consolidated movement (export and top-seller lists).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRollup {
    pub product_name: String,
    pub quantity: i64,
    pub total_cents: i64,
}

/// One hour's sale volume for the register chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBucket {
    /// Label like "13:00".
    pub hour: String,
    pub total_cents: i64,
}

/// One day's revenue for the week chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub total_cents: i64,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardKpis {
    /// Revenue of orders created today, regardless of status.
    pub revenue_today_cents: i64,
    pub orders_today: i64,
    /// Best seller over all recorded sales.
    pub top_product: Option<ProductRollup>,
}

/// The register dashboard view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDashboard {
    pub summary: RegisterSummary,
    pub paid_orders: Vec<Order>,
    pub expenses: Vec<Expense>,
    pub top_products: Vec<ProductRollup>,
    pub hourly: Vec<HourBucket>,
}

/// Flat rows for the printable day report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintableReport {
    pub generated_at: DateTime<Utc>,
    pub summary: RegisterSummary,
    pub sales: Vec<Sale>,
    pub expenses: Vec<Expense>,
}

/// Flat rows for the spreadsheet export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub summary: RegisterSummary,
    pub expenses: Vec<Expense>,
    /// Consolidated products: one row per product, not one per sale.
    pub products: Vec<ProductRollup>,
}

/// Repository for reporting queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    fn register(&self) -> RegisterRepository {
        RegisterRepository::new(self.pool.clone())
    }

    // =========================================================================
    // KPIs and charts
    // =========================================================================

    /// Headline numbers for the admin dashboard.
    pub async fn kpis(&self, now: DateTime<Utc>) -> DbResult<DashboardKpis> {
        let (start, end) = day_bounds(now.date_naive());

        let (orders_today, revenue_today_cents): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_cents), 0) FROM orders \
             WHERE created_at >= ?1 AND created_at < ?2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        let top_product: Option<(String, i64, i64)> = sqlx::query_as(
            "SELECT product_name, SUM(quantity), SUM(total_cents) FROM sales \
             GROUP BY product_name ORDER BY SUM(quantity) DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(DashboardKpis {
            revenue_today_cents,
            orders_today,
            top_product: top_product.map(|(product_name, quantity, total_cents)| ProductRollup {
                product_name,
                quantity,
                total_cents,
            }),
        })
    }

    /// Revenue per day over the last seven days (today included),
    /// oldest first. Sums orders by creation date regardless of
    /// status, like the dashboard it feeds.
    pub async fn revenue_last_7_days(&self, now: DateTime<Utc>) -> DbResult<Vec<DailyRevenue>> {
        let today = now.date_naive();
        let mut series = Vec::with_capacity(7);

        for offset in (0..7).rev() {
            let date = today - Duration::days(offset);
            let (start, end) = day_bounds(date);
            let total_cents: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(total_cents), 0) FROM orders \
                 WHERE created_at >= ?1 AND created_at < ?2",
            )
            .bind(start)
            .bind(end)
            .fetch_one(&self.pool)
            .await?;
            series.push(DailyRevenue { date, total_cents });
        }

        Ok(series)
    }

    /// Top sellers of one day from the sale snapshots, best first.
    pub async fn top_products_for_day(
        &self,
        date: NaiveDate,
        limit: u32,
    ) -> DbResult<Vec<ProductRollup>> {
        let (start, end) = day_bounds(date);
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT product_name, SUM(quantity), SUM(total_cents) FROM sales \
             WHERE sold_at >= ?1 AND sold_at < ?2 \
             GROUP BY product_name ORDER BY SUM(quantity) DESC LIMIT ?3",
        )
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_name, quantity, total_cents)| ProductRollup {
                product_name,
                quantity,
                total_cents,
            })
            .collect())
    }

    /// Sale volume bucketed by hour for one day, for the register
    /// chart. Hours with no sales are omitted.
    pub async fn sales_by_hour(&self, date: NaiveDate) -> DbResult<Vec<HourBucket>> {
        let sales = self.sales_for_day(date).await?;

        let mut buckets: BTreeMap<String, i64> = BTreeMap::new();
        for sale in &sales {
            let hour = sale.sold_at.format("%H:00").to_string();
            *buckets.entry(hour).or_insert(0) += sale.total_cents;
        }

        Ok(buckets
            .into_iter()
            .map(|(hour, total_cents)| HourBucket { hour, total_cents })
            .collect())
    }

    /// All sale snapshots of one day, oldest first.
    pub async fn sales_for_day(&self, date: NaiveDate) -> DbResult<Vec<Sale>> {
        let (start, end) = day_bounds(date);
        let sales = sqlx::query_as::<_, Sale>(
            "SELECT id, order_id, product_id, product_name, quantity, total_cents, payment_method, sold_at \
             FROM sales WHERE sold_at >= ?1 AND sold_at < ?2 ORDER BY sold_at",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }

    // =========================================================================
    // The three register surfaces
    // =========================================================================

    /// The register dashboard: summary plus the lists behind it.
    pub async fn register_dashboard(&self, now: DateTime<Utc>) -> DbResult<RegisterDashboard> {
        let summary = self.register().summary(now).await?;
        let paid_orders = self.paid_orders_since(summary.since).await?;
        let expenses = self.expenses_for_day(now.date_naive()).await?;
        let top_products = self.top_products_for_day(now.date_naive(), 5).await?;
        let hourly = self.sales_by_hour(now.date_naive()).await?;

        debug!(
            income = summary.income_cents,
            expenses = summary.expense_cents,
            "Register dashboard assembled"
        );

        Ok(RegisterDashboard {
            summary,
            paid_orders,
            expenses,
            top_products,
            hourly,
        })
    }

    /// The printable day report.
    pub async fn printable_report(&self, now: DateTime<Utc>) -> DbResult<PrintableReport> {
        let summary = self.register().summary(now).await?;
        let sales = self.sales_for_day(now.date_naive()).await?;
        let expenses = self.expenses_for_day(now.date_naive()).await?;

        Ok(PrintableReport {
            generated_at: now,
            summary,
            sales,
            expenses,
        })
    }

    /// Flat rows for the spreadsheet export, products consolidated.
    pub async fn export_report(&self, now: DateTime<Utc>) -> DbResult<ExportReport> {
        let summary = self.register().summary(now).await?;
        let expenses = self.expenses_for_day(now.date_naive()).await?;
        // No LIMIT: the export consolidates every product sold today.
        let products = self.top_products_for_day(now.date_naive(), u32::MAX).await?;

        Ok(ExportReport {
            summary,
            expenses,
            products,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn paid_orders_since(&self, since: DateTime<Utc>) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT id, ticket_number, table_id, waiter, status, total_cents, notes, \
                    customer_name, customer_tax_id, customer_phone, customer_email, \
                    customer_address, payment_method, payment_proof_path, \
                    created_at, updated_at, paid_at \
             FROM orders WHERE status = 'paid' AND paid_at >= ?1 ORDER BY paid_at DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn expenses_for_day(&self, date: NaiveDate) -> DbResult<Vec<Expense>> {
        let (start, end) = day_bounds(date);
        let expenses = sqlx::query_as::<_, Expense>(
            "SELECT id, staff, description, amount_cents, category, receipt_path, spent_at \
             FROM expenses WHERE spent_at >= ?1 AND spent_at < ?2 ORDER BY spent_at DESC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(expenses)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
