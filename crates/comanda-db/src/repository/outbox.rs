//! # Ticket Outbox Repository
//!
//! Persisted queue of outbound ticket e-mails.
//!
//! Queueing is decoupled from payment on purpose: a paid order stays
//! paid no matter what happens to its e-mail, and every delivery
//! attempt leaves an observable trace on the row (attempts, last
//! error, sent timestamp) instead of vanishing into a fire-and-forget
//! thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use comanda_core::validation::validate_email;

const OUTBOX_COLUMNS: &str =
    "id, order_id, recipient, subject, body, attempts, last_error, created_at, attempted_at, sent_at";

/// A queued ticket e-mail.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketEmail {
    pub id: String,
    pub order_id: String,
    pub recipient: String,
    pub subject: String,
    /// Rendered plain-text ticket body.
    pub body: String,
    /// Delivery attempts so far.
    pub attempts: i64,
    /// Last delivery error, if any.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl TicketEmail {
    /// Whether the entry has been delivered.
    #[inline]
    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }
}

/// Repository for ticket outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    /// Creates a new OutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Queues a ticket e-mail for an order.
    pub async fn queue(
        &self,
        order_id: &str,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> DbResult<TicketEmail> {
        validate_email(recipient)?;

        let entry = TicketEmail {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            sent_at: None,
        };

        debug!(order_id = %order_id, recipient = %recipient, "Queueing ticket e-mail");

        sqlx::query(
            r#"
            INSERT INTO ticket_outbox (
                id, order_id, recipient, subject, body,
                attempts, last_error, created_at, attempted_at, sent_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6, NULL, NULL)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.order_id)
        .bind(&entry.recipient)
        .bind(&entry.subject)
        .bind(&entry.body)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Gets an entry by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<TicketEmail>> {
        let sql = format!("SELECT {OUTBOX_COLUMNS} FROM ticket_outbox WHERE id = ?1");
        let entry = sqlx::query_as::<_, TicketEmail>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    /// Undelivered entries, oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<TicketEmail>> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM ticket_outbox \
             WHERE sent_at IS NULL ORDER BY created_at LIMIT ?1"
        );
        let entries = sqlx::query_as::<_, TicketEmail>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Marks an entry as delivered.
    pub async fn mark_sent(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE ticket_outbox SET sent_at = ?2, attempted_at = ?2, attempts = attempts + 1 \
             WHERE id = ?1 AND sent_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Outbox entry (pending)", id));
        }
        Ok(())
    }

    /// Records a failed delivery attempt.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE ticket_outbox SET attempts = attempts + 1, last_error = ?2, attempted_at = ?3 \
             WHERE id = ?1 AND sent_at IS NULL",
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Outbox entry (pending)", id));
        }
        Ok(())
    }

    /// Number of undelivered entries.
    pub async fn pending_count(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ticket_outbox WHERE sent_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
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
    use comanda_core::{Floor, NewOrder, ProductCategory, TableShape};

    async fn seed_order(db: &Database) -> String {
        let table = db
            .tables()
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
        let product = db
            .products()
            .create(NewProduct {
                name: "Cola".to_string(),
                category: ProductCategory::Drink,
                price_cents: 150,
                stock: 10,
                image_path: None,
                description: None,
            })
            .await
            .unwrap();
        let mut draft = NewOrder::new(&table.id, "carlos");
        draft.add_line(&product.id, 1, None).unwrap();
        db.orders().create(&draft).await.unwrap().id
    }

    #[tokio::test]
    async fn test_queue_and_drain() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order_id = seed_order(&db).await;
        let repo = db.outbox();

        let entry = repo
            .queue(&order_id, "ana@example.com", "Ticket #1", "TOTAL $1.50")
            .await
            .unwrap();
        assert_eq!(repo.pending_count().await.unwrap(), 1);

        repo.mark_sent(&entry.id).await.unwrap();
        assert_eq!(repo.pending_count().await.unwrap(), 0);

        let sent = repo.get_by_id(&entry.id).await.unwrap().unwrap();
        assert!(sent.is_sent());
        assert_eq!(sent.attempts, 1);

        // Delivered entries cannot be re-marked
        assert!(repo.mark_sent(&entry.id).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_attempts_accumulate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order_id = seed_order(&db).await;
        let repo = db.outbox();

        let entry = repo
            .queue(&order_id, "ana@example.com", "Ticket #1", "TOTAL $1.50")
            .await
            .unwrap();

        repo.mark_failed(&entry.id, "connection refused").await.unwrap();
        repo.mark_failed(&entry.id, "timeout").await.unwrap();

        let failed = repo.get_by_id(&entry.id).await.unwrap().unwrap();
        assert_eq!(failed.attempts, 2);
        assert_eq!(failed.last_error.as_deref(), Some("timeout"));
        assert!(!failed.is_sent());
        // Still pending, still retryable
        assert_eq!(repo.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_queue_rejects_bad_recipient() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order_id = seed_order(&db).await;

        let err = db
            .outbox()
            .queue(&order_id, "not-an-email", "s", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }
}
