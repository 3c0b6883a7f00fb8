//! # Notify Error Types

use thiserror::Error;

use crate::mailer::MailerError;

/// Result type alias for notify operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors raised by the dispatcher and the queueing helpers.
///
/// Delivery failures never propagate into order state; they end up on
/// the outbox row and in the logs.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Database access failed.
    #[error("Database error: {0}")]
    Database(#[from] comanda_db::DbError),

    /// The mailer reported a delivery failure.
    #[error("Mailer error: {0}")]
    Mailer(#[from] MailerError),

    /// The order has no customer e-mail to send to.
    #[error("Order {0} has no customer e-mail")]
    NoRecipient(String),

    /// A control channel closed unexpectedly.
    #[error("Channel error: {0}")]
    Channel(String),
}
