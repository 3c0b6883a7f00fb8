//! # Mailer Trait
//!
//! The transport boundary of the dispatcher. Production wires an SMTP
//! or API-backed implementation; development and tests use
//! [`LogMailer`].

use std::future::Future;

use thiserror::Error;
use tracing::info;

use comanda_db::TicketEmail;

/// A delivery failure reported by a mailer implementation.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct MailerError(pub String);

impl MailerError {
    pub fn new(message: impl Into<String>) -> Self {
        MailerError(message.into())
    }
}

/// Sends one ticket e-mail.
///
/// Implementations must be cheap to call repeatedly; the dispatcher
/// retries failed entries on later polls.
pub trait Mailer: Send + Sync + 'static {
    fn send(&self, email: &TicketEmail)
        -> impl Future<Output = Result<(), MailerError>> + Send;
}

/// Mailer that only logs. Used in development and tests, and as the
/// safe default when no transport is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, email: &TicketEmail) -> Result<(), MailerError> {
        info!(
            recipient = %email.recipient,
            subject = %email.subject,
            "LogMailer: pretending to deliver ticket e-mail"
        );
        Ok(())
    }
}
