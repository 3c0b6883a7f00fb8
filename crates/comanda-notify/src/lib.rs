//! # comanda-notify: Outbound Ticket Dispatcher
//!
//! Background delivery of the ticket e-mails queued in
//! `comanda-db`'s ticket outbox.
//!
//! ## Modules
//!
//! - [`config`] - Dispatcher configuration
//! - [`error`] - Notify error types
//! - [`mailer`] - The `Mailer` trait and the `LogMailer` stand-in
//! - [`render`] - Plain-text ticket rendering and queueing
//! - [`dispatcher`] - The polling worker
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = NotifyConfig::default();
//! let (dispatcher, handle) = Dispatcher::new(db.clone(), config.clone(), LogMailer);
//! tokio::spawn(dispatcher.run());
//!
//! // After a payment with a known customer e-mail:
//! queue_ticket_for_order(&db, &order_id, &config).await?;
//!
//! // On shutdown:
//! handle.shutdown().await?;
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod mailer;
pub mod render;

pub use config::NotifyConfig;
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::{NotifyError, NotifyResult};
pub use mailer::{LogMailer, Mailer, MailerError};
pub use render::{queue_ticket_for_order, render_ticket, ticket_subject};
