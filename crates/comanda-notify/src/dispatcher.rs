//! # Outbox Dispatcher
//!
//! Polling worker that drains the ticket outbox.
//!
//! ## Flow
//! ```text
//! every poll_interval:
//!   entries = outbox.get_pending(batch_size)
//!   skip (and warn about) entries past max_attempts
//!   for each remaining entry:
//!     mailer.send(entry)
//!       ok  -> outbox.mark_sent(entry)
//!       err -> outbox.mark_failed(entry, error)   (retried next poll)
//! ```
//!
//! The worker never touches order state and swallows nothing: every
//! outcome lands on the outbox row.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use comanda_db::Database;

use crate::config::NotifyConfig;
use crate::error::{NotifyError, NotifyResult};
use crate::mailer::Mailer;

/// The outbox polling worker. Spawn [`Dispatcher::run`] as a
/// background task.
pub struct Dispatcher<M: Mailer> {
    db: Arc<Database>,
    config: NotifyConfig,
    mailer: M,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling a running dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl DispatcherHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> NotifyResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| NotifyError::Channel("Shutdown channel closed".into()))
    }
}

impl<M: Mailer> Dispatcher<M> {
    /// Creates a new dispatcher and its control handle.
    pub fn new(db: Arc<Database>, config: NotifyConfig, mailer: M) -> (Self, DispatcherHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let dispatcher = Dispatcher {
            db,
            config,
            mailer,
            shutdown_rx,
        };

        (dispatcher, DispatcherHandle { shutdown_tx })
    }

    /// Runs the polling loop until shutdown.
    pub async fn run(mut self) {
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            "Ticket dispatcher starting"
        );

        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_batch().await {
                        error!(?e, "Failed to process outbox batch");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Ticket dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Ticket dispatcher stopped");
    }

    /// Processes one batch of pending entries. Returns how many were
    /// delivered.
    pub async fn process_batch(&self) -> NotifyResult<usize> {
        let entries = self
            .db
            .outbox()
            .get_pending(self.config.batch_size)
            .await?;

        if entries.is_empty() {
            debug!("No pending ticket e-mails");
            return Ok(0);
        }

        // Entries past the retry budget stay in the table with their
        // last error; they just stop being attempted.
        let (processable, exhausted): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| e.attempts < self.config.max_attempts);

        for entry in &exhausted {
            warn!(
                id = %entry.id,
                order_id = %entry.order_id,
                attempts = entry.attempts,
                last_error = ?entry.last_error,
                "Skipping ticket e-mail that exceeded max attempts"
            );
        }

        let mut delivered = 0;
        for entry in &processable {
            match self.mailer.send(entry).await {
                Ok(()) => {
                    self.db.outbox().mark_sent(&entry.id).await?;
                    info!(id = %entry.id, recipient = %entry.recipient, "Ticket e-mail sent");
                    delivered += 1;
                }
                Err(e) => {
                    self.db.outbox().mark_failed(&entry.id, &e.0).await?;
                    warn!(id = %entry.id, error = %e, "Ticket e-mail delivery failed");
                }
            }
        }

        Ok(delivered)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
