//! # Dispatcher Configuration

use serde::{Deserialize, Serialize};

/// Configuration for the outbox dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Restaurant name printed on ticket headers.
    pub restaurant_name: String,

    /// Seconds between outbox polls.
    pub poll_interval_secs: u64,

    /// Maximum entries taken per poll.
    pub batch_size: u32,

    /// Delivery attempts before an entry is skipped (it stays in the
    /// table with its last error).
    pub max_attempts: i64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        NotifyConfig {
            restaurant_name: "Comanda".to_string(),
            poll_interval_secs: 5,
            batch_size: 50,
            max_attempts: 10,
        }
    }
}
