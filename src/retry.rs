//! Retry with exponential backoff for order-independent backend sends.
//!
//! Page loads are deliberately excluded: silently re-fetching a page
//! could interleave with index rebasing and desynchronize the window.
//! Only idempotent, order-independent calls (mark-read) go through here.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    MARK_READ_MAX_RETRIES, MARK_READ_MAX_RETRY_DELAY_SECS, MARK_READ_RETRY_DELAY_MS,
};

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial delay in milliseconds before the first retry
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay in seconds between retries
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

fn default_max_retries() -> u32 {
    MARK_READ_MAX_RETRIES
}

fn default_initial_delay_ms() -> u64 {
    MARK_READ_RETRY_DELAY_MS
}

fn default_max_delay_secs() -> u64 {
    MARK_READ_MAX_RETRY_DELAY_SECS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetryConfig {
    fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

/// Execute an async operation with exponential backoff retry.
///
/// The operation is retried up to `config.max_retries` times, with
/// exponentially increasing delays between attempts (capped at
/// `config.max_delay_secs`). Returns the first success, or the last
/// error once retries are exhausted.
pub async fn with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0;
    let mut delay = config.initial_delay();

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempts += 1;
                if attempts > config.max_retries {
                    return Err(e);
                }

                tracing::warn!(
                    "Send failed (attempt {}/{}): {}. Retrying in {:?}...",
                    attempts,
                    config.max_retries + 1,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;

                // Exponential backoff with cap
                delay = (delay * 2).min(config.max_delay());
            }
        }
    }
}
