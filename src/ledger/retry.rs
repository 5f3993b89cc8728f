//! Caller-side retry on store conflicts
//!
//! Sits outside the transfer unit: each attempt is a fresh, fully independent
//! `transfer_tx` call. Only [`LedgerError::Conflict`] is retried.

use std::time::Duration;

use tracing::warn;

use super::error::{LedgerError, LedgerResult};
use super::models::{TransferResult, TransferTxParams};
use super::store::LedgerStore;
use super::transfer::TransferService;
use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, conflicts returned straight to the caller
    pub const NONE: RetryPolicy = RetryPolicy {
        max_attempts: 1,
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    };

    /// Delay before attempt `attempt + 1` (attempt is 1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::NONE
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

pub async fn transfer_with_retry<S: LedgerStore>(
    service: &TransferService<S>,
    params: TransferTxParams,
    policy: RetryPolicy,
) -> LedgerResult<TransferResult> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match service.transfer_tx(params).await {
            Err(LedgerError::Conflict(msg)) if attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %msg,
                    "Transfer conflict, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
