//! Error mapping and retries for snapshot file operations.

use std::io::{self, ErrorKind};
use std::thread;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::error::StoreError;

/// Maps an I/O failure to a store error.
///
/// Interrupted, timed out and would-block failures are transient and may
/// be retried; anything else is fatal.
pub fn classify_io_error(error: io::Error, context: &str) -> StoreError {
    let message = format!("{}: {}", context, error);
    match error.kind() {
        ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            StoreError::TransientIoError(message)
        }
        _ => StoreError::IoError(message),
    }
}

/// Retry budget for transient I/O failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Pause before each retry
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            max_retries: config.persistence_max_retries,
            delay: Duration::from_millis(config.persistence_retry_delay_ms),
        }
    }

    /// A policy that gives up on the first failure.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Runs `operation`, repeating it while it fails with a transient
    /// error and the budget allows.
    pub fn run<T, F>(&self, label: &str, mut operation: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let mut retries = 0;
        loop {
            let err = match operation() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !matches!(err, StoreError::TransientIoError(_)) || retries >= self.max_retries {
                return Err(err);
            }
            retries += 1;
            tracing::warn!(
                "{} failed, retry {} of {}: {}",
                label,
                retries,
                self.max_retries,
                err
            );
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }
    }
}
