// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry engine with exponential backoff + jitter for backend calls.
//
// Classifies errors into Transient (auto-retry), UserAction (wait for user),
// and Permanent (give up). Only errors the policy deems retryable trigger
// another attempt.

use std::future::Future;
use std::time::Duration;

use satzwerk_core::config::RetrySettings;
use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::types::ErrorClass;
use tracing::{debug, info, warn};

/// Retry policy for one backend call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base delay between attempts (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Which errors are worth another attempt.
    pub retryable: fn(&SatzwerkError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            retryable: is_transient,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            retryable: is_transient,
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry: the error is permanent or needs the user.
    GiveUp(ErrorClass),
    /// Maximum attempts used up.
    Exhausted,
}

/// Classify a `SatzwerkError` into an `ErrorClass` for retry decisions.
pub fn classify_error(err: &SatzwerkError) -> ErrorClass {
    match err {
        SatzwerkError::RateLimited { .. } => ErrorClass::Transient,
        SatzwerkError::Network(_) => ErrorClass::Transient,
        SatzwerkError::Timeout(_) => ErrorClass::Transient,
        SatzwerkError::Database(_) => ErrorClass::Transient,

        SatzwerkError::Api { status, .. } => match *status {
            401 | 403 => ErrorClass::UserAction,
            500..=599 => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        },

        SatzwerkError::Configuration { .. } => ErrorClass::UserAction,
        SatzwerkError::Font(_) => ErrorClass::UserAction,

        SatzwerkError::LayoutAnalysis(_) => ErrorClass::Permanent,
        SatzwerkError::ContentExtraction(_) => ErrorClass::Permanent,
        SatzwerkError::Translation(_) => ErrorClass::Permanent,
        SatzwerkError::Pdf(_) => ErrorClass::Permanent,
        SatzwerkError::Image(_) => ErrorClass::Permanent,
        SatzwerkError::Serialization(_) => ErrorClass::Permanent,

        // IO errors depend on the kind
        SatzwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::Interrupted => ErrorClass::Transient,
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::UserAction
            }
            _ => ErrorClass::Permanent,
        },
    }
}

/// Default retry predicate: rate limits, network failures, timeouts, 5xx.
pub fn is_transient(err: &SatzwerkError) -> bool {
    classify_error(err) == ErrorClass::Transient
}

impl RetryPolicy {
    /// Decide what to do after attempt number `attempt` (0-based) failed.
    pub fn should_retry(&self, err: &SatzwerkError, attempt: u32) -> RetryDecision {
        if !(self.retryable)(err) {
            let class = classify_error(err);
            info!(?class, "error is not retryable");
            return RetryDecision::GiveUp(class);
        }

        if attempt + 1 >= self.max_attempts {
            warn!(attempt, max = self.max_attempts, "retry limit exhausted");
            return RetryDecision::Exhausted;
        }

        let delay = match err {
            SatzwerkError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Duration::from_secs(*secs).min(self.max_delay),
            _ => self.compute_delay(attempt),
        };
        debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling retry");
        RetryDecision::RetryAfter(delay)
    }

    /// Compute exponential backoff delay with jitter.
    ///
    /// delay = min(base * 2^attempt + jitter, max_delay)
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));

        let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
        let capped_ms = total_ms.min(self.max_delay.as_millis() as u64);

        Duration::from_millis(capped_ms)
    }

    /// Run `op` until it succeeds, gives up, or exhausts its attempts.
    ///
    /// `op` receives the 0-based attempt number. Failures come back as
    /// [`SatzwerkError::Translation`] carrying the last underlying error.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match self.should_retry(&err, attempt) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(label, attempt, error = %err, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp(_) => {
                    return Err(SatzwerkError::Translation(format!("{label}: {err}")));
                }
                RetryDecision::Exhausted => {
                    return Err(SatzwerkError::Translation(format!(
                        "{label}: {} attempts failed; last: {err}",
                        attempt + 1
                    )));
                }
            }
        }
    }
}

/// Deterministic jitter in `[0, base)` spread by the attempt number.
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}
