// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for Kubernetes API calls.
//!
//! Two policies live here:
//! - [`retry_api_call`] retries transient API errors (429, 5xx, transport) and fails
//!   fast on permanent errors.
//! - [`retry_on_conflict`] re-runs a read-modify-write cycle when the API server
//!   rejects a write with 409 Conflict because the object changed underneath it.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::constants::{HTTP_CONFLICT, HTTP_TOO_MANY_REQUESTS};
use crate::errors::{Result, VerifyError};

/// Maximum total time to spend retrying (5 minutes)
const MAX_ELAPSED_TIME_SECS: u64 = 300;

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (30 seconds)
const MAX_INTERVAL_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Conflict retry initial interval (10ms), the object usually settles quickly
const CONFLICT_INITIAL_INTERVAL_MILLIS: u64 = 10;

/// Conflict retry maximum interval (1 second)
const CONFLICT_MAX_INTERVAL_SECS: u64 = 1;

/// Number of read-modify-write attempts before giving up on a conflict
const CONFLICT_MAX_ATTEMPTS: u32 = 5;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    /// Start time for tracking total elapsed time
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = (secs - delta) + rand::random::<f64>() * (2.0 * delta);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Create default exponential backoff configuration for Kubernetes API retries.
///
/// # Configuration
///
/// - **Initial interval**: 100ms
/// - **Max interval**: 30 seconds
/// - **Max elapsed time**: 5 minutes total
/// - **Multiplier**: 2.0 (exponential growth)
/// - **Randomization**: ±10% (prevents thundering herd)
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(MAX_INTERVAL_SECS),
        Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Create backoff configuration for update conflicts.
///
/// Attempts are bounded by count ([`CONFLICT_MAX_ATTEMPTS`]) rather than time.
#[must_use]
pub fn conflict_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(CONFLICT_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(CONFLICT_MAX_INTERVAL_SECS),
        None,
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Retry a Kubernetes API call with exponential backoff.
///
/// Automatically retries on transient errors (HTTP 429, 5xx, transport) and fails
/// immediately on permanent errors (4xx client errors except 429).
///
/// # Errors
///
/// Returns the last API error when it is not retryable or the backoff is exhausted.
///
/// # Example
///
/// ```no_run
/// use kube::{Api, Client};
/// use machine_e2e::crd::MachineSet;
/// use machine_e2e::retry::retry_api_call;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::try_default().await?;
/// let api: Api<MachineSet> = Api::namespaced(client, "kube-system");
///
/// let machine_set = retry_api_call(
///     || async { api.get("workers-6b7f9").await },
///     "get machineset workers-6b7f9"
/// ).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = default_backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Kubernetes API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    debug!(
                        operation = operation_name,
                        error = %e,
                        "Non-retryable Kubernetes API error, failing immediately"
                    );
                    return Err(e.into());
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable Kubernetes API error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(e.into());
                }
            }
        }
    }
}

/// Run a read-modify-write cycle, re-running it when the write hits a conflict.
///
/// `operation` must re-read the object on every call so the write carries a fresh
/// `resourceVersion`.
///
/// # Errors
///
/// Returns the first non-conflict error, or the conflict error after
/// [`CONFLICT_MAX_ATTEMPTS`] attempts.
pub async fn retry_on_conflict<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = conflict_backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Err(VerifyError::Kube(e)) if is_conflict(&e) && attempt < CONFLICT_MAX_ATTEMPTS => {
                let duration = backoff
                    .next_backoff()
                    .unwrap_or(Duration::from_secs(CONFLICT_MAX_INTERVAL_SECS));
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    retry_after = ?duration,
                    "Write conflict, re-reading object and retrying"
                );
                tokio::time::sleep(duration).await;
            }
            other => return other,
        }
    }
}

/// Determine if a Kubernetes error is retryable.
///
/// # Retryable Errors
///
/// - **HTTP 429** (Too Many Requests) - Rate limiting
/// - **HTTP 5xx** (Server Errors) - Temporary API server issues
/// - **Service Errors** - Network/connection issues
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            api_err.code == HTTP_TOO_MANY_REQUESTS || (500..600).contains(&api_err.code)
        }
        kube::Error::Service(_) => true,
        _ => false,
    }
}

/// Whether the API server rejected a write because the object changed.
#[must_use]
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == HTTP_CONFLICT)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
