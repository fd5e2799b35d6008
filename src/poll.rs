// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bounded polling of the control plane.
//!
//! Every wait in a scenario is "evaluate a condition on a fixed interval until it
//! holds or the deadline passes". The first evaluation happens one interval after
//! the call, mirroring a ticker. A condition error aborts the wait immediately.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::errors::{Result, VerifyError};

/// Interval and deadline for a poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    /// Time between two evaluations
    pub interval: Duration,
    /// Overall deadline for one wait
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::constants::DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(crate::constants::DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Poll until `condition` yields a value, returning it.
///
/// `Ok(None)` means "not yet". The condition is evaluated at least once, even
/// when `timeout` is shorter than `interval`. No final evaluation runs at the
/// deadline itself.
///
/// # Errors
///
/// Returns the condition's error as soon as it occurs, or
/// [`VerifyError::Timeout`] when another evaluation would overrun the deadline.
pub async fn poll_for<T, F, Fut>(
    settings: PollSettings,
    description: &str,
    mut condition: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        tokio::time::sleep(settings.interval).await;
        attempt += 1;

        if let Some(value) = condition().await? {
            info!(
                wait = description,
                attempt = attempt,
                elapsed = ?start.elapsed(),
                "Condition satisfied"
            );
            return Ok(value);
        }

        if start.elapsed() + settings.interval > settings.timeout {
            return Err(VerifyError::Timeout {
                description: description.to_string(),
                timeout: settings.timeout,
            });
        }

        debug!(
            wait = description,
            attempt = attempt,
            elapsed = ?start.elapsed(),
            "Condition not yet satisfied, polling again"
        );
    }
}

/// Poll until `condition` returns `true`.
///
/// # Errors
///
/// Same as [`poll_for`].
pub async fn poll_until<F, Fut>(settings: PollSettings, description: &str, mut condition: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    poll_for(settings, description, || {
        let fut = condition();
        async move { Ok(fut.await?.then_some(())) }
    })
    .await
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod poll_tests;
