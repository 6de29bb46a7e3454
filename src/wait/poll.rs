// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{EnvironmentError, Result};
use crate::wait::predicate::Predicate;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run `check` immediately and then every `interval` until it reports done,
/// fails, `timeout` elapses or `cancel` fires.
///
/// Expiry and cancellation both end in `TimeoutError`. A single check that
/// outlives the deadline is cut short. A timeout too large to reach never
/// expires.
pub async fn poll_until<F, Fut>(
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now().checked_add(timeout);
    let timed_out = || EnvironmentError::TimeoutError(format!("condition not met within {:?}", timeout));
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Wait cancelled after {} checks", attempt - 1);
                return Err(EnvironmentError::TimeoutError("wait cancelled".to_string()));
            }
            outcome = async {
                match deadline {
                    Some(deadline) => timeout_at(deadline, check()).await,
                    None => Ok(check().await),
                }
            } => outcome,
        };

        match outcome {
            Err(_) => return Err(timed_out()),
            Ok(Err(e)) => return Err(e),
            Ok(Ok(true)) => {
                debug!("Condition met after {} checks", attempt);
                return Ok(());
            }
            Ok(Ok(false)) => {}
        }

        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(timed_out());
                }
                interval.min(deadline - now)
            }
            None => interval,
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Wait cancelled after {} checks", attempt);
                return Err(EnvironmentError::TimeoutError("wait cancelled".to_string()));
            }
            _ = sleep(pause) => {}
        }
    }
}

impl Predicate {
    /// Poll this predicate with its condition's interval and timeout.
    pub async fn poll(&self, cancel: &CancellationToken) -> Result<()> {
        let condition = self.condition();
        info!(
            "Waiting for {} (every {:?}, up to {:?})",
            condition,
            condition.interval(),
            condition.timeout()
        );
        poll_until(condition.interval(), condition.timeout(), cancel, move || self.check()).await
    }
}
