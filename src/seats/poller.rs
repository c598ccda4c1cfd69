//! Readiness polling with bounded timeouts.
//!
//! Every wait in the engine goes through [`Poller::wait_until`]: the probe is
//! retried with exponential backoff (capped) until it reports `true` or the
//! timeout elapses. Transient session errors count as "not yet"; fatal ones
//! end the wait immediately.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::browser::{BrowserSession, SessionError, SessionResult};
use crate::common::error::{Result, ScraperError};
use crate::config::TimeoutConfig;

#[derive(Debug, Clone)]
pub struct Poller {
    initial: Duration,
    max: Duration,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(initial: Duration, max: Duration, cancel: CancellationToken) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        Self {
            initial,
            max: max.max(initial),
            cancel,
        }
    }

    pub fn from_config(timeouts: &TimeoutConfig, cancel: CancellationToken) -> Self {
        Self::new(
            TimeoutConfig::ms(timeouts.poll_initial),
            TimeoutConfig::ms(timeouts.poll_max),
            cancel,
        )
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait until `probe` yields `Ok(true)`.
    ///
    /// `condition` names the wait in timeout errors and logs. The probe always
    /// runs at least once, even with a zero timeout.
    pub async fn wait_until<F, Fut>(&self, condition: &str, timeout: Duration, mut probe: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SessionResult<bool>>,
    {
        let start = Instant::now();
        let mut interval = self.initial;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ScraperError::Cancelled(condition.to_string()));
            }

            match probe().await {
                Ok(true) => {
                    trace!(condition, elapsed_ms = start.elapsed().as_millis() as u64, "condition met");
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) if e.is_transient() => {
                    trace!(condition, error = %e, "transient error while polling");
                }
                Err(e) => return Err(e.into()),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(ScraperError::timeout(condition, elapsed));
            }

            let pause = interval.min(timeout - elapsed);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(ScraperError::Cancelled(condition.to_string()));
                }
                _ = tokio::time::sleep(pause) => {}
            }
            interval = (interval * 2).min(self.max);
        }
    }

    /// Fixed pause that still honours cancellation.
    pub async fn settle(&self, condition: &str, pause: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ScraperError::Cancelled(condition.to_string())),
            _ = tokio::time::sleep(pause) => Ok(()),
        }
    }

    /// Active document reached `interactive` or `complete`.
    pub async fn wait_for_ready<S>(&self, session: &S, condition: &str, timeout: Duration) -> Result<()>
    where
        S: BrowserSession + ?Sized,
    {
        self.wait_until(condition, timeout, || async move {
            Ok::<bool, SessionError>(session.ready_state().await?.is_usable())
        })
        .await
    }

    /// At least one element matches `selector` in the active context.
    pub async fn wait_for_selector<S>(
        &self,
        session: &S,
        selector: &str,
        condition: &str,
        timeout: Duration,
    ) -> Result<()>
    where
        S: BrowserSession + ?Sized,
    {
        self.wait_until(condition, timeout, || async move {
            Ok::<bool, SessionError>(session.count(selector).await? > 0)
        })
        .await
    }
}
