//! Entering and leaving nested documents.
//!
//! [`ContextSwitcher::enter`] hands out a [`NestedContext`] guard that derefs
//! to the session; dropping the guard restores the top-level context, so every
//! exit path of a nested-document step (including `?` and early returns)
//! leaves the session at top level.

use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tracing::debug;

use super::poller::Poller;
use crate::browser::{BrowserSession, FrameRef, SessionError};
use crate::common::error::{Result, ScraperError};

pub struct ContextSwitcher<'p> {
    poller: &'p Poller,
    attach_timeout: Duration,
}

impl<'p> ContextSwitcher<'p> {
    pub fn new(poller: &'p Poller, attach_timeout: Duration) -> Self {
        Self {
            poller,
            attach_timeout,
        }
    }

    /// Switch into `frame`, waiting for its document to attach.
    ///
    /// Stale references and documents that never attach both fail with
    /// `ContextUnavailable`. On failure the session is left at top level.
    pub async fn enter<'s, S>(&self, session: &'s mut S, frame: &FrameRef) -> Result<NestedContext<'s, S>>
    where
        S: BrowserSession + ?Sized,
    {
        let attached = {
            let probe_session: &S = session;
            self.poller
                .wait_until("nested document to attach", self.attach_timeout, || async move {
                    probe_session.frame_attached(frame).await
                })
                .await
        };
        match attached {
            Ok(()) => {}
            Err(ScraperError::Timeout { elapsed, .. }) => {
                return Err(ScraperError::ContextUnavailable(format!(
                    "{} did not attach within {}ms",
                    frame,
                    elapsed.as_millis()
                )));
            }
            Err(e) => return Err(e),
        }

        if let Err(e) = session.switch_to_frame(frame).await {
            session.exit_to_top();
            return Err(match e {
                SessionError::Closed(_) => e.into(),
                other => ScraperError::ContextUnavailable(other.to_string()),
            });
        }
        debug!(frame = %frame, "entered nested document");
        Ok(NestedContext { session })
    }

    /// Restore the top-level context. Safe to call at top level.
    pub fn exit_to_top<S>(session: &mut S)
    where
        S: BrowserSession + ?Sized,
    {
        if !session.context().is_top_level() {
            debug!("returning to top-level document");
        }
        session.exit_to_top();
    }
}

/// Scoped access to the session while it is inside a nested document.
pub struct NestedContext<'s, S: BrowserSession + ?Sized> {
    session: &'s mut S,
}

impl<S: BrowserSession + ?Sized> Deref for NestedContext<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session
    }
}

impl<S: BrowserSession + ?Sized> DerefMut for NestedContext<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session
    }
}

impl<S: BrowserSession + ?Sized> Drop for NestedContext<'_, S> {
    fn drop(&mut self) {
        ContextSwitcher::exit_to_top(&mut *self.session);
    }
}
