use std::time::Duration;
use tracing::{debug, info};

use super::poller::Poller;
use crate::browser::BrowserSession;
use crate::common::error::{Result, ScraperError};

/// Some venues show a "pick an area" step before any seat renders.
///
/// Only the first control in document order is ever activated. The observed
/// layouts have a single default area; venues with several real areas would
/// need a smarter choice.
pub struct AreaDisambiguator<'p> {
    poller: &'p Poller,
    control_selector: &'p str,
    settle: Duration,
}

impl<'p> AreaDisambiguator<'p> {
    pub fn new(poller: &'p Poller, control_selector: &'p str, settle: Duration) -> Self {
        Self {
            poller,
            control_selector,
            settle,
        }
    }

    /// Returns `true` when an area control was found and clicked.
    /// Absence within `timeout` is the common case and not an error.
    pub async fn resolve_area_if_present<S>(&self, session: &mut S, timeout: Duration) -> Result<bool>
    where
        S: BrowserSession + ?Sized,
    {
        let found = self
            .poller
            .wait_for_selector(&*session, self.control_selector, "area-selection control", timeout)
            .await;
        match found {
            Ok(()) => {}
            Err(ScraperError::Timeout { .. }) => {
                debug!("no area selection step");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        session.click(self.control_selector, 0).await?;
        info!(selector = self.control_selector, "selected first seating area");
        self.poller.settle("area re-render", self.settle).await?;
        Ok(true)
    }
}
