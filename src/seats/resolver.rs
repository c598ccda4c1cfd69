//! Seat availability resolution.
//!
//! ```text
//! Start -> Popup{Triggered, PopupOpen, ContextEntered, AreaResolved, SeatsReady} -> Resolved
//!            | failure, address captured           | failure, no address
//!            v                                     v
//!          Direct{Navigated, AreaResolved, SeatsReady} -> Resolved | Unresolved
//! ```
//!
//! The popup path keeps the show page loaded so the next event can reuse it.
//! The direct path loads the seat-map document on its own and leaves the
//! session navigated away; [`Resolution::left_page`] tells the caller.

use regex::Regex;
use reqwest::Url;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::area::AreaDisambiguator;
use super::context::ContextSwitcher;
use super::counter::SeatCounter;
use super::poller::Poller;
use crate::browser::{BrowserSession, FrameRef, SessionError};
use crate::common::constants::with_event_id;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{
    EventIdentifier, Resolution, ResolutionPath, SeatAvailability, UnresolvedReason,
};
use crate::config::{Config, TimeoutConfig};
use crate::metrics::ResolverMetrics;

/// Named steps of the state machine, used in logs and failure details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Triggered,
    PopupOpen,
    ContextEntered,
    Navigated,
    AreaResolved,
    SeatsReady,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Triggered => "triggered",
            Stage::PopupOpen => "popup_open",
            Stage::ContextEntered => "context_entered",
            Stage::Navigated => "navigated",
            Stage::AreaResolved => "area_resolved",
            Stage::SeatsReady => "seats_ready",
        };
        f.write_str(name)
    }
}

/// State carried through one `resolve` call.
#[derive(Debug)]
pub struct ResolutionAttempt {
    pub path: ResolutionPath,
    pub stage: Option<Stage>,
    /// Address of the nested seat-map document, once the popup exposed one.
    pub captured_address: Option<String>,
}

impl ResolutionAttempt {
    fn new() -> Self {
        Self {
            path: ResolutionPath::Popup,
            stage: None,
            captured_address: None,
        }
    }

    fn reached(&mut self, stage: Stage) {
        debug!(path = self.path.as_str(), %stage, "resolution stage reached");
        self.stage = Some(stage);
    }
}

pub struct SeatResolver<'c> {
    config: &'c Config,
    poller: Poller,
}

impl<'c> SeatResolver<'c> {
    pub fn new(config: &'c Config, poller: Poller) -> Self {
        Self { config, poller }
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Resolve the empty-seat count for `event_id` on the currently loaded show page.
    ///
    /// Only fatal errors (`SessionFault`, `Cancelled`) are returned as `Err`;
    /// every other failure becomes `SeatAvailability::Unresolved`. The session
    /// is always back at top level when this returns.
    #[instrument(skip(self, session), fields(event_id = %event_id))]
    pub async fn resolve<S>(&self, session: &mut S, event_id: &EventIdentifier) -> Result<Resolution>
    where
        S: BrowserSession + ?Sized,
    {
        let started = Instant::now();
        let mut attempt = ResolutionAttempt::new();
        debug!(
            budget_ms = self.config.timeouts.resolve_budget().as_millis() as u64,
            "resolving seats"
        );

        let popup = self.popup_path(session, event_id, &mut attempt).await;
        ContextSwitcher::exit_to_top(session);

        let resolution = match popup {
            Ok(count) => {
                info!(count, "resolved via popup");
                Resolution {
                    availability: SeatAvailability::Count(count),
                    path: ResolutionPath::Popup,
                    left_page: false,
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(popup_err) => {
                warn!(
                    stage = ?attempt.stage,
                    error = %popup_err,
                    "popup path failed"
                );
                match attempt.captured_address.take() {
                    None => Resolution {
                        availability: SeatAvailability::Unresolved(UnresolvedReason::from(&popup_err)),
                        path: ResolutionPath::Popup,
                        left_page: false,
                    },
                    Some(address) => {
                        ResolverMetrics::record_fallback();
                        attempt.path = ResolutionPath::Direct;
                        let direct = self.direct_path(session, &address, &mut attempt).await;
                        ContextSwitcher::exit_to_top(session);
                        match direct {
                            Ok(count) => {
                                info!(count, address = %address, "resolved via direct navigation");
                                Resolution {
                                    availability: SeatAvailability::Count(count),
                                    path: ResolutionPath::Direct,
                                    left_page: true,
                                }
                            }
                            Err(e) if e.is_fatal() => return Err(e),
                            Err(direct_err) => {
                                warn!(error = %direct_err, address = %address, "direct path failed");
                                let mut reason = UnresolvedReason::from(&direct_err);
                                reason.detail = format!("{} (popup path: {})", reason.detail, popup_err);
                                Resolution {
                                    availability: SeatAvailability::Unresolved(reason),
                                    path: ResolutionPath::Direct,
                                    left_page: true,
                                }
                            }
                        }
                    }
                }
            }
        };

        ResolverMetrics::record_resolution(&resolution, started.elapsed());
        Ok(resolution)
    }

    async fn popup_path<S>(
        &self,
        session: &mut S,
        event_id: &EventIdentifier,
        attempt: &mut ResolutionAttempt,
    ) -> Result<u32>
    where
        S: BrowserSession + ?Sized,
    {
        let selectors = &self.config.selectors;
        let timeouts = &self.config.timeouts;
        let id = event_id.as_str();

        let trigger = with_event_id(&selectors.trigger, id);
        self.poller
            .wait_for_selector(&*session, &trigger, "event trigger", TimeoutConfig::ms(timeouts.trigger))
            .await?;
        session.click(&trigger, 0).await?;
        attempt.reached(Stage::Triggered);

        let popup = with_event_id(&selectors.popup, id);
        self.poller
            .wait_for_selector(&*session, &popup, "event popup", TimeoutConfig::ms(timeouts.popup))
            .await?;
        attempt.reached(Stage::PopupOpen);

        let frame_selector = format!("{} {}", popup, selectors.frame);
        self.poller
            .wait_for_selector(
                &*session,
                &frame_selector,
                "seat-map frame",
                TimeoutConfig::ms(timeouts.frame),
            )
            .await?;
        let sources = session.attributes(&frame_selector, "src").await?;
        let pattern = frame_pattern(&selectors.frame_src_pattern, id)?;
        let index = choose_frame_candidate(&sources, &pattern).ok_or_else(|| {
            ScraperError::StructureMismatch(format!("no frame candidates under {}", frame_selector))
        })?;
        let src = sources.get(index).cloned().flatten();
        attempt.captured_address = match &src {
            Some(src) => absolute_address(session.current_url().await?.as_deref(), src),
            None => None,
        };
        debug!(index, address = ?attempt.captured_address, "chose seat-map frame");

        let frame = FrameRef {
            selector: frame_selector,
            index,
            src,
        };
        let switcher = ContextSwitcher::new(&self.poller, TimeoutConfig::ms(timeouts.frame));
        let mut nested = switcher.enter(session, &frame).await?;
        self.poller
            .wait_for_ready(
                &*nested,
                "nested document ready",
                TimeoutConfig::ms(timeouts.frame_ready),
            )
            .await?;
        attempt.reached(Stage::ContextEntered);

        self.read_seat_map(&mut *nested, attempt).await
    }

    async fn direct_path<S>(&self, session: &mut S, address: &str, attempt: &mut ResolutionAttempt) -> Result<u32>
    where
        S: BrowserSession + ?Sized,
    {
        // The address belongs to the nested seat-map document.
        session.navigate(address).await.map_err(|e| match e {
            SessionError::Navigation(msg) => ScraperError::ContextUnavailable(msg),
            other => other.into(),
        })?;
        self.poller
            .wait_for_ready(
                &*session,
                "seat-map document ready",
                TimeoutConfig::ms(self.config.timeouts.page_ready),
            )
            .await?;
        attempt.reached(Stage::Navigated);

        self.read_seat_map(session, attempt).await
    }

    /// AreaResolved -> SeatsReady -> count, against the active context.
    async fn read_seat_map<S>(&self, session: &mut S, attempt: &mut ResolutionAttempt) -> Result<u32>
    where
        S: BrowserSession + ?Sized,
    {
        let selectors = &self.config.selectors;
        let timeouts = &self.config.timeouts;

        AreaDisambiguator::new(
            &self.poller,
            &selectors.area_control,
            TimeoutConfig::ms(timeouts.area_settle),
        )
        .resolve_area_if_present(session, TimeoutConfig::ms(timeouts.area))
        .await?;
        attempt.reached(Stage::AreaResolved);

        self.poller
            .wait_for_selector(
                &*session,
                &selectors.seat_ready,
                "seat elements or seat-map container",
                TimeoutConfig::ms(timeouts.seats),
            )
            .await?;
        attempt.reached(Stage::SeatsReady);

        SeatCounter::new(&selectors.seat_strict, &selectors.seat_loose)
            .count_empty_seats(&*session)
            .await
    }
}

fn frame_pattern(template: &str, event_id: &str) -> Result<Regex> {
    let pattern = with_event_id(template, &regex::escape(event_id));
    Regex::new(&pattern)
        .map_err(|e| ScraperError::Config(format!("Invalid frame address pattern '{}': {}", pattern, e)))
}

/// Most specific candidate wins: the last frame whose address matches
/// `pattern`, otherwise the last frame in document order.
pub fn choose_frame_candidate(sources: &[Option<String>], pattern: &Regex) -> Option<usize> {
    sources
        .iter()
        .rposition(|src| src.as_deref().is_some_and(|s| pattern.is_match(s)))
        .or_else(|| sources.len().checked_sub(1))
}

/// Resolve a frame `src` against the page address. Blank and `about:` sources
/// cannot be navigated to and yield `None`.
pub fn absolute_address(page_url: Option<&str>, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("about:") || src.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(src) {
        return Some(url.to_string());
    }
    let base = Url::parse(page_url?).ok()?;
    base.join(src).ok().map(|url| url.to_string())
}
