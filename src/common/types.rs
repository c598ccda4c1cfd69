use crate::common::error::{FailureKind, ScraperError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token naming one scheduled performance on a show-detail page.
/// Only ever used to key DOM affordances (trigger link, popup container).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventIdentifier(String);

impl EventIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a seat count could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReason {
    pub kind: FailureKind,
    pub detail: String,
}

impl UnresolvedReason {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl From<&ScraperError> for UnresolvedReason {
    fn from(err: &ScraperError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Outcome of one resolution attempt. An unresolved count is a normal record state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatAvailability {
    Count(u32),
    Unresolved(UnresolvedReason),
}

impl SeatAvailability {
    pub fn count(&self) -> Option<u32> {
        match self {
            SeatAvailability::Count(n) => Some(*n),
            SeatAvailability::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, SeatAvailability::Count(_))
    }
}

impl fmt::Display for SeatAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatAvailability::Count(n) => write!(f, "{} seats", n),
            SeatAvailability::Unresolved(reason) => write!(f, "unresolved ({})", reason),
        }
    }
}

/// Which path produced the seat count, or was the last one attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    Popup,
    Direct,
}

impl ResolutionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionPath::Popup => "popup",
            ResolutionPath::Direct => "direct",
        }
    }
}

/// What the resolver hands back to the show scraper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub availability: SeatAvailability,
    pub path: ResolutionPath,
    /// The session was navigated away from the show page; the caller has to
    /// re-navigate before the next event can use the popup path.
    pub left_page: bool,
}

/// One scraped performance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub title: String,
    pub city: String,
    pub hall: String,
    pub date: String,
    pub time: String,
    #[serde(rename = "eventId")]
    pub event_id: EventIdentifier,
    pub seats: SeatAvailability,
}
