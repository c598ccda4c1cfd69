use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::browser::SessionError;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Timed out after {}ms waiting for {condition}", elapsed.as_millis())]
    Timeout { condition: String, elapsed: Duration },

    #[error("Nested document unavailable: {0}")]
    ContextUnavailable(String),

    #[error("Unexpected page structure: {0}")]
    StructureMismatch(String),

    /// A top-level page could not be loaded.
    #[error("Page failed to load: {0}")]
    PageLoad(String),

    #[error("Browser session fault: {0}")]
    SessionFault(String),

    #[error("Operation cancelled while waiting for {0}")]
    Cancelled(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScraperError {
    /// Fatal errors mean the session (or the whole run) cannot continue.
    /// Everything else is recoverable at the resolver or show-scraper boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScraperError::SessionFault(_) | ScraperError::Cancelled(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ScraperError::Timeout { .. } => FailureKind::Timeout,
            ScraperError::ContextUnavailable(_) => FailureKind::ContextUnavailable,
            ScraperError::StructureMismatch(_) => FailureKind::StructureMismatch,
            ScraperError::PageLoad(_) => FailureKind::PageLoad,
            ScraperError::SessionFault(_) | ScraperError::Cancelled(_) => FailureKind::SessionFault,
            _ => FailureKind::Other,
        }
    }

    pub fn timeout(condition: impl Into<String>, elapsed: Duration) -> Self {
        ScraperError::Timeout {
            condition: condition.into(),
            elapsed,
        }
    }
}

impl From<SessionError> for ScraperError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Closed(msg) => ScraperError::SessionFault(msg),
            SessionError::FrameUnavailable(msg) => ScraperError::ContextUnavailable(msg),
            SessionError::Navigation(msg) => ScraperError::PageLoad(msg),
            SessionError::NotAttached(msg)
            | SessionError::NoSuchElement(msg)
            | SessionError::Script(msg) => ScraperError::StructureMismatch(msg),
        }
    }
}

/// Failure taxonomy carried on unresolved seat counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    ContextUnavailable,
    StructureMismatch,
    PageLoad,
    SessionFault,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ContextUnavailable => "context_unavailable",
            FailureKind::StructureMismatch => "structure_mismatch",
            FailureKind::PageLoad => "page_load",
            FailureKind::SessionFault => "session_fault",
            FailureKind::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
