//! Browser-automation session boundary.
//!
//! The seat engine only depends on the capabilities of [`BrowserSession`]:
//! navigation, element lookup, attribute / markup reads, synthetic clicks,
//! script evaluation and switching between the top-level document and a
//! nested (iframe) document. [`chrome::ChromeSession`] provides them over the
//! Chrome DevTools Protocol.

pub mod chrome;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub use chrome::ChromeSession;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The element or document exists but is not attached yet (or any more).
    #[error("Element not attached: {0}")]
    NotAttached(String),

    #[error("No element matches {0}")]
    NoSuchElement(String),

    #[error("Frame unavailable: {0}")]
    FrameUnavailable(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    /// The browser process or its protocol connection is gone.
    #[error("Session closed: {0}")]
    Closed(String),
}

impl SessionError {
    /// Transient errors are "not yet true" for a readiness check.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::NotAttached(_) | SessionError::NoSuchElement(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Closed(_))
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// `document.readyState` of the active context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "loading" => Some(ReadyState::Loading),
            "interactive" => Some(ReadyState::Interactive),
            "complete" => Some(ReadyState::Complete),
            _ => None,
        }
    }

    /// Interactive or complete.
    pub fn is_usable(&self) -> bool {
        !matches!(self, ReadyState::Loading)
    }
}

/// A nested document reference: the `index`-th element matching `selector`
/// in the top-level document, plus the address it loaded (when known).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRef {
    pub selector: String,
    pub index: usize,
    pub src: Option<String>,
}

impl fmt::Display for FrameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.selector, self.index)?;
        if let Some(src) = &self.src {
            write!(f, " ({})", src)?;
        }
        Ok(())
    }
}

/// The document scope the session is currently inside. Exactly one is active.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RenderingContext {
    #[default]
    TopLevel,
    Nested(FrameRef),
}

impl RenderingContext {
    pub fn is_top_level(&self) -> bool {
        matches!(self, RenderingContext::TopLevel)
    }
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load `url` in the top-level document. Always leaves the session at top level.
    async fn navigate(&mut self, url: &str) -> SessionResult<()>;

    /// Address of the top-level document.
    async fn current_url(&self) -> SessionResult<Option<String>>;

    async fn ready_state(&self) -> SessionResult<ReadyState>;

    /// Number of elements matching `selector` in the active context.
    async fn count(&self, selector: &str) -> SessionResult<usize>;

    /// Value of attribute `name` on every element matching `selector`, in document order.
    async fn attributes(&self, selector: &str, name: &str) -> SessionResult<Vec<Option<String>>>;

    /// Serialized markup of the active context's document.
    async fn html(&self) -> SessionResult<String>;

    /// Synthetic click on the `index`-th element matching `selector`.
    async fn click(&mut self, selector: &str, index: usize) -> SessionResult<()>;

    /// Evaluate a script against the top-level page and return its JSON result.
    async fn evaluate(&mut self, script: &str) -> SessionResult<serde_json::Value>;

    /// Whether `frame` exists and its document is reachable.
    async fn frame_attached(&self, frame: &FrameRef) -> SessionResult<bool>;

    async fn switch_to_frame(&mut self, frame: &FrameRef) -> SessionResult<()>;

    /// Restore the top-level context. Infallible and idempotent.
    fn exit_to_top(&mut self);

    fn context(&self) -> &RenderingContext;

    /// Release the underlying browser. Sessions are not usable afterwards.
    async fn close(&mut self) {}
}
