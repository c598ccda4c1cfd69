//! Seat-availability resolution engine.
//!
//! Leaves first: [`poller`] (bounded readiness waits), [`context`] (scoped
//! nested-document access), [`area`] (optional "pick an area" step),
//! [`counter`] (empty-seat count) and [`resolver`] (popup path with direct
//! navigation fallback).

pub mod area;
pub mod context;
pub mod counter;
pub mod poller;
pub mod resolver;

pub use area::AreaDisambiguator;
pub use context::{ContextSwitcher, NestedContext};
pub use counter::SeatCounter;
pub use poller::Poller;
pub use resolver::{ResolutionAttempt, SeatResolver, Stage};
