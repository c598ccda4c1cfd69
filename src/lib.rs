pub mod browser;
pub mod common;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod scrapers;
pub mod seats;
pub mod sources;

pub use common::{
    EventIdentifier, EventRecord, FailureKind, Resolution, ResolutionPath, Result, ScraperError,
    SeatAvailability,
};
