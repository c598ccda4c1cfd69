use tracing::debug;

use crate::browser::BrowserSession;
use crate::common::error::Result;

/// Counts unoccupied seats in the active context.
///
/// The strict signature (`empty` class *and* `empty` status) is tried first;
/// when it matches nothing the loose one (either marker) is used. Zero is
/// returned when neither matches, so callers must check that the seat map
/// rendered before trusting a zero.
pub struct SeatCounter<'a> {
    strict: &'a str,
    loose: &'a str,
}

impl<'a> SeatCounter<'a> {
    pub fn new(strict: &'a str, loose: &'a str) -> Self {
        Self { strict, loose }
    }

    pub async fn count_empty_seats<S>(&self, session: &S) -> Result<u32>
    where
        S: BrowserSession + ?Sized,
    {
        let strict = session.count(self.strict).await?;
        if strict > 0 {
            debug!(strict, "counted seats with strict signature");
            return Ok(saturating_count(strict));
        }

        let loose = session.count(self.loose).await?;
        debug!(loose, "strict signature matched nothing, used loose signature");
        Ok(saturating_count(loose))
    }
}

fn saturating_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
