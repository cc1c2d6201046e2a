use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};

use super::time::ClockResolutionError;

/// Represents an entity responsible for providing dates across application. This allows the
/// daemon and the rollover job to be driven by a fake clock during testing.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    /// Resolves the calendar date the user currently lives in. Weekly rollover and the
    /// per-weekday ledger are keyed by this date, not by the UTC one.
    ///
    /// The default implementation can't fail: chrono falls back to UTC when the local offset is
    /// unknown. The error is for clocks backed by a source that can be unavailable, the test
    /// clock uses it to exercise that path.
    fn today(&self) -> Result<NaiveDate, ClockResolutionError> {
        Ok(self.time().with_timezone(&Local).date_naive())
    }

    async fn sleep(&self, duration: Duration);
}

/// System clock. Its [Clock::today] always resolves.
#[derive(Clone, Copy)]
pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
