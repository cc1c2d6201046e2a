use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tracking::entities::WeekdayName;

/// Describes how the time of a finished week is archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloverPolicy {
    /// Folds the week into the running total: `total = sum(daily) + weekly`, `weekly = total`
    /// before the rollover.
    #[default]
    FoldForward,
    /// Copies the running total into the weekly field and leaves the total untouched.
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloverConfig {
    pub week_start: WeekdayName,
    pub policy: RolloverPolicy,
    /// How many times a single record update is attempted before the record is given up on
    /// until the next run.
    pub update_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            week_start: WeekdayName::Monday,
            policy: RolloverPolicy::default(),
            update_attempts: 3,
            retry_delay_secs: 5,
        }
    }
}

impl RolloverConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}
