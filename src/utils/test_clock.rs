use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{clock::Clock, time::ClockResolutionError};

/// Clock that only moves when something sleeps on it. Dates are resolved in UTC so tests don't
/// depend on the timezone of the machine.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    resolvable: bool,
}

impl TestClock {
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(time)),
            resolvable: true,
        }
    }

    pub fn unresolvable(time: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(time)),
            resolvable: false,
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += duration;
    }
}

#[async_trait]
impl Clock for TestClock {
    fn time(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn today(&self) -> Result<NaiveDate, ClockResolutionError> {
        if self.resolvable {
            Ok(self.time().date_naive())
        } else {
            Err(ClockResolutionError::Unavailable("test clock".into()))
        }
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(chrono::Duration::from_std(duration).unwrap());
        tokio::task::yield_now().await;
    }
}
