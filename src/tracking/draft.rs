use chrono::NaiveDate;

use super::{
    catalog,
    entities::{NewTopic, TrackedTopic},
};

const HOURS_IN_DAY: f64 = 24.;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("User id can't be empty")]
    MissingUser,
    #[error("Topic \"{0}\" is not in the catalog")]
    UnknownTopic(String),
    #[error("Daily effort has to be more than 0 and at most 24 hours, got {0}")]
    DailyTargetOutOfRange(f64),
    #[error("Final goal of {final_goal} hours has to exceed the daily effort of {daily} hours")]
    FinalGoalTooSmall { final_goal: u32, daily: f64 },
    #[error("Starting date {start} has to be before ending date {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
    #[error("Topic \"{0}\" is already being tracked")]
    AlreadyTracked(String),
}

/// Raw values of the tracking form as entered by the user.
#[derive(Debug, Clone)]
pub struct TopicDraft {
    pub user_id: String,
    pub topic_id: String,
    pub daily_effort_target: f64,
    pub final_goal_hours: u32,
    pub starting_date: NaiveDate,
    pub ending_date: NaiveDate,
}

impl TopicDraft {
    /// Checks the form against the catalog and against topics the user already tracks.
    pub fn validate(self, existing: &[TrackedTopic]) -> Result<NewTopic, ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::MissingUser);
        }
        if catalog::find(&self.topic_id).is_none() {
            return Err(ValidationError::UnknownTopic(self.topic_id));
        }
        if !(self.daily_effort_target > 0. && self.daily_effort_target <= HOURS_IN_DAY) {
            return Err(ValidationError::DailyTargetOutOfRange(
                self.daily_effort_target,
            ));
        }
        if f64::from(self.final_goal_hours) <= self.daily_effort_target {
            return Err(ValidationError::FinalGoalTooSmall {
                final_goal: self.final_goal_hours,
                daily: self.daily_effort_target,
            });
        }
        if self.starting_date >= self.ending_date {
            return Err(ValidationError::InvalidPeriod {
                start: self.starting_date,
                end: self.ending_date,
            });
        }
        if existing
            .iter()
            .any(|v| v.user_id == self.user_id && v.topic_id == self.topic_id)
        {
            return Err(ValidationError::AlreadyTracked(self.topic_id));
        }

        Ok(NewTopic {
            user_id: self.user_id,
            topic_id: self.topic_id,
            daily_effort_target: self.daily_effort_target,
            final_goal_hours: self.final_goal_hours,
            starting_date: self.starting_date,
            ending_date: self.ending_date,
        })
    }
}
