use std::{collections::BTreeMap, fmt::Display};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical weekday names used as ledger keys. Persisted as `"Monday"`, `"Tuesday"` etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeekdayName {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl WeekdayName {
    pub const ALL: [WeekdayName; 7] = [
        WeekdayName::Monday,
        WeekdayName::Tuesday,
        WeekdayName::Wednesday,
        WeekdayName::Thursday,
        WeekdayName::Friday,
        WeekdayName::Saturday,
        WeekdayName::Sunday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    pub fn short(&self) -> &'static str {
        match self {
            WeekdayName::Monday => "Mon",
            WeekdayName::Tuesday => "Tue",
            WeekdayName::Wednesday => "Wed",
            WeekdayName::Thursday => "Thu",
            WeekdayName::Friday => "Fri",
            WeekdayName::Saturday => "Sat",
            WeekdayName::Sunday => "Sun",
        }
    }
}

impl From<Weekday> for WeekdayName {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Mon => WeekdayName::Monday,
            Weekday::Tue => WeekdayName::Tuesday,
            Weekday::Wed => WeekdayName::Wednesday,
            Weekday::Thu => WeekdayName::Thursday,
            Weekday::Fri => WeekdayName::Friday,
            Weekday::Sat => WeekdayName::Saturday,
            Weekday::Sun => WeekdayName::Sunday,
        }
    }
}

impl Display for WeekdayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WeekdayName::Monday => "Monday",
            WeekdayName::Tuesday => "Tuesday",
            WeekdayName::Wednesday => "Wednesday",
            WeekdayName::Thursday => "Thursday",
            WeekdayName::Friday => "Friday",
            WeekdayName::Saturday => "Saturday",
            WeekdayName::Sunday => "Sunday",
        };
        write!(f, "{name}")
    }
}

/// Time spent on a topic for every day of the current week. A day without an entry counts as
/// zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyLedger(BTreeMap<WeekdayName, Duration>);

impl DailyLedger {
    pub fn get(&self, day: WeekdayName) -> Duration {
        self.0.get(&day).copied().unwrap_or_else(Duration::zero)
    }

    /// Adds time to a day. Non-positive amounts are ignored, the ledger never decreases.
    pub fn add(&mut self, day: WeekdayName, duration: Duration) {
        if duration <= Duration::zero() {
            return;
        }
        *self.0.entry(day).or_insert_with(Duration::zero) += duration;
    }

    pub fn sum(&self) -> Duration {
        self.0.values().fold(Duration::zero(), |ac, next| ac + *next)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| v.is_zero())
    }

    /// Iterates over all seven days in order, including the ones without entries.
    pub fn days(&self) -> impl Iterator<Item = (WeekdayName, Duration)> + '_ {
        WeekdayName::ALL.into_iter().map(|day| (day, self.get(day)))
    }
}

impl FromIterator<(WeekdayName, Duration)> for DailyLedger {
    fn from_iter<T: IntoIterator<Item = (WeekdayName, Duration)>>(iter: T) -> Self {
        let mut ledger = DailyLedger::default();
        for (day, duration) in iter {
            ledger.add(day, duration);
        }
        ledger
    }
}

impl Serialize for DailyLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0
            .iter()
            .map(|(day, duration)| (*day, duration.num_seconds()))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DailyLedger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let seconds = BTreeMap::<WeekdayName, i64>::deserialize(deserializer)?;
        let mut ledger = BTreeMap::new();
        for (day, value) in seconds {
            if value < 0 {
                return Err(serde::de::Error::custom(format!(
                    "negative time {value} recorded for {day}"
                )));
            }
            ledger.insert(day, Duration::seconds(value));
        }
        Ok(DailyLedger(ledger))
    }
}

mod duration_ser {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(s))
    }
}

/// A user's goal-tracking record for one topic from the catalog. Stored as one json line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedTopic {
    pub id: u64,
    pub user_id: String,
    pub topic_id: String,
    /// Minimum hours per day the user wants to spend.
    pub daily_effort_target: f64,
    pub final_goal_hours: u32,
    pub starting_date: NaiveDate,
    pub ending_date: NaiveDate,
    #[serde(with = "duration_ser")]
    pub total_time_spent: Duration,
    #[serde(with = "duration_ser")]
    pub weekly_time_spent: Duration,
    #[serde(default)]
    pub daily_time_spent: DailyLedger,
    /// Date of the last weekly rollover applied to this record.
    #[serde(default)]
    pub last_rollover: Option<NaiveDate>,
}

impl TrackedTopic {
    pub fn new(id: u64, topic: NewTopic) -> Self {
        let NewTopic {
            user_id,
            topic_id,
            daily_effort_target,
            final_goal_hours,
            starting_date,
            ending_date,
        } = topic;
        Self {
            id,
            user_id,
            topic_id,
            daily_effort_target,
            final_goal_hours,
            starting_date,
            ending_date,
            total_time_spent: Duration::zero(),
            weekly_time_spent: Duration::zero(),
            daily_time_spent: DailyLedger::default(),
            last_rollover: None,
        }
    }

    /// Records time spent on `date` into the ledger of the current week.
    pub fn record(&mut self, date: NaiveDate, duration: Duration) {
        self.daily_time_spent.add(WeekdayName::of(date), duration);
    }

    /// Time recorded up to the last rollover together with the time recorded this week.
    pub fn recorded_time(&self) -> Duration {
        self.total_time_spent + self.daily_time_spent.sum()
    }

    pub fn final_goal(&self) -> Duration {
        Duration::hours(i64::from(self.final_goal_hours))
    }
}

/// Validated data required for creating a [TrackedTopic]. Only produced by
/// [TopicDraft::validate](super::draft::TopicDraft::validate).
#[derive(Debug, Clone, PartialEq)]
pub struct NewTopic {
    pub user_id: String,
    pub topic_id: String,
    pub daily_effort_target: f64,
    pub final_goal_hours: u32,
    pub starting_date: NaiveDate,
    pub ending_date: NaiveDate,
}
