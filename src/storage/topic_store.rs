use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::tracking::entities::{NewTopic, TrackedTopic};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Topic {0} not found")]
    NotFound(u64),
    #[error("User {user_id} already tracks topic {topic_id}")]
    Duplicate { user_id: String, topic_id: String },
}

/// Change of a single topic made by [TopicStore::update_with]. Returning `false` leaves the
/// stored topic as it was.
pub type TopicChange = Box<dyn FnOnce(&mut TrackedTopic) -> bool + Send>;

/// Interface for abstracting storage of tracked topics.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopicStore: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<TrackedTopic>, StoreError>;

    async fn get(&self, id: u64) -> Result<Option<TrackedTopic>, StoreError>;

    /// Persists a new topic, assigning it an id.
    async fn insert(&self, topic: NewTopic) -> Result<TrackedTopic, StoreError>;

    /// Overwrites a stored topic with the same id.
    async fn update(&self, topic: &TrackedTopic) -> Result<(), StoreError>;

    /// Reads, changes and writes back a single topic without letting other writers in between.
    /// Returns the changed topic, or `None` when `change` declined to change it.
    async fn update_with(
        &self,
        id: u64,
        change: TopicChange,
    ) -> Result<Option<TrackedTopic>, StoreError>;

    async fn delete(&self, id: u64) -> Result<(), StoreError>;

    /// Removes every topic of a user, returning how many were removed.
    async fn clear_user(&self, user_id: &str) -> Result<usize, StoreError>;
}

/// The main realization of [TopicStore].
pub struct FileTopicStore {
    path: PathBuf,
}

/// Parsed content of the topics file. Lines that can't be parsed are carried along untouched, a
/// rewrite of the file must not lose them.
#[derive(Debug, Default)]
struct TopicsFile {
    topics: Vec<TrackedTopic>,
    broken_lines: Vec<String>,
}

impl TopicsFile {
    fn parse(content: &str) -> Self {
        let mut file = TopicsFile::default();
        for line in content.lines().filter(|v| !v.trim().is_empty()) {
            match parse_line(line) {
                Some(topic) => file.topics.push(topic),
                None => file.broken_lines.push(line.to_string()),
            }
        }
        file
    }

    /// Next free id. Ids still readable from broken lines count as taken.
    fn next_id(&self) -> u64 {
        let broken_ids = self.broken_lines.iter().filter_map(|line| {
            serde_json::from_str::<serde_json::Value>(line)
                .ok()?
                .get("id")?
                .as_u64()
        });
        self.topics
            .iter()
            .map(|v| v.id)
            .chain(broken_ids)
            .max()
            .unwrap_or(0)
            + 1
    }

    fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buffer = Vec::<u8>::new();
        for topic in &self.topics {
            serde_json::to_writer(&mut buffer, topic)?;
            buffer.push(b'\n');
        }
        for line in &self.broken_lines {
            buffer.extend_from_slice(line.as_bytes());
            buffer.push(b'\n');
        }
        Ok(buffer)
    }
}

impl FileTopicStore {
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self { path })
    }

    async fn read_all(&self) -> Result<Vec<TrackedTopic>, StoreError> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        debug!("Reading topics from {:?}", self.path);
        file.lock_shared()?;
        let mut lines = BufReader::new(file).lines();
        let mut topics = vec![];
        while let Some(line) = lines.next_line().await? {
            if let Some(topic) = parse_line(&line) {
                topics.push(topic);
            }
        }
        lines.into_inner().into_inner().unlock_async().await?;
        Ok(topics)
    }

    /// Applies `change` to the stored topics while holding an exclusive lock and writes the
    /// result back.
    async fn modify<T: Send>(
        &self,
        change: impl FnOnce(&mut TopicsFile) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::modify_with_file(&mut file, change).await;
        file.unlock_async().await?;
        result
    }

    async fn modify_with_file<T>(
        file: &mut File,
        change: impl FnOnce(&mut TopicsFile) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        file.rewind().await?;
        let mut content = String::new();
        file.read_to_string(&mut content).await?;

        let mut topics = TopicsFile::parse(&content);
        let result = change(&mut topics)?;
        let buffer = topics.to_bytes()?;

        file.rewind().await?;
        file.set_len(0).await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(result)
    }
}

fn parse_line(line: &str) -> Option<TrackedTopic> {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<TrackedTopic>(line) {
        Ok(v) => Some(v),
        Err(e) => {
            // Might happen if a write was cut off by a shutdown.
            warn!("Found illegal topic record {line}: {e}");
            None
        }
    }
}

#[async_trait]
impl TopicStore for FileTopicStore {
    async fn fetch_all(&self) -> Result<Vec<TrackedTopic>, StoreError> {
        self.read_all().await
    }

    async fn get(&self, id: u64) -> Result<Option<TrackedTopic>, StoreError> {
        Ok(self.read_all().await?.into_iter().find(|v| v.id == id))
    }

    async fn insert(&self, topic: NewTopic) -> Result<TrackedTopic, StoreError> {
        self.modify(move |file| {
            if file
                .topics
                .iter()
                .any(|v| v.user_id == topic.user_id && v.topic_id == topic.topic_id)
            {
                return Err(StoreError::Duplicate {
                    user_id: topic.user_id,
                    topic_id: topic.topic_id,
                });
            }
            let created = TrackedTopic::new(file.next_id(), topic);
            file.topics.push(created.clone());
            Ok(created)
        })
        .await
    }

    async fn update(&self, topic: &TrackedTopic) -> Result<(), StoreError> {
        let topic = topic.clone();
        self.modify(move |file| {
            let stored = file
                .topics
                .iter_mut()
                .find(|v| v.id == topic.id)
                .ok_or(StoreError::NotFound(topic.id))?;
            *stored = topic;
            Ok(())
        })
        .await
    }

    async fn update_with(
        &self,
        id: u64,
        change: TopicChange,
    ) -> Result<Option<TrackedTopic>, StoreError> {
        self.modify(move |file| {
            let stored = file
                .topics
                .iter_mut()
                .find(|v| v.id == id)
                .ok_or(StoreError::NotFound(id))?;
            Ok(change(stored).then(|| stored.clone()))
        })
        .await
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.modify(move |file| {
            let before = file.topics.len();
            file.topics.retain(|v| v.id != id);
            if file.topics.len() == before {
                Err(StoreError::NotFound(id))
            } else {
                Ok(())
            }
        })
        .await
    }

    async fn clear_user(&self, user_id: &str) -> Result<usize, StoreError> {
        self.modify(move |file| {
            let before = file.topics.len();
            file.topics.retain(|v| v.user_id != user_id);
            Ok(before - file.topics.len())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use chrono::{Duration, NaiveDate};
    use tempfile::{tempdir, NamedTempFile};

    use crate::tracking::entities::{NewTopic, TrackedTopic, WeekdayName};

    use super::{FileTopicStore, StoreError, TopicStore};

    const TEST_START_DATE: NaiveDate = NaiveDate::from_ymd_opt(2018, 7, 2).unwrap();

    fn new_topic(user_id: &str, topic_id: &str) -> NewTopic {
        NewTopic {
            user_id: user_id.into(),
            topic_id: topic_id.into(),
            daily_effort_target: 1.5,
            final_goal_hours: 40,
            starting_date: TEST_START_DATE,
            ending_date: TEST_START_DATE + Duration::days(90),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() -> Result<()> {
        let dir = tempdir()?;
        let store = FileTopicStore::new(dir.path().join("nested").join("topics"))?;
        assert!(store.fetch_all().await?.is_empty());
        assert!(store.get(1).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() -> Result<()> {
        let dir = tempdir()?;
        let store = FileTopicStore::new(dir.path().join("topics"))?;
        let first = store.insert(new_topic("user", "reading")).await?;
        let second = store.insert(new_topic("user", "music")).await?;
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        store.delete(1).await?;
        let third = store.insert(new_topic("user", "fitness")).await?;
        assert_eq!(third.id, 3);

        let ids = store
            .fetch_all()
            .await?
            .into_iter()
            .map(|v| v.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![2, 3]);
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() -> Result<()> {
        let dir = tempdir()?;
        let store = FileTopicStore::new(dir.path().join("topics"))?;
        store.insert(new_topic("user", "reading")).await?;
        let result = store.insert(new_topic("user", "reading")).await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));
        store.insert(new_topic("other", "reading")).await?;
        assert_eq!(store.fetch_all().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_overwrites_record() -> Result<()> {
        let dir = tempdir()?;
        let store = FileTopicStore::new(dir.path().join("topics"))?;
        let mut topic = store.insert(new_topic("user", "reading")).await?;
        store.insert(new_topic("user", "music")).await?;

        topic.record(TEST_START_DATE, Duration::minutes(25));
        topic.total_time_spent = Duration::hours(4);
        store.update(&topic).await?;

        let stored = store.get(topic.id).await?.expect("topic should exist");
        assert_eq!(stored, topic);
        assert_eq!(
            stored.daily_time_spent.get(WeekdayName::Monday),
            Duration::minutes(25)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() -> Result<()> {
        let dir = tempdir()?;
        let store = FileTopicStore::new(dir.path().join("topics"))?;
        let mut topic = store.insert(new_topic("user", "reading")).await?;
        topic.id = 42;
        assert!(matches!(
            store.update(&topic).await,
            Err(StoreError::NotFound(42))
        ));
        assert!(matches!(store.delete(42).await, Err(StoreError::NotFound(42))));
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_user() -> Result<()> {
        let dir = tempdir()?;
        let store = FileTopicStore::new(dir.path().join("topics"))?;
        store.insert(new_topic("user", "reading")).await?;
        store.insert(new_topic("user", "music")).await?;
        store.insert(new_topic("other", "music")).await?;

        assert_eq!(store.clear_user("user").await?, 2);
        let left = store.fetch_all().await?;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].user_id, "other");
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupted_lines_are_skipped() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        let valid = serde_json::to_string(&TrackedTopic::new(
            7,
            new_topic("user", "reading"),
        ))?;
        writeln!(file, "{valid}")?;
        writeln!(file, "{{\"id\":8,\"user_id\":")?;
        file.flush()?;

        let store = FileTopicStore::new(file.path().to_path_buf())?;
        let topics = store.fetch_all().await?;
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].id, 7);
        Ok(())
    }

    #[tokio::test]
    async fn test_unparsable_lines_survive_rewrites() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        let first = TrackedTopic::new(1, new_topic("user", "reading"));
        let mut broken = serde_json::to_value(TrackedTopic::new(5, new_topic("user", "music")))?;
        broken["daily_time_spent"] = serde_json::json!({ "Moonday": 60 });
        let broken = serde_json::to_string(&broken)?;
        writeln!(file, "{}", serde_json::to_string(&first)?)?;
        writeln!(file, "{broken}")?;
        file.flush()?;

        let store = FileTopicStore::new(file.path().to_path_buf())?;
        store.update(&first).await?;
        let inserted = store.insert(new_topic("user", "fitness")).await?;
        assert_eq!(inserted.id, 6);
        store.delete(first.id).await?;

        let content = std::fs::read_to_string(file.path())?;
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().any(|line| line == broken));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_with_changes_stored_topic() -> Result<()> {
        let dir = tempdir()?;
        let store = FileTopicStore::new(dir.path().join("topics"))?;
        let topic = store.insert(new_topic("user", "reading")).await?;

        let changed = store
            .update_with(
                topic.id,
                Box::new(|topic| {
                    topic.record(TEST_START_DATE, Duration::minutes(10));
                    true
                }),
            )
            .await?
            .expect("change was accepted");
        assert_eq!(
            changed.daily_time_spent.get(WeekdayName::Monday),
            Duration::minutes(10)
        );
        assert_eq!(store.get(topic.id).await?, Some(changed.clone()));

        let declined = store
            .update_with(
                topic.id,
                Box::new(|topic| {
                    topic.total_time_spent = Duration::hours(100);
                    false
                }),
            )
            .await?;
        assert!(declined.is_none());
        assert_eq!(store.get(topic.id).await?, Some(changed));

        assert!(matches!(
            store.update_with(42, Box::new(|_| true)).await,
            Err(StoreError::NotFound(42))
        ));
        Ok(())
    }
}
