//! Persistence of tracked topics is organized through [topic_store::TopicStore].
//!  - [topic_store::FileTopicStore] keeps every topic as a json line in a single file.
//!  - Reads take a shared lock on the file, writes an exclusive one, so the cli and the daemon
//!    can work on the same directory.

pub mod topic_store;
