//! Domain of the application: tracked topics, the per-weekday ledger they keep and the
//! validation applied before a topic starts being tracked.

pub mod catalog;
pub mod draft;
pub mod entities;
