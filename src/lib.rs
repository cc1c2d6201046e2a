//! Habit tracker for the time spent on topics you care about. Pick topics, time your sessions
//! with a stopwatch or log them by hand, and see the week fill up. A small daemon rolls the week
//! over every week-start day and keeps the stopwatch honest across midnight.
//!

pub mod cli;
pub mod daemon;
pub mod rollover;
pub mod settings;
pub mod stopwatch;
pub mod storage;
pub mod tracking;
pub mod utils;
