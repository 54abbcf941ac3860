//! Contains the building blocks the scheduler is assembled from.
//!
//! The generator turns settings and prayer times into candidate occurrences;
//! the queue orders them and remembers what has already been dispatched. The
//! `ReminderScheduler` owns one queue and drives both.

pub mod generator;
pub mod queue;
