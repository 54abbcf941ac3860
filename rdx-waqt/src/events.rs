//! Defines the events broadcast by the scheduler.
//!
//! The reminder callback is the delivery path for occurrences. This stream is
//! the observation path: shells, loggers and tests subscribe to it to see what
//! the scheduler is doing without touching its state.

use crate::common::{Category, OccurrenceId};
use crate::components::generator::GenerationScope;
use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// The tick loop began running.
    Started,
    /// The tick loop exited after `stop`.
    Stopped,
    /// The queue was discarded and regenerated for a new calendar date.
    DayRolledOver { date: NaiveDate },
    /// A generator run finished and its output was queued.
    Regenerated {
        date: NaiveDate,
        scope: GenerationScope,
        queued: usize,
    },
    /// Pending occurrences of a category were purged.
    CategoryCleared { category: Category, removed: usize },
    /// The callback accepted an occurrence.
    Dispatched {
        id: OccurrenceId,
        category: Category,
        trigger_at: NaiveDateTime,
    },
    /// The callback failed for an occurrence; it will not be retried.
    DispatchFailed { id: OccurrenceId, error: String },
}
