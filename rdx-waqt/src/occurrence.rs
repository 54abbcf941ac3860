//! The atomic schedulable unit handed to the reminder callback.

use crate::common::{Category, OccurrenceId};
use crate::prayer::Prayer;
use crate::settings::ClockTime;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Extra data a UI may render alongside the title and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReminderPayload {
    Prayer { prayer: Prayer, at: ClockTime },
    Passage { text: String, reference: String },
}

/// One concrete, time-stamped reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub category: Category,
    /// Local wall-clock time at which the reminder becomes due.
    pub trigger_at: NaiveDateTime,
    pub title: String,
    pub message: String,
    pub payload: Option<ReminderPayload>,
    /// Whether the consumer should also raise a system notification.
    pub notify_system: bool,
    pub dispatched: bool,
}

impl Occurrence {
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.trigger_at <= now
    }
}
