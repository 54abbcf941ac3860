//! Contains common, primitive types used across the scheduler.
//!
//! This module defines the reminder categories and the identifiers used to
//! deduplicate occurrences. Using distinct types keeps queue keys, occurrence
//! ids and plain strings from being mixed up.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use std::str::FromStr;

new_key_type! {
    /// Identifies an entry inside the occurrence queue's arena.
    ///
    /// Keys are never reused, so a stale key held by the time index can not
    /// resolve to a different occurrence.
    pub struct QueueKey;
}

/// One kind of reminder the scheduler knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Prayer,
    Hadith,
    QuranVerse,
    FridayQuran,
    Dhikr,
    Hourly,
}

impl Category {
    /// Every category, in a stable order.
    pub const ALL: [Category; 6] = [
        Category::Prayer,
        Category::Hadith,
        Category::QuranVerse,
        Category::FridayQuran,
        Category::Dhikr,
        Category::Hourly,
    ];

    /// The key used in occurrence ids and settings documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Prayer => "prayer",
            Category::Hadith => "hadith",
            Category::QuranVerse => "quranVerse",
            Category::FridayQuran => "fridayQuran",
            Category::Dhikr => "dhikr",
            Category::Hourly => "hourly",
        }
    }

    /// Categories that fire once at a fixed time and may chain same-day repeats.
    pub fn is_daily_fixed(&self) -> bool {
        matches!(
            self,
            Category::Hadith | Category::QuranVerse | Category::Dhikr
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Deterministic occurrence identifier: `category:slot:date`.
///
/// Two generator runs over the same inputs produce the same ids, which is what
/// lets the queue treat re-insertion as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrenceId(String);

impl OccurrenceId {
    pub fn new(category: Category, slot: &str, date: NaiveDate) -> Self {
        Self(format!("{}:{}:{}", category.as_str(), slot, date.format("%Y-%m-%d")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occurrence_id_is_category_slot_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let id = OccurrenceId::new(Category::QuranVerse, "daily", date);
        assert_eq!(id.as_str(), "quranVerse:daily:2024-01-01");
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("FRIDAYQURAN".parse::<Category>().unwrap(), Category::FridayQuran);
        assert!("weekly".parse::<Category>().is_err());
    }
}
