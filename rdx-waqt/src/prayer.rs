//! Daily prayer times as delivered by an external provider.

use crate::error::ParseError;
use crate::settings::ClockTime;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named time in the daily prayer timetable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Prayer {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    pub const ALL: [Prayer; 6] = [
        Prayer::Fajr,
        Prayer::Sunrise,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Sunrise => "Sunrise",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
        }
    }

    /// Slot identifier used in occurrence ids.
    pub fn slot(&self) -> String {
        self.name().to_ascii_lowercase()
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Prayer {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Prayer::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::Prayer(s.to_string()))
    }
}

/// One day's timetable: a date plus named times in the order supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerTimes {
    pub date: NaiveDate,
    pub times: Vec<(Prayer, ClockTime)>,
}

impl PrayerTimes {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            times: Vec::new(),
        }
    }

    /// Sets `prayer` to `time`, replacing an earlier entry for the same prayer.
    pub fn with(mut self, prayer: Prayer, time: ClockTime) -> Self {
        match self.times.iter_mut().find(|(p, _)| *p == prayer) {
            Some(entry) => entry.1 = time,
            None => self.times.push((prayer, time)),
        }
        self
    }

    pub fn get(&self, prayer: Prayer) -> Option<ClockTime> {
        self.times
            .iter()
            .find(|(p, _)| *p == prayer)
            .map(|(_, t)| *t)
    }

    /// Parses `Fajr=05:10, Dhuhr=12:30, ...` for the given date.
    pub fn parse(date: NaiveDate, text: &str) -> Result<Self, ParseError> {
        let mut out = Self::new(date);
        for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, time) = entry
                .split_once('=')
                .ok_or_else(|| ParseError::PrayerEntry(entry.to_string()))?;
            out = out.with(name.parse()?, time.parse()?);
        }
        Ok(out)
    }
}
