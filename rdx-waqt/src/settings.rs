//! User-facing reminder settings.
//!
//! `Settings` is an immutable snapshot; updates arrive as a `SettingsPatch` and
//! are merged into a fresh copy. Every field carries a serde default so a
//! partially written document still loads.

use crate::common::Category;
use crate::error::ParseError;
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A local time of day with minute resolution, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for ClockTime {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (h, m) = trimmed
            .split_once(':')
            .ok_or_else(|| ParseError::TimeOfDay(s.to_string()))?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(ParseError::TimeOfDay(s.to_string()));
        }
        let hour: u32 = h.parse().map_err(|_| ParseError::TimeOfDay(s.to_string()))?;
        let minute: u32 = m.parse().map_err(|_| ParseError::TimeOfDay(s.to_string()))?;
        ClockTime::new(hour, minute).ok_or_else(|| ParseError::TimeOfDay(s.to_string()))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

/// Per-category switches. Fields a category has no use for are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategorySettings {
    pub enabled: bool,
    /// Fixed trigger time; `None` falls back to the built-in default.
    pub time: Option<ClockTime>,
    pub repeat: bool,
    /// Spacing for same-day repeats and hourly slots; `0` means the default.
    pub repeat_interval_minutes: u32,
}

impl Default for CategorySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            time: None,
            repeat: false,
            repeat_interval_minutes: 0,
        }
    }
}

impl CategorySettings {
    fn with_defaults(category: Category) -> Self {
        Self {
            time: default_time(category),
            repeat_interval_minutes: default_interval_minutes(category),
            ..Self::default()
        }
    }
}

/// The full reminder configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Master switch; when off nothing is generated.
    pub enabled: bool,
    pub prayer: CategorySettings,
    pub hadith: CategorySettings,
    pub quran_verse: CategorySettings,
    pub friday_quran: CategorySettings,
    pub dhikr: CategorySettings,
    pub hourly: CategorySettings,
    pub prayer_reminder_lead_minutes: u32,
    pub browser_notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            prayer: CategorySettings::with_defaults(Category::Prayer),
            hadith: CategorySettings::with_defaults(Category::Hadith),
            quran_verse: CategorySettings::with_defaults(Category::QuranVerse),
            friday_quran: CategorySettings::with_defaults(Category::FridayQuran),
            dhikr: CategorySettings::with_defaults(Category::Dhikr),
            hourly: CategorySettings::with_defaults(Category::Hourly),
            prayer_reminder_lead_minutes: DEFAULT_PRAYER_LEAD_MINUTES,
            browser_notifications: true,
        }
    }
}

pub const DEFAULT_PRAYER_LEAD_MINUTES: u32 = 10;

/// Built-in trigger time for the fixed-time categories.
pub fn default_time(category: Category) -> Option<ClockTime> {
    match category {
        Category::Hadith => ClockTime::new(8, 0),
        Category::QuranVerse => ClockTime::new(12, 0),
        Category::FridayQuran => ClockTime::new(10, 0),
        Category::Dhikr => ClockTime::new(17, 0),
        Category::Prayer | Category::Hourly => None,
    }
}

/// Built-in spacing used when a category's interval is unset or zero.
pub fn default_interval_minutes(category: Category) -> u32 {
    match category {
        Category::Hourly => 60,
        Category::Hadith | Category::QuranVerse | Category::Dhikr => 180,
        Category::Prayer | Category::FridayQuran => 0,
    }
}

impl Settings {
    pub fn category(&self, category: Category) -> &CategorySettings {
        match category {
            Category::Prayer => &self.prayer,
            Category::Hadith => &self.hadith,
            Category::QuranVerse => &self.quran_verse,
            Category::FridayQuran => &self.friday_quran,
            Category::Dhikr => &self.dhikr,
            Category::Hourly => &self.hourly,
        }
    }

    pub fn category_mut(&mut self, category: Category) -> &mut CategorySettings {
        match category {
            Category::Prayer => &mut self.prayer,
            Category::Hadith => &mut self.hadith,
            Category::QuranVerse => &mut self.quran_verse,
            Category::FridayQuran => &mut self.friday_quran,
            Category::Dhikr => &mut self.dhikr,
            Category::Hourly => &mut self.hourly,
        }
    }

    /// `true` when both the master switch and the category switch are on.
    pub fn is_active(&self, category: Category) -> bool {
        self.enabled && self.category(category).enabled
    }

    /// The configured time of day, or the built-in default.
    pub fn time_for(&self, category: Category) -> Option<ClockTime> {
        self.category(category).time.or_else(|| default_time(category))
    }

    /// The configured interval in minutes, never zero for categories that use one.
    pub fn interval_for(&self, category: Category) -> u32 {
        match self.category(category).repeat_interval_minutes {
            0 => default_interval_minutes(category),
            minutes => minutes,
        }
    }

    /// Whether dispatching an instance of `category` should schedule another one today.
    pub fn repeats(&self, category: Category) -> bool {
        category.is_daily_fixed() && self.is_active(category) && self.category(category).repeat
    }

    /// Merges `patch` in place.
    ///
    /// Returns the categories that were active before the merge and are not
    /// active after it, so callers can purge them without waiting.
    pub fn merge(&mut self, patch: &SettingsPatch) -> Vec<Category> {
        let before: Vec<Category> = Category::ALL
            .into_iter()
            .filter(|c| self.is_active(*c))
            .collect();

        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        for category in Category::ALL {
            if let Some(cat_patch) = patch.category(category) {
                cat_patch.apply(self.category_mut(category));
            }
        }
        if let Some(lead) = patch.prayer_reminder_lead_minutes {
            self.prayer_reminder_lead_minutes = lead;
        }
        if let Some(notify) = patch.browser_notifications {
            self.browser_notifications = notify;
        }

        before.into_iter().filter(|c| !self.is_active(*c)).collect()
    }
}

/// A partial update to one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryPatch {
    pub enabled: Option<bool>,
    pub time: Option<ClockTime>,
    pub repeat: Option<bool>,
    pub repeat_interval_minutes: Option<u32>,
}

impl CategoryPatch {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    fn apply(&self, target: &mut CategorySettings) {
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(time) = self.time {
            target.time = Some(time);
        }
        if let Some(repeat) = self.repeat {
            target.repeat = repeat;
        }
        if let Some(interval) = self.repeat_interval_minutes {
            target.repeat_interval_minutes = interval;
        }
    }
}

/// A partial update to `Settings`; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub prayer: Option<CategoryPatch>,
    pub hadith: Option<CategoryPatch>,
    pub quran_verse: Option<CategoryPatch>,
    pub friday_quran: Option<CategoryPatch>,
    pub dhikr: Option<CategoryPatch>,
    pub hourly: Option<CategoryPatch>,
    pub prayer_reminder_lead_minutes: Option<u32>,
    pub browser_notifications: Option<bool>,
}

impl SettingsPatch {
    /// A patch touching a single category.
    pub fn for_category(category: Category, patch: CategoryPatch) -> Self {
        let mut out = Self::default();
        *out.category_slot(category) = Some(patch);
        out
    }

    pub fn category(&self, category: Category) -> Option<&CategoryPatch> {
        match category {
            Category::Prayer => self.prayer.as_ref(),
            Category::Hadith => self.hadith.as_ref(),
            Category::QuranVerse => self.quran_verse.as_ref(),
            Category::FridayQuran => self.friday_quran.as_ref(),
            Category::Dhikr => self.dhikr.as_ref(),
            Category::Hourly => self.hourly.as_ref(),
        }
    }

    fn category_slot(&mut self, category: Category) -> &mut Option<CategoryPatch> {
        match category {
            Category::Prayer => &mut self.prayer,
            Category::Hadith => &mut self.hadith,
            Category::QuranVerse => &mut self.quran_verse,
            Category::FridayQuran => &mut self.friday_quran,
            Category::Dhikr => &mut self.dhikr,
            Category::Hourly => &mut self.hourly,
        }
    }
}

impl From<Settings> for SettingsPatch {
    fn from(s: Settings) -> Self {
        let full = |c: &CategorySettings| {
            Some(CategoryPatch {
                enabled: Some(c.enabled),
                time: c.time,
                repeat: Some(c.repeat),
                repeat_interval_minutes: Some(c.repeat_interval_minutes),
            })
        };
        Self {
            enabled: Some(s.enabled),
            prayer: full(&s.prayer),
            hadith: full(&s.hadith),
            quran_verse: full(&s.quran_verse),
            friday_quran: full(&s.friday_quran),
            dhikr: full(&s.dhikr),
            hourly: full(&s.hourly),
            prayer_reminder_lead_minutes: Some(s.prayer_reminder_lead_minutes),
            browser_notifications: Some(s.browser_notifications),
        }
    }
}
