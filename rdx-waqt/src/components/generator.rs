//! Turns settings, a date and optional prayer times into candidate occurrences.
//!
//! Generation is pure: the same `(date, settings, prayer_times, scope)` always
//! yields the same list, in the same order, with the same ids. Anything that
//! depends on the current time (staleness, repeat chains) lives in separate
//! functions so that property holds.

use crate::common::{Category, OccurrenceId};
use crate::content::{self, Passage};
use crate::occurrence::{Occurrence, ReminderPayload};
use crate::prayer::{Prayer, PrayerTimes};
use crate::settings::{ClockTime, Settings};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday, Datelike};
use tracing::{debug, trace};

/// Which categories a generator run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationScope {
    Full,
    Category(Category),
}

impl GenerationScope {
    pub fn includes(&self, category: Category) -> bool {
        match self {
            GenerationScope::Full => true,
            GenerationScope::Category(only) => *only == category,
        }
    }
}

/// The last instant of `date` at which an occurrence may trigger.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

/// Produces the day's candidate occurrences for every category in `scope`.
pub fn generate(
    date: NaiveDate,
    settings: &Settings,
    prayer_times: Option<&PrayerTimes>,
    scope: GenerationScope,
) -> Vec<Occurrence> {
    let mut out = Vec::new();
    if !settings.enabled {
        trace!("reminders disabled, nothing generated for {date}");
        return out;
    }

    for category in Category::ALL {
        if !scope.includes(category) || !settings.is_active(category) {
            continue;
        }
        match category {
            Category::Prayer => prayers(date, settings, prayer_times, &mut out),
            Category::Hadith | Category::QuranVerse | Category::Dhikr => {
                if let Some(time) = settings.time_for(category) {
                    out.push(build(category, "daily", date.and_time(time.as_naive()), settings));
                }
            }
            Category::FridayQuran => {
                if date.weekday() == Weekday::Fri {
                    if let Some(time) = settings.time_for(category) {
                        out.push(build(category, "weekly", date.and_time(time.as_naive()), settings));
                    }
                }
            }
            Category::Hourly => hourly(date, settings, &mut out),
        }
    }

    out.sort_by(|a, b| (a.trigger_at, &a.id).cmp(&(b.trigger_at, &b.id)));
    debug!("generated {} occurrences for {date} ({scope:?})", out.len());
    out
}

/// Computes the instance that follows `previous` in a same-day repeat chain.
///
/// Links that would already be in the past at `now` are skipped, so a late
/// dispatch resumes the cadence instead of firing a burst. Returns `None` when
/// the category does not repeat or the next link falls after 23:59:59.
pub fn next_in_chain(
    previous: &Occurrence,
    settings: &Settings,
    now: NaiveDateTime,
) -> Option<Occurrence> {
    if !settings.repeats(previous.category) {
        return None;
    }
    let step = Duration::minutes(i64::from(settings.interval_for(previous.category)));
    let date = previous.trigger_at.date();
    let last = end_of_day(date);

    let mut next = previous.trigger_at + step;
    while next <= now {
        next += step;
    }
    if next > last {
        trace!("{} chain ends for {date}", previous.category);
        return None;
    }
    let slot = format!("repeat-{}", next.format("%H%M"));
    Some(build(previous.category, &slot, next, settings))
}

/// Drops stale prayer reminders and keeps everything else.
///
/// A prayer reminder is dropped once its prayer time is more than the lead
/// window in the past. Every other stale occurrence is kept and fires on the
/// next tick.
pub fn retain_fresh(occurrences: &mut Vec<Occurrence>, now: NaiveDateTime, settings: &Settings) {
    let before = occurrences.len();
    occurrences.retain(|o| !is_stale_prayer(o, now, settings));
    let dropped = before - occurrences.len();
    if dropped > 0 {
        debug!("suppressed {dropped} stale prayer reminders at {now}");
    }
}

/// Whether `occurrence` is a prayer reminder whose prayer passed more than
/// the lead window before `now`.
pub fn is_stale_prayer(occurrence: &Occurrence, now: NaiveDateTime, settings: &Settings) -> bool {
    let Some(ReminderPayload::Prayer { at, .. }) = &occurrence.payload else {
        return false;
    };
    let lead = Duration::minutes(i64::from(settings.prayer_reminder_lead_minutes));
    let prayer_at = occurrence.trigger_at.date().and_time(at.as_naive());
    now.signed_duration_since(prayer_at) > lead
}

fn prayers(
    date: NaiveDate,
    settings: &Settings,
    prayer_times: Option<&PrayerTimes>,
    out: &mut Vec<Occurrence>,
) {
    let Some(times) = prayer_times else {
        return;
    };
    if times.date != date {
        debug!("prayer times are for {}, not {date}; skipping", times.date);
        return;
    }
    let lead = Duration::minutes(i64::from(settings.prayer_reminder_lead_minutes));
    let midnight = date.and_time(NaiveTime::MIN);
    for (prayer, at) in &times.times {
        let trigger = (date.and_time(at.as_naive()) - lead).max(midnight);
        out.push(prayer_occurrence(*prayer, *at, trigger, settings));
    }
}

fn hourly(date: NaiveDate, settings: &Settings, out: &mut Vec<Occurrence>) {
    let step = Duration::minutes(i64::from(settings.interval_for(Category::Hourly)));
    let last = end_of_day(date);
    let mut at = date.and_time(NaiveTime::MIN);
    while at <= last {
        out.push(build(Category::Hourly, &at.format("%H%M").to_string(), at, settings));
        at += step;
    }
}

fn prayer_occurrence(
    prayer: Prayer,
    at: ClockTime,
    trigger_at: NaiveDateTime,
    settings: &Settings,
) -> Occurrence {
    let lead = settings.prayer_reminder_lead_minutes;
    let title = match lead {
        0 => format!("{prayer} time"),
        1 => format!("{prayer} in 1 minute"),
        n => format!("{prayer} in {n} minutes"),
    };
    Occurrence {
        id: OccurrenceId::new(Category::Prayer, &prayer.slot(), trigger_at.date()),
        category: Category::Prayer,
        trigger_at,
        title,
        message: format!("{prayer} is at {at}."),
        payload: Some(ReminderPayload::Prayer { prayer, at }),
        notify_system: settings.browser_notifications,
        dispatched: false,
    }
}

fn build(category: Category, slot: &str, trigger_at: NaiveDateTime, settings: &Settings) -> Occurrence {
    let date = trigger_at.date();
    let (title, passage) = match category {
        Category::Hadith => ("Hadith of the Day", Some(content::hadith_of_the_day(date))),
        Category::QuranVerse => ("Verse of the Day", Some(content::verse_of_the_day(date))),
        Category::FridayQuran => ("Friday Reading: Surah al-Kahf", Some(content::friday_reading(date))),
        Category::Dhikr => ("Time for Dhikr", Some(content::dhikr_of_the_day(date))),
        Category::Hourly | Category::Prayer => ("Hourly Reminder", None),
    };
    let message = match passage {
        Some(Passage { text, reference }) => format!("{text} ({reference})"),
        None => "Take a moment to remember Allah.".to_string(),
    };
    Occurrence {
        id: OccurrenceId::new(category, slot, date),
        category,
        trigger_at,
        title: title.to_string(),
        message,
        payload: passage.map(|p| ReminderPayload::Passage {
            text: p.text.to_string(),
            reference: p.reference.to_string(),
        }),
        notify_system: settings.browser_notifications,
        dispatched: false,
    }
}
