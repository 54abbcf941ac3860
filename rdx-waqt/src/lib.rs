//! # Waqt
//!
//! A prayer-time-aware, tick-driven reminder scheduler for Rust.
//!
//! Waqt computes the day's reminders (prayer times, a daily hadith, a verse,
//! dhikr, a Friday reading and an optional hourly nudge) and hands each one to
//! a single registered callback exactly once when it comes due.
//!
//! ## Core Concepts
//!
//! - **Occurrence**: one concrete, time-stamped reminder with a deterministic
//!   id (`category:slot:date`), so regenerating a day never duplicates work.
//! - **Polling, not timers**: a tick every few seconds asks the `Clock` what
//!   time it is and dispatches whatever is due. Sleep, resume and clock
//!   changes are handled by construction.
//! - **Partial updates**: new prayer times only touch prayer reminders; a
//!   settings change purges disabled categories at once and regenerates the
//!   rest after a short debounce.
//! - **Day rollover**: when the date changes the queue is rebuilt for the new
//!   day.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use waqt::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Create the scheduler with default configuration.
//!     let scheduler = ReminderScheduler::new(SchedulerConfig::default());
//!
//!     // 2. Register the single reminder callback.
//!     scheduler
//!         .set_on_reminder_callback(|reminder| {
//!             println!("{}: {}", reminder.title, reminder.message);
//!             Ok(())
//!         })
//!         .await;
//!
//!     // 3. Feed prayer times whenever the provider has them.
//!     let today = chrono::Local::now().date_naive();
//!     let times = PrayerTimes::parse(today, "Fajr=05:10, Dhuhr=12:30, Asr=15:45")?;
//!     scheduler.on_prayer_times_updated(Some(times)).await;
//!
//!     // 4. Start ticking, and stop on Ctrl+C.
//!     scheduler.start().await;
//!     tokio::signal::ctrl_c().await?;
//!     scheduler.stop().await;
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Waqt Scheduler";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod events;
pub mod occurrence;
pub mod prayer;
pub mod settings;
pub mod store;
pub mod time;

/// A prelude module for easy importing of the most common Waqt types.
pub mod prelude {
    pub use crate::common::{Category, OccurrenceId};
    pub use crate::components::generator::GenerationScope;
    pub use crate::config::{SchedulerConfig, TickResolution};
    pub use crate::engine::{ReminderScheduler, SchedulerStats};
    pub use crate::events::SchedulerEvent;
    pub use crate::occurrence::{Occurrence, ReminderPayload};
    pub use crate::prayer::{Prayer, PrayerTimes};
    pub use crate::settings::{CategoryPatch, ClockTime, Settings, SettingsPatch};
    pub use crate::store::{JsonFileSettingsStore, MemorySettingsStore, SettingsStore};
    pub use crate::time::{Clock, ManualClock, SystemClock};
}
