use anyhow::Result;
use chrono::{Duration, Timelike};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use waqt::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging. RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load configuration from an optional file given as the first argument.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SchedulerConfig::load(config_path.as_deref())?;

    // 3. Create the scheduler instance.
    let clock = SystemClock::new(config.timezone);
    let scheduler = ReminderScheduler::builder(config).clock(clock).build();

    // 4. Spawn a listener on the event stream and register the reminder callback.
    spawn_event_listener(&scheduler);
    scheduler
        .set_on_reminder_callback(|reminder| {
            println!(
                "{} {} {}",
                format!("[{}]", reminder.category).cyan(),
                reminder.title.bold(),
                reminder.message.dimmed()
            );
            Ok(())
        })
        .await;

    // 5. Feed demo prayer times a few minutes ahead so something fires soon.
    scheduler
        .on_prayer_times_updated(Some(demo_prayer_times(&clock)))
        .await;

    // 6. Run until Ctrl+C.
    scheduler.start().await;
    info!("{} running. Press Ctrl+C to shut down.", waqt::ENGINE_NAME);
    tokio::signal::ctrl_c().await?;
    scheduler.stop().await;

    Ok(())
}

/// Builds a timetable whose prayers fall just after the configured lead window.
fn demo_prayer_times(clock: &SystemClock) -> PrayerTimes {
    let now = clock.now();
    let lead = i64::from(waqt::settings::DEFAULT_PRAYER_LEAD_MINUTES);
    let mut times = PrayerTimes::new(now.date());
    for (offset, prayer) in [(1, Prayer::Dhuhr), (3, Prayer::Asr)] {
        let at = now + Duration::minutes(lead + offset);
        if at.date() != now.date() {
            continue;
        }
        if let Some(time) = ClockTime::new(at.hour(), at.minute()) {
            times = times.with(prayer, time);
        }
    }
    times
}

fn spawn_event_listener(scheduler: &ReminderScheduler) {
    let mut events = scheduler.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("[EVENT] => {:?}", event);
        }
    });
}
