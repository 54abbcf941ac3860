use chrono::{NaiveDate, NaiveDateTime};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use waqt::prelude::*;

fn jan1() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn at(h: u32, m: u32) -> NaiveDateTime {
    jan1().and_hms_opt(h, m, 0).unwrap()
}

fn only(categories: &[Category]) -> Settings {
    let mut settings = Settings::default();
    for c in Category::ALL {
        settings.category_mut(c).enabled = categories.contains(&c);
    }
    settings
}

fn scheduler_with(settings: Settings, clock: &ManualClock) -> ReminderScheduler {
    ReminderScheduler::builder(SchedulerConfig::default())
        .clock(clock.clone())
        .store(MemorySettingsStore::with_settings(settings))
        .build()
}

async fn record(scheduler: &ReminderScheduler) -> Arc<Mutex<Vec<Occurrence>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    scheduler
        .set_on_reminder_callback(move |o| {
            sink.lock().unwrap().push(o.clone());
            Ok(())
        })
        .await;
    seen
}

fn ids(list: &[Occurrence]) -> Vec<String> {
    list.iter().map(|o| o.id.to_string()).collect()
}

async fn pending_except_prayer(scheduler: &ReminderScheduler) -> Vec<Occurrence> {
    scheduler
        .get_upcoming_reminders(usize::MAX)
        .await
        .into_iter()
        .filter(|o| o.category != Category::Prayer)
        .collect()
}

#[tokio::test]
async fn hadith_repeat_chain_runs_until_end_of_day() {
    let clock = ManualClock::new(at(7, 0));
    let mut settings = only(&[Category::Hadith]);
    settings.hadith.time = ClockTime::new(8, 0);
    settings.hadith.repeat = true;
    settings.hadith.repeat_interval_minutes = 180;
    let scheduler = scheduler_with(settings, &clock);
    let seen = record(&scheduler).await;

    scheduler.tick_now().await;
    assert!(seen.lock().unwrap().is_empty());
    let upcoming = scheduler.get_upcoming_reminders(10).await;
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].trigger_at, at(8, 0));

    for hour in [8, 11, 14, 17, 20] {
        clock.set(at(hour, 0));
        scheduler.tick_now().await;
        let next = scheduler.get_upcoming_reminders(10).await;
        assert_eq!(next.len(), 1, "after the {hour}:00 dispatch");
        assert_eq!(next[0].trigger_at, at(hour + 3, 0));
    }

    clock.set(at(23, 0));
    scheduler.tick_now().await;
    assert!(scheduler.get_upcoming_reminders(10).await.is_empty());

    let seen = seen.lock().unwrap();
    let times: Vec<_> = seen.iter().map(|o| o.trigger_at).collect();
    assert_eq!(times, [8, 11, 14, 17, 20, 23].map(|h| at(h, 0)).to_vec());
    assert!(seen.iter().all(|o| o.dispatched && o.trigger_at.date() == jan1()));
}

#[tokio::test]
async fn late_prayer_times_only_touch_the_prayer_category() {
    let clock = ManualClock::new(at(4, 0));
    let scheduler = scheduler_with(Settings::default(), &clock);
    scheduler.tick_now().await;
    let before = pending_except_prayer(&scheduler).await;
    assert!(!before.is_empty());

    scheduler.on_prayer_times_updated(None).await;
    assert_eq!(scheduler.get_upcoming_reminders(usize::MAX).await.len(), before.len());

    let times = PrayerTimes::parse(
        jan1(),
        "Fajr=05:10, Sunrise=06:40, Dhuhr=12:05, Asr=14:50, Maghrib=17:10, Isha=18:40",
    )
    .unwrap();
    scheduler.on_prayer_times_updated(Some(times)).await;

    let prayers: Vec<_> = scheduler
        .get_upcoming_reminders(usize::MAX)
        .await
        .into_iter()
        .filter(|o| o.category == Category::Prayer)
        .map(|o| o.trigger_at)
        .collect();
    assert_eq!(
        prayers,
        vec![at(5, 0), at(6, 30), at(11, 55), at(14, 40), at(17, 0), at(18, 30)]
    );
    assert_eq!(pending_except_prayer(&scheduler).await, before);
    assert_eq!(scheduler.stats().partial_regenerations, 2);
}

#[tokio::test]
async fn clearing_prayer_times_drops_pending_prayer_reminders() {
    let clock = ManualClock::new(at(4, 0));
    let scheduler = scheduler_with(Settings::default(), &clock);
    scheduler.tick_now().await;
    let times = PrayerTimes::parse(jan1(), "Fajr=05:10, Isha=18:40").unwrap();
    scheduler.on_prayer_times_updated(Some(times)).await;
    let with_prayers = scheduler.get_upcoming_reminders(usize::MAX).await.len();

    scheduler.on_prayer_times_updated(None).await;
    let after = scheduler.get_upcoming_reminders(usize::MAX).await;
    assert_eq!(after.len(), with_prayers - 2);
    assert!(after.iter().all(|o| o.category != Category::Prayer));
    assert!(scheduler.prayer_times().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn burst_of_settings_changes_regenerates_once() {
    let clock = ManualClock::new(at(6, 0));
    let scheduler = scheduler_with(Settings::default(), &clock);
    scheduler.tick_now().await;
    assert_eq!(scheduler.stats().full_regenerations, 1);

    scheduler
        .apply_settings(SettingsPatch::for_category(
            Category::Hadith,
            CategoryPatch {
                time: ClockTime::new(9, 0),
                ..CategoryPatch::default()
            },
        ))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler
        .apply_settings(SettingsPatch::for_category(
            Category::Hadith,
            CategoryPatch {
                time: ClockTime::new(9, 30),
                ..CategoryPatch::default()
            },
        ))
        .await;
    assert_eq!(scheduler.stats().full_regenerations, 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.stats().full_regenerations, 2);

    let hadith: Vec<_> = scheduler
        .get_upcoming_reminders(usize::MAX)
        .await
        .into_iter()
        .filter(|o| o.category == Category::Hadith)
        .collect();
    assert_eq!(hadith.len(), 1);
    assert_eq!(hadith[0].trigger_at, at(9, 30));
}

#[tokio::test(start_paused = true)]
async fn disabling_a_category_purges_it_before_the_debounce_fires() {
    let clock = ManualClock::new(at(6, 0));
    let scheduler = scheduler_with(Settings::default(), &clock);
    scheduler.tick_now().await;
    let has_dhikr = |list: &[Occurrence]| list.iter().any(|o| o.category == Category::Dhikr);
    assert!(has_dhikr(&scheduler.get_upcoming_reminders(usize::MAX).await));

    scheduler
        .apply_settings(SettingsPatch::for_category(
            Category::Dhikr,
            CategoryPatch::enabled(false),
        ))
        .await;
    assert!(!has_dhikr(&scheduler.get_upcoming_reminders(usize::MAX).await));
    assert_eq!(scheduler.stats().full_regenerations, 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!has_dhikr(&scheduler.get_upcoming_reminders(usize::MAX).await));
    assert!(!scheduler.settings().await.dhikr.enabled);
}

#[tokio::test(start_paused = true)]
async fn master_switch_off_empties_the_queue_immediately() {
    let clock = ManualClock::new(at(6, 0));
    let scheduler = scheduler_with(Settings::default(), &clock);
    scheduler.tick_now().await;
    scheduler
        .apply_settings(SettingsPatch {
            enabled: Some(false),
            ..SettingsPatch::default()
        })
        .await;
    assert!(scheduler.get_upcoming_reminders(usize::MAX).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn regeneration_never_redispatches_the_same_day() {
    let clock = ManualClock::new(at(8, 0));
    let scheduler = scheduler_with(only(&[Category::Hadith, Category::QuranVerse]), &clock);
    let seen = record(&scheduler).await;
    scheduler.tick_now().await;
    assert_eq!(ids(&seen.lock().unwrap()), vec!["hadith:daily:2024-01-01"]);

    scheduler
        .apply_settings(SettingsPatch::for_category(
            Category::QuranVerse,
            CategoryPatch {
                time: ClockTime::new(13, 0),
                ..CategoryPatch::default()
            },
        ))
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.stats().full_regenerations, 2);

    clock.set(at(8, 1));
    scheduler.tick_now().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
    let pending = scheduler.get_upcoming_reminders(10).await;
    assert_eq!(ids(&pending), vec!["quranVerse:daily:2024-01-01"]);
    assert_eq!(pending[0].trigger_at, at(13, 0));
}

#[tokio::test(start_paused = true)]
async fn repeat_chain_survives_full_regeneration() {
    let clock = ManualClock::new(at(8, 0));
    let mut settings = only(&[Category::Dhikr]);
    settings.dhikr.time = ClockTime::new(8, 0);
    settings.dhikr.repeat = true;
    settings.dhikr.repeat_interval_minutes = 120;
    let scheduler = scheduler_with(settings, &clock);
    let seen = record(&scheduler).await;
    scheduler.tick_now().await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    scheduler
        .apply_settings(SettingsPatch {
            browser_notifications: Some(false),
            ..SettingsPatch::default()
        })
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let pending = scheduler.get_upcoming_reminders(10).await;
    assert_eq!(ids(&pending), vec!["dhikr:repeat-1000:2024-01-01"]);
    assert!(!pending[0].notify_system);
}

#[tokio::test]
async fn due_occurrences_dispatch_in_trigger_order() {
    // 2024-01-01 is a Monday, so no Friday reading.
    let clock = ManualClock::new(at(17, 30));
    let scheduler = scheduler_with(
        only(&[Category::Dhikr, Category::QuranVerse, Category::Hadith]),
        &clock,
    );
    let seen = record(&scheduler).await;
    scheduler.tick_now().await;

    let seen = seen.lock().unwrap();
    let times: Vec<_> = seen.iter().map(|o| o.trigger_at).collect();
    assert_eq!(times, vec![at(8, 0), at(12, 0), at(17, 0)]);
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn due_occurrences_wait_for_a_callback() {
    let clock = ManualClock::new(at(9, 0));
    let scheduler = scheduler_with(only(&[Category::Hadith]), &clock);
    scheduler.tick_now().await;
    scheduler.tick_now().await;
    assert_eq!(scheduler.get_upcoming_reminders(10).await.len(), 1);
    assert_eq!(scheduler.stats().dispatched, 0);

    let seen = record(&scheduler).await;
    scheduler.tick_now().await;
    assert_eq!(ids(&seen.lock().unwrap()), vec!["hadith:daily:2024-01-01"]);
    assert!(scheduler.get_upcoming_reminders(10).await.is_empty());
}

#[tokio::test]
async fn failing_callback_is_isolated_and_not_retried() {
    let clock = ManualClock::new(at(12, 30));
    let scheduler = scheduler_with(only(&[Category::Hadith, Category::QuranVerse]), &clock);
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let sink = attempts.clone();
    scheduler
        .set_on_reminder_callback(move |o| {
            sink.lock().unwrap().push(o.id.to_string());
            if o.category == Category::Hadith {
                anyhow::bail!("renderer unavailable");
            }
            Ok(())
        })
        .await;
    let mut events = scheduler.subscribe_events();

    scheduler.tick_now().await;
    scheduler.tick_now().await;

    assert_eq!(
        *attempts.lock().unwrap(),
        vec!["hadith:daily:2024-01-01", "quranVerse:daily:2024-01-01"]
    );
    let stats = scheduler.stats();
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.failed_dispatches, 1);

    let mut failed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SchedulerEvent::DispatchFailed { id, error } = event {
            failed.push((id.to_string(), error));
        }
    }
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "hadith:daily:2024-01-01");
    assert!(failed[0].1.contains("renderer unavailable"));
}

#[tokio::test]
async fn panicking_callback_does_not_stop_the_tick() {
    let clock = ManualClock::new(at(12, 30));
    let scheduler = scheduler_with(only(&[Category::Hadith, Category::QuranVerse]), &clock);
    let delivered = Arc::new(Mutex::new(0));
    let sink = delivered.clone();
    scheduler
        .set_on_reminder_callback(move |o| {
            if o.category == Category::Hadith {
                panic!("boom");
            }
            *sink.lock().unwrap() += 1;
            Ok(())
        })
        .await;

    scheduler.tick_now().await;
    assert_eq!(*delivered.lock().unwrap(), 1);
    assert_eq!(scheduler.stats().failed_dispatches, 1);
}

#[tokio::test]
async fn day_rollover_discards_yesterday_and_regenerates() {
    let clock = ManualClock::new(at(23, 30));
    let scheduler = scheduler_with(only(&[Category::Hourly]), &clock);
    let seen = record(&scheduler).await;
    scheduler.tick_now().await;
    assert_eq!(seen.lock().unwrap().len(), 24);

    let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    clock.set(jan2.and_hms_opt(0, 0, 30).unwrap());
    scheduler.tick_now().await;

    assert_eq!(scheduler.last_generated_date().await, Some(jan2));
    assert_eq!(
        ids(&seen.lock().unwrap()[22..]),
        vec!["hourly:2300:2024-01-01", "hourly:0000:2024-01-02"]
    );
    let pending = scheduler.get_upcoming_reminders(usize::MAX).await;
    assert_eq!(pending.len(), 23);
    assert!(pending.iter().all(|o| o.trigger_at.date() == jan2));
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_are_idempotent() {
    let clock = ManualClock::new(at(9, 0));
    let scheduler = scheduler_with(only(&[Category::Hadith]), &clock);
    let seen = record(&scheduler).await;
    let mut events = scheduler.subscribe_events();

    assert!(!scheduler.is_running());
    assert!(scheduler.start().await);
    assert!(!scheduler.start().await);
    assert!(scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(scheduler.last_generated_date().await, Some(jan1()));

    assert!(scheduler.stop().await);
    assert!(!scheduler.stop().await);
    assert!(!scheduler.is_running());

    let mut lifecycle = Vec::new();
    while let Ok(event) = events.try_recv() {
        if matches!(event, SchedulerEvent::Started | SchedulerEvent::Stopped) {
            lifecycle.push(event);
        }
    }
    assert_eq!(lifecycle, vec![SchedulerEvent::Started, SchedulerEvent::Stopped]);
}

#[tokio::test(start_paused = true)]
async fn running_loop_picks_up_newly_due_reminders() {
    let clock = ManualClock::new(at(7, 59));
    let scheduler = scheduler_with(only(&[Category::Hadith]), &clock);
    let seen = record(&scheduler).await;
    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(seen.lock().unwrap().is_empty());

    clock.set(at(8, 0));
    tokio::time::sleep(Duration::from_secs(21)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn applied_settings_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let clock = ManualClock::new(at(6, 0));
    let scheduler = ReminderScheduler::builder(SchedulerConfig::default())
        .clock(clock)
        .store(JsonFileSettingsStore::new(&path))
        .build();
    assert_eq!(scheduler.settings().await, Settings::default());

    scheduler
        .apply_settings(SettingsPatch {
            prayer_reminder_lead_minutes: Some(20),
            ..SettingsPatch::default()
        })
        .await;

    let reloaded = JsonFileSettingsStore::new(&path).load().unwrap().unwrap();
    assert_eq!(reloaded.prayer_reminder_lead_minutes, 20);
}

#[tokio::test(start_paused = true)]
async fn replacing_settings_purges_dropped_categories_and_retimes_the_rest() {
    let clock = ManualClock::new(at(6, 0));
    let scheduler = scheduler_with(only(&[Category::Hadith, Category::Dhikr]), &clock);
    scheduler.tick_now().await;

    let mut replacement = only(&[Category::Hadith]);
    replacement.hadith.time = ClockTime::new(10, 15);
    scheduler.replace_settings(replacement.clone()).await;

    let pending = scheduler.get_upcoming_reminders(usize::MAX).await;
    assert!(pending.iter().all(|o| o.category != Category::Dhikr));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let pending = scheduler.get_upcoming_reminders(usize::MAX).await;
    assert_eq!(ids(&pending), vec!["hadith:daily:2024-01-01"]);
    assert_eq!(pending[0].trigger_at, at(10, 15));
    assert_eq!(scheduler.settings().await, replacement);
}

#[tokio::test]
async fn late_start_fires_every_missed_hourly_slot() {
    let clock = ManualClock::new(at(15, 30));
    let scheduler = scheduler_with(only(&[Category::Hourly]), &clock);
    let seen = record(&scheduler).await;

    scheduler.tick_now().await;

    let fired = seen.lock().unwrap().clone();
    assert_eq!(fired.len(), 16);
    assert_eq!(fired[0].id.as_str(), "hourly:0000:2024-01-01");
    assert_eq!(fired[15].id.as_str(), "hourly:1500:2024-01-01");
    assert_eq!(scheduler.stats().dispatched, 16);
    assert_eq!(scheduler.get_upcoming_reminders(1).await[0].trigger_at, at(16, 0));
}

#[tokio::test]
async fn prayer_reminder_missed_during_sleep_is_suppressed() {
    let clock = ManualClock::new(at(4, 0));
    let scheduler = scheduler_with(only(&[Category::Prayer, Category::Hadith]), &clock);
    let seen = record(&scheduler).await;
    scheduler.tick_now().await;
    scheduler
        .on_prayer_times_updated(Some(PrayerTimes::parse(jan1(), "Fajr=05:10").unwrap()))
        .await;
    assert_eq!(scheduler.get_upcoming_reminders(1).await[0].trigger_at, at(5, 0));

    clock.set(at(12, 0));
    scheduler.tick_now().await;

    assert_eq!(ids(&seen.lock().unwrap()), vec!["hadith:daily:2024-01-01"]);
    assert!(scheduler.get_upcoming_reminders(usize::MAX).await.is_empty());

    scheduler.tick_now().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn category_disabled_by_a_callback_is_not_delivered_in_the_same_pass() {
    let clock = ManualClock::new(at(6, 0));
    let mut settings = only(&[Category::Hadith, Category::Dhikr]);
    settings.hadith.time = ClockTime::new(8, 0);
    settings.dhikr.time = ClockTime::new(8, 5);
    let scheduler = scheduler_with(settings, &clock);
    scheduler.tick_now().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handle = scheduler.clone();
    let runtime = tokio::runtime::Handle::current();
    scheduler
        .set_on_reminder_callback(move |o| {
            sink.lock().unwrap().push(o.id.to_string());
            if o.category == Category::Hadith {
                tokio::task::block_in_place(|| {
                    runtime.block_on(handle.apply_settings(SettingsPatch::for_category(
                        Category::Dhikr,
                        CategoryPatch::enabled(false),
                    )))
                });
            }
            Ok(())
        })
        .await;

    clock.set(at(9, 0));
    let worker = scheduler.clone();
    tokio::spawn(async move { worker.tick_now().await }).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["hadith:daily:2024-01-01"]);
    assert_eq!(scheduler.stats().dispatched, 1);
}
