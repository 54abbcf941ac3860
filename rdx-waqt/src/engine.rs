//! The reminder scheduler: tick loop, prayer-time adapter and settings control.

use crate::common::Category;
use crate::components::generator::{self, GenerationScope};
use crate::components::queue::{OccurrenceQueue, UpsertOutcome};
use crate::config::SchedulerConfig;
use crate::events::SchedulerEvent;
use crate::occurrence::Occurrence;
use crate::prayer::PrayerTimes;
use crate::settings::{Settings, SettingsPatch};
use crate::store::{load_or_default, JsonFileSettingsStore, MemorySettingsStore, SettingsStore};
use crate::time::{Clock, SystemClock};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

/// Receives each due occurrence exactly once.
///
/// The callback runs synchronously on the scheduler's task, one occurrence at
/// a time. Slow consumers must hand the work to another task instead of
/// blocking here. Returning `Err` (or panicking) is logged and counted; the
/// occurrence is not retried. Occurrences whose category is switched off
/// while an earlier callback runs are skipped for the rest of the pass.
pub type ReminderCallback = Arc<dyn Fn(&Occurrence) -> anyhow::Result<()> + Send + Sync>;

/// Counters describing what the scheduler has done since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub full_regenerations: u64,
    pub partial_regenerations: u64,
    pub dispatched: u64,
    pub failed_dispatches: u64,
}

#[derive(Default)]
struct StatsCounters {
    full_regenerations: AtomicU64,
    partial_regenerations: AtomicU64,
    dispatched: AtomicU64,
    failed_dispatches: AtomicU64,
}

/// Everything guarded by the single state mutex.
struct SchedulerState {
    settings: Settings,
    prayer_times: Option<PrayerTimes>,
    queue: OccurrenceQueue,
    last_generated_date: Option<NaiveDate>,
    /// Last dispatched instance of each fixed-time category, for resuming
    /// repeat chains after a same-day regeneration.
    chain_tails: HashMap<Category, Occurrence>,
    callback: Option<ReminderCallback>,
    /// Bumped on every settings change; a debounced regeneration only runs if
    /// nothing newer arrived while it waited.
    settings_epoch: u64,
}

struct RunHandle {
    shutdown_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Assembles a `ReminderScheduler` with custom collaborators.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn SettingsStore>>,
}

impl SchedulerBuilder {
    /// Replaces the wall clock, e.g. with a `ManualClock` in tests.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn store(mut self, store: impl SettingsStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn build(self) -> ReminderScheduler {
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock::new(self.config.timezone)),
        };
        let store: Arc<dyn SettingsStore> = match self.store {
            Some(store) => store,
            None => match self
                .config
                .settings_path
                .clone()
                .or_else(JsonFileSettingsStore::default_path)
            {
                Some(path) => Arc::new(JsonFileSettingsStore::new(path)),
                None => {
                    warn!("no settings path available, settings will not persist");
                    Arc::new(MemorySettingsStore::new())
                }
            },
        };
        let settings = load_or_default(store.as_ref());
        ReminderScheduler::assemble(self.config, clock, store, settings)
    }
}

/// The prayer-time-aware reminder scheduler.
///
/// This is a cheap, cloneable handle; clones share one scheduler. All state
/// sits behind a single mutex, so settings updates, prayer-time updates, reads
/// and tick processing may come from any task. Whole tick passes are
/// additionally serialized so two passes never dispatch at the same time.
#[derive(Clone)]
pub struct ReminderScheduler {
    config: Arc<SchedulerConfig>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SettingsStore>,
    state: Arc<Mutex<SchedulerState>>,
    dispatch_gate: Arc<Mutex<()>>,
    run: Arc<Mutex<Option<RunHandle>>>,
    running: Arc<AtomicBool>,
    stats: Arc<StatsCounters>,
    event_sender: broadcast::Sender<SchedulerEvent>,
}

// Construction and the tick loop.
impl ReminderScheduler {
    /// Creates a scheduler using the system clock and a JSON file store.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder {
            config,
            clock: None,
            store: None,
        }
    }

    fn assemble(
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SettingsStore>,
        settings: Settings,
    ) -> Self {
        const CHANNEL_CAPACITY: usize = 256;
        let (event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            config: Arc::new(config),
            clock,
            store,
            state: Arc::new(Mutex::new(SchedulerState {
                settings,
                prayer_times: None,
                queue: OccurrenceQueue::new(),
                last_generated_date: None,
                chain_tails: HashMap::new(),
                callback: None,
                settings_epoch: 0,
            })),
            dispatch_gate: Arc::new(Mutex::new(())),
            run: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(StatsCounters::default()),
            event_sender,
        }
    }

    /// Starts the periodic tick loop. Returns `false` if it was already running.
    ///
    /// The first tick runs immediately and generates the current day.
    pub async fn start(&self) -> bool {
        let mut run = self.run.lock().await;
        if run.is_some() {
            debug!("start requested but the scheduler is already running");
            return false;
        }
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = self.clone();
        let join = tokio::spawn(async move { worker.tick_loop(shutdown_rx).await });
        *run = Some(RunHandle { shutdown_tx, join });
        self.running.store(true, Ordering::SeqCst);
        info!(
            "reminder scheduler started, ticking every {:?}",
            self.config.resolution.period()
        );
        self.event_sender.send(SchedulerEvent::Started).ok();
        true
    }

    /// Stops the tick loop, waiting for an in-flight tick to finish.
    ///
    /// Returns `false` if the scheduler was not running.
    pub async fn stop(&self) -> bool {
        let mut run = self.run.lock().await;
        let Some(handle) = run.take() else {
            return false;
        };
        handle.shutdown_tx.send(()).ok();
        if let Err(e) = handle.join.await {
            error!("tick loop ended abnormally: {e}");
        }
        self.running.store(false, Ordering::SeqCst);
        info!("reminder scheduler stopped");
        self.event_sender.send(SchedulerEvent::Stopped).ok();
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn tick_loop(self, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.resolution.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => self.tick_now().await,
            }
        }
    }

    /// Runs one scheduler pass immediately.
    ///
    /// Rolls the day over if the date changed, then dispatches every due
    /// occurrence in trigger order. Embedders that drive their own loop can
    /// call this instead of `start`.
    pub async fn tick_now(&self) {
        let _gate = self.dispatch_gate.lock().await;
        let now = self.clock.now();

        let (callback, due) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            self.roll_over_if_needed(state, now);
            let Some(callback) = state.callback.clone() else {
                trace!("no reminder callback registered; {} pending", state.queue.len());
                return;
            };
            let mut due = Vec::new();
            while let Some(occurrence) = state.queue.next_due(now) {
                // Popping records the id, so a suppressed prayer stays suppressed.
                if generator::is_stale_prayer(&occurrence, now, &state.settings) {
                    debug!("{} is past its lead window, not dispatching", occurrence.id);
                    continue;
                }
                due.push(occurrence);
            }
            (callback, due)
        };

        if due.is_empty() {
            return;
        }
        debug!("{} occurrences due at {now}", due.len());
        for occurrence in due {
            if !self.state.lock().await.settings.is_active(occurrence.category) {
                debug!("{} was disabled mid-tick, skipping {}", occurrence.category, occurrence.id);
                continue;
            }
            self.dispatch(&callback, &occurrence);

            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            if occurrence.category.is_daily_fixed() {
                if let Some(next) = generator::next_in_chain(&occurrence, &state.settings, now) {
                    trace!("{} repeats at {}", occurrence.category, next.trigger_at);
                    state.queue.upsert(next);
                }
                state.chain_tails.insert(occurrence.category, occurrence);
            }
        }
    }

    fn dispatch(&self, callback: &ReminderCallback, occurrence: &Occurrence) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (callback.as_ref())(occurrence)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{e:#}")),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };
        match failure {
            None => {
                self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                info!("dispatched {} ({})", occurrence.id, occurrence.title);
                self.event_sender
                    .send(SchedulerEvent::Dispatched {
                        id: occurrence.id.clone(),
                        category: occurrence.category,
                        trigger_at: occurrence.trigger_at,
                    })
                    .ok();
            }
            Some(error) => {
                self.stats.failed_dispatches.fetch_add(1, Ordering::Relaxed);
                error!("reminder callback failed for {}: {error}", occurrence.id);
                self.event_sender
                    .send(SchedulerEvent::DispatchFailed {
                        id: occurrence.id.clone(),
                        error,
                    })
                    .ok();
            }
        }
    }

    fn roll_over_if_needed(&self, state: &mut SchedulerState, now: NaiveDateTime) -> bool {
        let today = now.date();
        if state.last_generated_date == Some(today) {
            return false;
        }
        info!("generating reminders for {today}");
        state.queue.reset();
        state.chain_tails.clear();
        state.last_generated_date = Some(today);
        self.event_sender
            .send(SchedulerEvent::DayRolledOver { date: today })
            .ok();
        self.regenerate_full(state, now);
        true
    }

    /// Rebuilds the current day's pending set, keeping the dispatch ledger.
    fn regenerate_full(&self, state: &mut SchedulerState, now: NaiveDateTime) {
        let date = now.date();
        let mut fresh = generator::generate(
            date,
            &state.settings,
            state.prayer_times.as_ref(),
            GenerationScope::Full,
        );
        generator::retain_fresh(&mut fresh, now, &state.settings);

        state.queue.clear_pending();
        let mut queued = upsert_all(&mut state.queue, fresh);
        for tail in state.chain_tails.values() {
            if let Some(next) = generator::next_in_chain(tail, &state.settings, now) {
                if state.queue.upsert(next) == UpsertOutcome::Inserted {
                    queued += 1;
                }
            }
        }

        self.stats.full_regenerations.fetch_add(1, Ordering::Relaxed);
        debug!("full regeneration queued {queued} occurrences for {date}");
        self.event_sender
            .send(SchedulerEvent::Regenerated {
                date,
                scope: GenerationScope::Full,
                queued,
            })
            .ok();
    }

    fn clear_category(&self, state: &mut SchedulerState, category: Category) {
        let removed = state.queue.remove_by_category(category);
        debug!("cleared {removed} pending {category} occurrences");
        self.event_sender
            .send(SchedulerEvent::CategoryCleared { category, removed })
            .ok();
    }
}

// Public API: callbacks, external inputs and reads.
impl ReminderScheduler {
    /// Registers the single reminder callback, replacing any previous one.
    ///
    /// Occurrences that came due before a callback existed stay queued and
    /// are delivered on the next tick.
    pub async fn set_on_reminder_callback(
        &self,
        callback: impl Fn(&Occurrence) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        self.state.lock().await.callback = Some(Arc::new(callback));
    }

    pub async fn clear_reminder_callback(&self) {
        self.state.lock().await.callback = None;
    }

    /// Replaces the prayer timetable and regenerates only prayer reminders.
    ///
    /// Pending occurrences of every other category are left alone. `None`
    /// clears all pending prayer reminders.
    pub async fn on_prayer_times_updated(&self, prayer_times: Option<PrayerTimes>) {
        let now = self.clock.now();
        let date = now.date();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.prayer_times = prayer_times;

        let mut fresh = generator::generate(
            date,
            &state.settings,
            state.prayer_times.as_ref(),
            GenerationScope::Category(Category::Prayer),
        );
        generator::retain_fresh(&mut fresh, now, &state.settings);
        self.clear_category(state, Category::Prayer);
        let queued = upsert_all(&mut state.queue, fresh);

        self.stats
            .partial_regenerations
            .fetch_add(1, Ordering::Relaxed);
        info!("prayer times updated, {queued} prayer reminders queued for {date}");
        self.event_sender
            .send(SchedulerEvent::Regenerated {
                date,
                scope: GenerationScope::Category(Category::Prayer),
                queued,
            })
            .ok();
    }

    /// Merges `patch` into the current settings.
    ///
    /// Categories switched off are purged at once; everything else is picked
    /// up by a debounced full regeneration.
    pub async fn apply_settings(&self, patch: SettingsPatch) {
        self.update_settings(|settings| settings.merge(&patch)).await;
    }

    /// Replaces the settings wholesale, with the same purge and debounce rules
    /// as `apply_settings`.
    pub async fn replace_settings(&self, replacement: Settings) {
        self.update_settings(move |settings| {
            let newly_off = Category::ALL
                .into_iter()
                .filter(|c| settings.is_active(*c) && !replacement.is_active(*c))
                .collect();
            *settings = replacement;
            newly_off
        })
        .await;
    }

    async fn update_settings(&self, change: impl FnOnce(&mut Settings) -> Vec<Category>) {
        let epoch = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let newly_off = change(&mut state.settings);
            if let Err(e) = self.store.save(&state.settings) {
                warn!("cannot persist settings: {e}");
            }
            for category in newly_off {
                self.clear_category(state, category);
            }
            state.settings_epoch += 1;
            state.settings_epoch
        };

        let scheduler = self.clone();
        let delay = self.config.debounce();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.regenerate_after_settings(epoch).await;
        });
    }

    async fn regenerate_after_settings(&self, epoch: u64) {
        let now = self.clock.now();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.settings_epoch != epoch {
            trace!("settings regeneration {epoch} superseded");
            return;
        }
        if !self.roll_over_if_needed(state, now) {
            self.regenerate_full(state, now);
        }
    }

    /// The next `n` pending reminders in trigger order.
    pub async fn get_upcoming_reminders(&self, n: usize) -> Vec<Occurrence> {
        self.state.lock().await.queue.peek_upcoming(n)
    }

    pub async fn settings(&self) -> Settings {
        self.state.lock().await.settings.clone()
    }

    pub async fn prayer_times(&self) -> Option<PrayerTimes> {
        self.state.lock().await.prayer_times.clone()
    }

    pub async fn last_generated_date(&self) -> Option<NaiveDate> {
        self.state.lock().await.last_generated_date
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            full_regenerations: self.stats.full_regenerations.load(Ordering::Relaxed),
            partial_regenerations: self.stats.partial_regenerations.load(Ordering::Relaxed),
            dispatched: self.stats.dispatched.load(Ordering::Relaxed),
            failed_dispatches: self.stats.failed_dispatches.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Subscribes to the `SchedulerEvent` stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_sender.subscribe()
    }
}

fn upsert_all(queue: &mut OccurrenceQueue, occurrences: Vec<Occurrence>) -> usize {
    let mut queued = 0;
    for occurrence in occurrences {
        if queue.upsert(occurrence) != UpsertOutcome::AlreadyDispatched {
            queued += 1;
        }
    }
    queued
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("callback panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("callback panicked: {s}")
    } else {
        "callback panicked".to_string()
    }
}
