//! Defines the runtime configuration for the scheduler.
//!
//! These structs are deserialized through the `config` crate, layering an
//! optional TOML or JSON file and `WAQT_*` environment variables over the
//! serde defaults. This is engine tuning (tick speed, timezone, debounce), not
//! the user's reminder `Settings`, which live in a `SettingsStore`.

use anyhow::Context;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The top-level configuration for a `ReminderScheduler`.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// How often the tick loop wakes up.
    #[serde(default)]
    pub resolution: TickResolution,

    /// The timezone used to turn wall-clock time into local dates.
    /// Uses IANA names (e.g., "Asia/Riyadh").
    #[serde(default = "default_timezone")]
    pub timezone: Tz,

    /// Quiet period before a settings change triggers regeneration.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Where the JSON settings store lives. `None` uses the platform default.
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

/// Defines the polling speed of the tick loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickResolution {
    /// Every 5 seconds. Handy for demos and the shell.
    Fast,
    /// Every 20 seconds. Fine enough for minute-resolution reminders.
    #[default]
    Standard,
    /// Every 30 seconds.
    Relaxed,
    /// A user-defined period in seconds.
    Custom { secs: u64 },
}

impl TickResolution {
    pub fn period(&self) -> Duration {
        match self {
            TickResolution::Fast => Duration::from_secs(5),
            TickResolution::Standard => Duration::from_secs(20),
            TickResolution::Relaxed => Duration::from_secs(30),
            TickResolution::Custom { secs } => Duration::from_secs((*secs).max(1)),
        }
    }
}

impl SchedulerConfig {
    /// Loads configuration from an optional file plus `WAQT_*` environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(config::Environment::with_prefix("WAQT"))
            .build()
            .context("cannot assemble scheduler configuration")?
            .try_deserialize()
            .context("invalid scheduler configuration")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            resolution: TickResolution::default(),
            timezone: default_timezone(),
            debounce_ms: default_debounce_ms(),
            settings_path: None,
        }
    }
}

// --- Default value functions for serde ---

fn default_timezone() -> Tz {
    Tz::UTC
}

fn default_debounce_ms() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waqt.toml");
        std::fs::write(
            &path,
            "timezone = \"Asia/Riyadh\"\ndebounce_ms = 500\nresolution = \"fast\"\n",
        )
        .unwrap();
        let cfg = SchedulerConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.timezone, chrono_tz::Asia::Riyadh);
        assert_eq!(cfg.debounce(), Duration::from_millis(500));
        assert_eq!(cfg.resolution, TickResolution::Fast);
        assert_eq!(cfg.settings_path, None);
    }

    #[test]
    fn defaults_tick_every_twenty_seconds() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.resolution.period(), Duration::from_secs(20));
        assert_eq!(cfg.debounce(), Duration::from_millis(300));
    }
}
