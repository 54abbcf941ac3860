//! Error types surfaced by the library.

use std::path::PathBuf;

/// Failures turning user-facing text into scheduler values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid time of day '{0}', expected HH:MM")]
    TimeOfDay(String),
    #[error("unknown prayer '{0}'")]
    Prayer(String),
    #[error("malformed prayer time entry '{0}', expected Name=HH:MM")]
    PrayerEntry(String),
}

/// Failures reading or writing persisted settings.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode settings: {0}")]
    Decode(#[from] serde_json::Error),
}
