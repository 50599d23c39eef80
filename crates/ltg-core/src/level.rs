//! Severity levels and the severity gate.

use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU8, Ordering},
};

use crate::errors::Error;

/// Record severity, ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Notice = 3,
    Warning = 4,
    Error = 5,
    Critical = 6,
}

impl Level {
    pub const ALL: [Level; 7] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Notice,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Notice => "notice",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }

    fn from_u8(raw: u8) -> Level {
        Level::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(Level::Critical)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "notice" => Ok(Level::Notice),
            "warn" | "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" => Ok(Level::Critical),
            other => Err(Error::Config(format!("unknown log level: {other:?}"))),
        }
    }
}

/// `log` has no `notice` or `critical`; its five levels map onto ours.
impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warning,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

// ============== Process-wide default ==============

static DEFAULT_LEVEL: AtomicU8 = AtomicU8::new(Level::Critical as u8);

/// The threshold used by handlers without an explicit level.
///
/// Starts out as [`Level::Critical`]. Reads and writes are relaxed: an update
/// becomes visible to other threads eventually, not at a defined point.
pub fn default_level() -> Level {
    Level::from_u8(DEFAULT_LEVEL.load(Ordering::Relaxed))
}

/// Change the process-wide default threshold. Last write wins.
pub fn set_default_level(level: Level) {
    DEFAULT_LEVEL.store(level as u8, Ordering::Relaxed);
}

// ============== Severity gate ==============

/// Resolve a per-handler override against the process-wide default.
pub fn effective_threshold(explicit: Option<Level>) -> Level {
    explicit.unwrap_or_else(default_level)
}

/// A record is forwarded iff its level is at or above the threshold.
pub fn passes(level: Level, threshold: Level) -> bool {
    level >= threshold
}
