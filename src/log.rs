//! Levelled file logging for the wizard engine.
//!
//! The engine writes lifecycle lines at INFO, backend failures and expired
//! sessions at WARN, operation entry and transitions at DEBUG, and dropped
//! autosave ticks or concurrent requests at TRACE. INFO is the default;
//! `--debug` or `WIZARD_DEBUG=1` raises it to DEBUG.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

static LOGGER: OnceLock<FileLogger> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    /// Level for a process started with or without `--debug`.
    pub fn for_debug(debug: bool) -> Self {
        let from_env = std::env::var("WIZARD_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug || from_env {
            Level::Debug
        } else {
            Level::Info
        }
    }
}

/// Appends timestamped lines at or below a threshold level to one file.
#[derive(Debug)]
pub struct FileLogger {
    path: PathBuf,
    threshold: AtomicU8,
}

impl FileLogger {
    /// Create the parent directory and truncate `path`.
    pub fn create(path: PathBuf, threshold: Level) -> Self {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::write(&path, "");
        Self {
            path,
            threshold: AtomicU8::new(threshold as u8),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_threshold(&self, level: Level) {
        self.threshold.store(level as u8, Ordering::Relaxed);
    }

    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.threshold.load(Ordering::Relaxed)
    }

    pub fn write(&self, level: Level, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] [{}] {}", timestamp, level.label(), args);
        }
    }
}

/// Log to ~/.wizard/wizard.log. Later calls are ignored.
pub fn init_with_debug(debug: bool) {
    if let Some(home) = dirs::home_dir() {
        init_at(home.join(".wizard").join("wizard.log"), Level::for_debug(debug));
    }
}

/// Log to an explicit file. Later calls are ignored.
pub fn init_at(path: PathBuf, threshold: Level) {
    LOGGER.get_or_init(|| FileLogger::create(path, threshold));
}

/// Write through the process logger; a no-op before initialization.
pub fn write(level: Level, args: fmt::Arguments<'_>) {
    if let Some(logger) = LOGGER.get() {
        logger.write(level, args);
    }
}

#[macro_export]
macro_rules! wlog {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! wlog_warn {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! wlog_debug {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! wlog_trace {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Trace, format_args!($($arg)*))
    };
}
