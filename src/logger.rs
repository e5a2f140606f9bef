//! Launcher diagnostics log.
//!
//! Lifecycle events (spawn, stop escalation) go to a timestamped file log.
//! The child's own output never passes through here; the launcher only
//! routes it to the configured destinations.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

const LOG_PATH: &str = "logs/launcher.log";

pub struct Logger {
    // None when the log file could not be opened: a diagnostics log must
    // never take the launcher down, so logging degrades to a no-op.
    file: Mutex<Option<File>>,
}

impl Logger {
    pub fn new(log_path: &str) -> Self {
        Logger {
            file: Mutex::new(Self::open(log_path)),
        }
    }

    fn open(log_path: &str) -> Option<File> {
        if let Some(parent) = Path::new(log_path).parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .ok()
    }

    pub fn log(&self, level: &str, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let line = format!("[{timestamp}] [{level}] {message}\n");

        if let Ok(mut guard) = self.file.lock() {
            if let Some(ref mut file) = *guard {
                let _ = file.write_all(line.as_bytes());
                let _ = file.flush();
            }
        }
    }

    pub fn debug(&self, message: &str) {
        self.log("DEBUG", message);
    }

    pub fn info(&self, message: &str) {
        self.log("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        self.log("WARN", message);
    }

    pub fn error(&self, message: &str) {
        self.log("ERROR", message);
    }
}

lazy_static::lazy_static! {
    pub static ref LOGGER: Logger = Logger::new(LOG_PATH);
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logger::LOGGER.debug(&format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::LOGGER.info(&format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::LOGGER.warn(&format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::LOGGER.error(&format!($($arg)*));
    };
}
