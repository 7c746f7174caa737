//! Structured terminal logging with box-drawing decoration.
//!
//! Every message sunshift prints goes through [`Log`]. Output can be
//! switched off globally (print mode and tests), and debug output is only
//! shown while verbose mode is on.

use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Log level enumeration for categorizing message importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Log,  // Verbose operational output
    Warn, // Non-fatal issues
    Err,  // Failures of the current operation
    Crit, // Failures that end the process
}

impl LogLevel {
    fn prefix(self) -> &'static str {
        match self {
            LogLevel::Log => "[LOG]",
            LogLevel::Warn => "[WARN]",
            LogLevel::Err => "[ERR]",
            LogLevel::Crit => "[CRIT]",
        }
    }
}

/// Main logging interface providing structured output formatting.
pub struct Log;

impl Log {
    /// Enable or disable all output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Enable or disable verbose debug output (`-v`).
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Main log function with level-based prefixes.
    ///
    /// Warnings and errors go to stderr so that print mode output on
    /// stdout stays machine-readable.
    pub fn log(level: LogLevel, message: &str) {
        if !Self::is_enabled() {
            return;
        }

        match level {
            LogLevel::Warn | LogLevel::Err | LogLevel::Crit => {
                eprintln!("{} {}", level.prefix(), message)
            }
            LogLevel::Log => println!("{} {}", level.prefix(), message),
        }
    }

    // ═══ Convenience Methods for Common Log Levels ═══

    pub fn log_error(message: &str) {
        Self::log(LogLevel::Err, message);
    }

    pub fn log_warning(message: &str) {
        Self::log(LogLevel::Warn, message);
    }

    /// Log a verbose message. Dropped unless debug output is enabled.
    pub fn log_debug(message: &str) {
        if Self::is_debug() {
            Self::log(LogLevel::Log, message);
        }
    }

    pub fn log_critical(message: &str) {
        Self::log(LogLevel::Crit, message);
    }

    // ═══ Visual Formatting Functions ═══

    /// Log a decorated message with visual branching indicator.
    pub fn log_decorated(message: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("┣ {}", message);
    }

    /// Log an indented message for sub-items or details.
    pub fn log_indented(message: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("┃   {}", message);
    }

    pub fn log_pipe() {
        if !Self::is_enabled() {
            return;
        }
        println!("┃");
    }

    /// Log a block start message with visual separation.
    ///
    /// Used for phase changes such as method startup or shutdown.
    pub fn log_block_start(message: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("┃");
        println!("┣ {}", message);
    }

    pub fn log_version() {
        if !Self::is_enabled() {
            return;
        }
        println!("┏ sunshift v{} ━━╸", env!("CARGO_PKG_VERSION"));
        println!("┃");
    }

    pub fn log_end() {
        if !Self::is_enabled() {
            return;
        }
        println!("╹");
    }
}
