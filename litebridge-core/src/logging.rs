// logging.rs - Bridge-internal diagnostics
// Writes to stderr only. Never calls into the managed runtime, so it stays
// usable on threads that failed to attach or while an exception is pending.

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};

/// Log levels (ordered by severity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Failures that abort an operation or drop a callback
    Error = 0,
    /// Recoverable problems (pending exceptions, skipped batch slots)
    Warn = 1,
    /// Initialization milestones
    Info = 2,
    /// Attach/detach and dispatch details
    Debug = 3,
    /// Every handle transition
    Trace = 4,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<LogLevel> {
        match s.to_uppercase().as_str() {
            "ERROR" => Some(LogLevel::Error),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            "TRACE" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

static GLOBAL_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);

/// Set the global diagnostic level
pub fn set_log_level(level: LogLevel) {
    GLOBAL_LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Get the current global diagnostic level
pub fn get_log_level() -> LogLevel {
    match GLOBAL_LOG_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Error,
        1 => LogLevel::Warn,
        2 => LogLevel::Info,
        3 => LogLevel::Debug,
        4 => LogLevel::Trace,
        _ => LogLevel::Warn,
    }
}

#[inline]
pub fn should_log(level: LogLevel) -> bool {
    level <= get_log_level()
}

/// Format one diagnostic line.
///
/// The thread name is included because most lines originate on engine
/// threads the managed side has never seen.
pub fn format_line(level: LogLevel, module: &str, message: &str) -> String {
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("<unnamed>");
    let mut line = String::with_capacity(level.as_str().len() + module.len() + name.len() + message.len() + 8);
    line.push('[');
    line.push_str(level.as_str());
    line.push_str("] ");
    line.push_str(module);
    line.push_str(" (");
    line.push_str(name);
    line.push_str("): ");
    line.push_str(message);
    line
}

#[doc(hidden)]
pub fn log_message(level: LogLevel, module: &str, message: &str) {
    if should_log(level) {
        let line = format_line(level, module, message);
        // stderr may be closed in embedded hosts; nothing else to report to.
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}

/// Last-resort diagnostic for callback paths that cannot reach the managed
/// runtime. Always emitted regardless of the configured level.
pub fn fallback(label: &str, message: &str) {
    let line = format_line(LogLevel::Error, label, message);
    let _ = writeln!(std::io::stderr().lock(), "{}", line);
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_message(
            $crate::logging::LogLevel::Error,
            module_path!(),
            &format!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::log_message(
            $crate::logging::LogLevel::Warn,
            module_path!(),
            &format!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_message(
            $crate::logging::LogLevel::Info,
            module_path!(),
            &format!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_message(
            $crate::logging::LogLevel::Debug,
            module_path!(),
            &format!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::logging::log_message(
            $crate::logging::LogLevel::Trace,
            module_path!(),
            &format!($($arg)*)
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("TrAcE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("verbose"), None);
    }

    #[test]
    fn test_format_line_keeps_full_message() {
        // Multi-byte text must survive intact; lengths come from the text itself.
        let msg = "attach failed for 🚀 thread";
        let line = format_line(LogLevel::Error, "bridge", msg);
        assert!(line.ends_with(msg));
        assert!(line.starts_with("[ERROR] bridge ("));
    }
}
