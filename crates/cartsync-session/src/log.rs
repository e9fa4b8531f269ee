//! User-visible log surface: an ordered, append-only stream of status lines.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

pub trait LogSurface: Send + Sync {
    fn append_line(&self, level: LogLevel, line: &str);

    fn info(&self, line: &str) {
        self.append_line(LogLevel::Info, line);
    }

    fn warn(&self, line: &str) {
        self.append_line(LogLevel::Warn, line);
    }

    fn error(&self, line: &str) {
        self.append_line(LogLevel::Error, line);
    }
}

/// Forwards every line to `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSurface for TracingLog {
    fn append_line(&self, level: LogLevel, line: &str) {
        match level {
            LogLevel::Info => tracing::info!(target: "cartsync::output", "{line}"),
            LogLevel::Warn => tracing::warn!(target: "cartsync::output", "{line}"),
            LogLevel::Error => tracing::error!(target: "cartsync::output", "{line}"),
        }
    }
}

/// Buffers lines in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        match self.lines.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn lines_at(&self, level: LogLevel) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line)
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, line)| line.contains(needle))
    }
}

impl LogSurface for MemoryLog {
    fn append_line(&self, level: LogLevel, line: &str) {
        let mut guard = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((level, line.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_keeps_order_and_levels() {
        let log = MemoryLog::new();
        log.info("Starting...");
        log.warn("duplicate cartridge");
        log.error("boom");

        let lines = log.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], (LogLevel::Info, "Starting...".to_string()));
        assert_eq!(log.lines_at(LogLevel::Warn), vec!["duplicate cartridge"]);
        assert!(log.contains("boo"));
        assert!(!log.contains("absent"));
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Warn.as_str(), "WARN");
        assert_eq!(LogLevel::Error.as_str(), "ERROR");
    }
}
