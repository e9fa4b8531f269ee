//! Process-lifetime output channel.
//!
//! Lines go to stderr and, when the log directory is writable, to
//! `{log_dir}/run-{timestamp}.log`. The channel owns the writer's guard and
//! lives for the whole process; sessions only borrow it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use cartsync_session::{LogLevel, LogSurface};
use chrono::{Local, Utc};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

/// Create the run log writer in `log_dir`.
///
/// Returns a non-blocking writer, its worker guard (which must outlive every
/// write) and the path of the file.
pub(crate) fn create_run_log_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard, PathBuf)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_name = format!("run-{}.log", Utc::now().format("%Y%m%d-%H%M%S"));
    let path = log_dir.join(&file_name);
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    Ok((non_blocking, guard, path))
}

struct FileSink {
    writer: Mutex<NonBlocking>,
    path: PathBuf,
    _guard: WorkerGuard,
}

pub(crate) struct OutputChannel {
    file: Option<FileSink>,
    echo_stderr: bool,
}

impl OutputChannel {
    /// Open the channel with a run log in `log_dir`. Falls back to
    /// stderr-only output when the log file cannot be created.
    pub(crate) fn open(log_dir: &Path) -> Self {
        match create_run_log_writer(log_dir) {
            Ok((writer, guard, path)) => {
                tracing::debug!(path = %path.display(), "output log opened");
                Self {
                    file: Some(FileSink {
                        writer: Mutex::new(writer),
                        path,
                        _guard: guard,
                    }),
                    echo_stderr: true,
                }
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "output log unavailable, using stderr only");
                Self {
                    file: None,
                    echo_stderr: true,
                }
            }
        }
    }

    pub(crate) fn log_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    #[cfg(test)]
    fn file_only(log_dir: &Path) -> Self {
        let mut channel = Self::open(log_dir);
        channel.echo_stderr = false;
        channel
    }
}

fn format_line(level: LogLevel, line: &str) -> String {
    match level {
        LogLevel::Info => line.to_string(),
        LogLevel::Warn | LogLevel::Error => format!("[{}] {line}", level.as_str()),
    }
}

impl LogSurface for OutputChannel {
    fn append_line(&self, level: LogLevel, line: &str) {
        let text = format_line(level, line);
        if self.echo_stderr {
            eprintln!("{text}");
        }
        let Some(file) = &self.file else {
            return;
        };
        let mut writer = match file.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Err(e) = writeln!(writer, "{stamp} {text}") {
            tracing::debug!(error = %e, "failed to write output log line");
        }
    }
}
