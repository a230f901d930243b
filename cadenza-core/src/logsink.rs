//! Size-Bounded Rotating Log Sink
//!
//! ## Overview
//!
//! When the agent runs headless there is no console to read failures from;
//! the rotating text log is the only durable error surface. The sink
//! writes one formatted line per record:
//!
//! ```text
//! [ERROR] [61.25]: Error occurred while sending data
//! ```
//!
//! and rotates the file once it grows past a size threshold, keeping a
//! bounded set of numbered backups (`path.1` newest … `path.N` oldest).
//!
//! ## Rotation
//!
//! Rotation runs before the append that would grow an oversized file:
//!
//! 1. delete `path.N` (oldest backup) if present
//! 2. shift `path.i` → `path.(i+1)` for i = N−1 down to 1
//! 3. rename `path` → `path.1`
//!
//! Every step is best-effort: a missing source or failed rename is
//! swallowed. Rotation is advisory - it must never turn a log write into
//! a new failure. At most the oldest backup is lost per rotation event.
//!
//! ## Concurrency
//!
//! Single-writer use only; no cross-process locking is attempted. Within
//! the process the sink takes `&self` and keeps its counters in atomics,
//! so it can also serve as the global [`log`] facade sink (see
//! [`RotatingLogSink::install`]).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::time::{MonotonicClock, TimeSource, Timestamp};

/// Record severity, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Diagnostic chatter
    Debug,
    /// Normal operation
    Info,
    /// Degraded but recovering
    Warning,
    /// Failure worth persisting
    Error,
}

impl Severity {
    /// Bracketed label used in the formatted line
    pub const fn label(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Severity::Error,
            log::Level::Warn => Severity::Warning,
            log::Level::Info => Severity::Info,
            log::Level::Debug | log::Level::Trace => Severity::Debug,
        }
    }
}

/// One log event; created per write, never retained
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    /// Record severity
    pub severity: Severity,
    /// Capture time in milliseconds since agent epoch
    pub timestamp_ms: Timestamp,
    /// Message text
    pub message: &'a str,
}

impl LogRecord<'_> {
    /// Render the `"[SEVERITY] [seconds]: message"` line (no newline)
    pub fn format_line(&self) -> String {
        format!(
            "[{}] [{:.2}]: {}",
            self.severity.label(),
            crate::time::to_payload_secs(self.timestamp_ms),
            self.message
        )
    }
}

/// Size threshold and backup count for rotation
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RotationLimits {
    /// Rotate once the live file exceeds this many bytes
    pub max_size: u64,
    /// Number of numbered backups to keep
    pub backups: u32,
}

impl Default for RotationLimits {
    fn default() -> Self {
        Self {
            max_size: 1024,
            backups: 2,
        }
    }
}

/// Sink health counters
///
/// Track sink behavior without making any write path fallible.
#[derive(Debug, Default)]
pub struct SinkStats {
    /// Records formatted and emitted
    pub records: AtomicU64,
    /// Rotations performed
    pub rotations: AtomicU32,
    /// File appends that failed (swallowed)
    pub write_errors: AtomicU32,
}

/// Append-only text log with size-triggered rotation
pub struct RotatingLogSink {
    path: Option<PathBuf>,
    limits: RotationLimits,
    console: bool,
    clock: Box<dyn TimeSource + Send + Sync>,
    stats: SinkStats,
}

impl RotatingLogSink {
    /// Console-only sink on the monotonic agent clock
    pub fn new() -> Self {
        Self {
            path: None,
            limits: RotationLimits::default(),
            console: true,
            clock: Box::new(MonotonicClock::new()),
            stats: SinkStats::default(),
        }
    }

    /// Configure the file that [`persist`](Self::persist) appends to
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Override rotation limits
    pub fn with_limits(mut self, limits: RotationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enable or disable the console copy of every record
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Use a different clock for record timestamps
    pub fn with_clock(mut self, clock: Box<dyn TimeSource + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Sink health counters
    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }

    /// Write one record; console always (when attached), file when `path`
    /// is given
    pub fn write(&self, record: &LogRecord<'_>, path: Option<&Path>) {
        let line = record.format_line();
        self.stats.records.fetch_add(1, Ordering::Relaxed);

        if self.console {
            eprintln!("{line}");
        }

        if let Some(path) = path {
            self.rotate_if_oversized(path);
            self.append_line(path, &line);
        }
    }

    /// Console-only convenience (the common path for routine events)
    pub fn log(&self, severity: Severity, message: &str) {
        self.write(&self.record(severity, message), None);
    }

    /// Console plus the configured file (the path failures take)
    pub fn persist(&self, severity: Severity, message: &str) {
        let record = self.record(severity, message);
        self.write(&record, self.path.as_deref());
    }

    /// Register this sink as the global `log` facade logger
    ///
    /// Facade records at `Error` level are persisted to the configured
    /// file; everything else goes to the console copy only.
    pub fn install(self, max_level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_max_level(max_level);
        log::set_boxed_logger(Box::new(self))
    }

    fn record<'a>(&self, severity: Severity, message: &'a str) -> LogRecord<'a> {
        LogRecord {
            severity,
            timestamp_ms: self.clock.now(),
            message,
        }
    }

    /// Shift backups and rename the live file once it exceeds the limit
    ///
    /// All filesystem errors in here are swallowed: the worst acceptable
    /// outcome of a failed rotation is an oversized or missing backup,
    /// never a lost append.
    fn rotate_if_oversized(&self, path: &Path) {
        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            // File doesn't exist yet
            Err(_) => return,
        };
        if size <= self.limits.max_size {
            return;
        }

        let backup = |i: u32| -> PathBuf {
            let mut name = path.as_os_str().to_os_string();
            name.push(format!(".{i}"));
            PathBuf::from(name)
        };

        let _ = fs::remove_file(backup(self.limits.backups));
        for i in (1..self.limits.backups).rev() {
            let _ = fs::rename(backup(i), backup(i + 1));
        }
        let _ = fs::rename(path, backup(1));

        self.stats.rotations.fetch_add(1, Ordering::Relaxed);
    }

    fn append_line(&self, path: &Path, line: &str) {
        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{line}"));

        if appended.is_err() {
            self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for RotatingLogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for RotatingLogSink {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        let message = record.args().to_string();
        let own = self.record(record.level().into(), &message);
        let path = if own.severity == Severity::Error {
            self.path.as_deref()
        } else {
            None
        };
        self.write(&own, path);
    }

    fn flush(&self) {}
}
