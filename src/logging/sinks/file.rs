use std::{
    cell::RefCell,
    fs::{File, OpenOptions},
    io::{LineWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Local};
use eyre::Context;
use parking_lot::{ReentrantMutex, RwLock};

use crate::logging::{
    clock::{day_bucket, hour_bucket, Clock, SystemClock},
    event::LogEvent,
    formatters::LineFormatter,
    LogFormatter, LogSink,
};

/// When a [`FileSink`] asks its owner for a new destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverPolicy {
    Never,
    Daily,
    Hourly,
    /// Every `n` accepted events. `AfterLines(0)` never asks.
    AfterLines(usize),
}

impl RolloverPolicy {
    fn bucket(&self, time: &DateTime<Local>) -> Option<i64> {
        match self {
            RolloverPolicy::Daily => Some(day_bucket(time)),
            RolloverPolicy::Hourly => Some(hour_bucket(time)),
            RolloverPolicy::Never | RolloverPolicy::AfterLines(_) => None,
        }
    }
}

type RolloverHandler = dyn Fn(&FileSink) + Send + Sync;

struct Destination {
    path: PathBuf,
    writer: LineWriter<File>,
}

struct FileState {
    destination: Option<Destination>,
    lines: usize,
    notified_lines: Option<usize>,
    opened_bucket: Option<i64>,
    notified_bucket: Option<i64>,
    closed: bool,
}

/// Appends every accepted event to a text file, one flushed line at a time.
///
/// Rollover is advisory: when the policy says a new file is due, the handler set
/// with [`on_rollover`](Self::on_rollover) runs before the line is written and is
/// expected to call [`set_path`](Self::set_path). If it doesn't, the current file
/// keeps growing.
pub struct FileSink {
    // Re-entrant so the rollover handler can call `set_path` from inside `write_log`.
    state: ReentrantMutex<RefCell<FileState>>,
    policy: RolloverPolicy,
    formatter: Box<dyn LogFormatter>,
    clock: Arc<dyn Clock>,
    on_rollover: RwLock<Option<Arc<RolloverHandler>>>,
}

impl FileSink {
    pub fn new(path: impl AsRef<Path>, policy: RolloverPolicy) -> eyre::Result<Self> {
        let sink = Self::unopened(policy);
        sink.set_path(path)?;
        Ok(sink)
    }

    /// A sink without a destination; events are dropped until `set_path` succeeds.
    pub fn unopened(policy: RolloverPolicy) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(FileState {
                destination: None,
                lines: 0,
                notified_lines: None,
                opened_bucket: None,
                notified_bucket: None,
                closed: false,
            })),
            policy,
            formatter: Box::new(LineFormatter::default()),
            clock: Arc::new(SystemClock),
            on_rollover: RwLock::new(None),
        }
    }

    pub fn with_formatter(mut self, formatter: Box<dyn LogFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Replaces the clock used to read the bucket of a freshly opened file, and
    /// re-reads the bucket of the current one.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let bucket = self.policy.bucket(&clock.now());
        let state = self.state.get_mut().get_mut();
        if state.destination.is_some() {
            state.opened_bucket = bucket;
        }
        self.clock = clock;
        self
    }

    pub fn on_rollover(&self, handler: impl Fn(&FileSink) + Send + Sync + 'static) {
        *self.on_rollover.write() = Some(Arc::new(handler));
    }

    pub fn policy(&self) -> RolloverPolicy {
        self.policy
    }

    pub fn path(&self) -> Option<PathBuf> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.destination.as_ref().map(|d| d.path.clone())
    }

    /// Accepted events since the current file was opened.
    pub fn lines_written(&self) -> usize {
        self.state.lock().borrow().lines
    }

    /// Switches to `path` (created if missing, appended otherwise).
    ///
    /// The new file is opened before the old one is let go, so on error the old
    /// destination stays in service and the error is returned to the caller.
    pub fn set_path(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let path = path.as_ref();

        let guard = self.state.lock();
        if guard.borrow().closed {
            eyre::bail!("File sink is closed, refusing to open {}", path.display());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed opening or creating log file {}", path.display()))?;

        let mut state = guard.borrow_mut();
        if let Some(old) = state.destination.take() {
            close_destination(old);
        }

        state.destination = Some(Destination {
            path: path.to_path_buf(),
            writer: LineWriter::new(file),
        });
        state.lines = 0;
        state.notified_lines = None;
        state.opened_bucket = self.policy.bucket(&self.clock.now());
        state.notified_bucket = None;

        tracing::debug!("log file sink switched to {}", path.display());
        Ok(())
    }

    /// Flushes and closes the destination. Later events are dropped; calling it
    /// again does nothing.
    pub fn close(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.closed {
            return;
        }

        state.closed = true;
        if let Some(destination) = state.destination.take() {
            close_destination(destination);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().borrow().closed
    }

    fn rollover_due(&self, state: &mut FileState, event: &LogEvent) -> bool {
        match self.policy {
            RolloverPolicy::Never => false,
            RolloverPolicy::AfterLines(max) => {
                let due = max > 0 && state.lines > 0 && state.lines % max == 0;
                if !due || state.notified_lines == Some(state.lines) {
                    return false;
                }
                state.notified_lines = Some(state.lines);
                true
            }
            RolloverPolicy::Daily | RolloverPolicy::Hourly => {
                let Some(current) = self.policy.bucket(event.timestamp()) else {
                    return false;
                };
                // Only a later period counts; late events from an earlier one stay put.
                let later = |seen: Option<i64>| seen.map_or(true, |seen| current > seen);
                if !later(state.opened_bucket) || !later(state.notified_bucket) {
                    return false;
                }
                state.notified_bucket = Some(current);
                true
            }
        }
    }

    fn notify_rollover(&self) {
        let handler = self.on_rollover.read().clone();
        match handler {
            Some(handler) => handler(self),
            None => tracing::debug!("log file rollover due but no handler registered"),
        }
    }
}

fn close_destination(mut destination: Destination) {
    if let Err(err) = destination.writer.flush() {
        tracing::warn!(
            "failed flushing log file {} on close: {}",
            destination.path.display(),
            err
        );
    }
}

impl LogSink for FileSink {
    fn write_log(&self, event: &LogEvent) -> eyre::Result<()> {
        if !self.formatter.accepts(event.severity()) {
            return Ok(());
        }

        let guard = self.state.lock();
        if guard.borrow().closed {
            return Ok(());
        }

        let due = self.rollover_due(&mut guard.borrow_mut(), event);
        if due {
            self.notify_rollover();
        }

        let lines = self.formatter.format(event);

        let mut state = guard.borrow_mut();
        if let Some(destination) = state.destination.as_mut() {
            for line in &lines {
                writeln!(destination.writer, "{}", line)?;
            }
            destination.writer.flush().context("Can't flush log file")?;
        }
        state.lines += 1;

        Ok(())
    }

    fn flush(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if let Some(destination) = state.destination.as_mut() {
            if let Err(err) = destination.writer.flush() {
                tracing::warn!("failed flushing log file {}: {}", destination.path.display(), err);
            }
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        self.close();
    }
}
