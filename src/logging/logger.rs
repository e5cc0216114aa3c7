use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use eyre::Context;
use log::{LevelFilter, Log};
use parking_lot::{Mutex, RwLock};

use super::{
    clock::{Clock, SystemClock},
    event::{CallSite, ErrorInfo, LogEvent, Severity, SeverityFlags},
    LogSink,
};

type Subscribers = Arc<Vec<Arc<dyn LogSink>>>;

/// Broadcasts every emitted event to all subscribed sinks, in subscription order,
/// on the calling thread.
pub struct Emitter {
    sinks: RwLock<Subscribers>,
    mute: RwLock<SeverityFlags<bool>>,
    show_whence: RwLock<SeverityFlags<bool>>,
    last_line: Mutex<Option<String>>,
    disposed: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sinks: RwLock::new(Arc::new(Vec::new())),
            mute: RwLock::new(SeverityFlags::default()),
            show_whence: RwLock::new(SeverityFlags::default_whence()),
            last_line: Mutex::new(None),
            disposed: AtomicBool::new(false),
            clock,
        }
    }

    pub fn subscribe(&self, sink: Arc<dyn LogSink>) {
        if self.is_disposed() {
            return;
        }

        let mut sinks = self.sinks.write();
        let mut next = Vec::with_capacity(sinks.len() + 1);
        next.extend(sinks.iter().cloned());
        next.push(sink);
        *sinks = Arc::new(next);
    }

    /// Removes `sink` (matched by identity). Returns whether it was subscribed.
    pub fn unsubscribe<S: LogSink + ?Sized>(&self, sink: &Arc<S>) -> bool {
        let target = Arc::as_ptr(sink) as *const ();

        let mut sinks = self.sinks.write();
        let Some(index) = sinks
            .iter()
            .position(|s| Arc::as_ptr(s) as *const () == target)
        else {
            return false;
        };

        let mut next: Vec<_> = sinks.iter().cloned().collect();
        next.remove(index);
        *sinks = Arc::new(next);
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn emit(
        &self,
        severity: Severity,
        message: impl Into<String>,
        error: Option<ErrorInfo>,
        call_site: Option<CallSite>,
    ) {
        if self.is_disposed() {
            return;
        }

        let event = LogEvent::new(severity, message, self.clock.now())
            .with_error(error)
            .with_call_site(call_site);

        // Sinks may (un)subscribe while we deliver; they only ever replace the list.
        // Checked again under the read lock; `dispose` raises the flag first.
        let sinks = {
            let guard = self.sinks.read();
            if self.is_disposed() {
                return;
            }
            Arc::clone(&guard)
        };
        for sink in sinks.iter() {
            deliver(sink.as_ref(), &event);
        }

        *self.last_line.lock() = Some(event.message().to_string());
    }

    pub fn debug(&self, message: impl Into<String>, call_site: Option<CallSite>) {
        self.emit(Severity::Debug, message, None, call_site)
    }

    pub fn info(&self, message: impl Into<String>, call_site: Option<CallSite>) {
        self.emit(Severity::Info, message, None, call_site)
    }

    pub fn warning(&self, message: impl Into<String>, call_site: Option<CallSite>) {
        self.emit(Severity::Warning, message, None, call_site)
    }

    pub fn error(&self, message: impl Into<String>, call_site: Option<CallSite>) {
        self.emit(Severity::Error, message, None, call_site)
    }

    pub fn exception(
        &self,
        message: impl Into<String>,
        error: impl Into<ErrorInfo>,
        call_site: Option<CallSite>,
    ) {
        self.emit(Severity::Exception, message, Some(error.into()), call_site)
    }

    /// The message of the most recent emit, if any.
    pub fn last_line(&self) -> Option<String> {
        self.last_line.lock().clone()
    }

    pub fn set_mute(&self, severity: Severity, muted: bool) {
        self.mute.write().set(severity, muted);
    }

    pub fn is_muted(&self, severity: Severity) -> bool {
        self.mute.read().get(severity)
    }

    pub fn set_show_whence(&self, severity: Severity, show: bool) {
        self.show_whence.write().set(severity, show);
    }

    pub fn shows_whence(&self, severity: Severity) -> bool {
        self.show_whence.read().get(severity)
    }

    /// Message plus whence as seen through this emitter's own tables. `None` when
    /// the severity is muted here. Delivery to sinks ignores these tables.
    pub fn render(&self, event: &LogEvent) -> Option<String> {
        if self.is_muted(event.severity()) {
            return None;
        }

        let whence = event
            .call_site()
            .filter(|_| self.shows_whence(event.severity()))
            .map(|site| site.to_string())
            .unwrap_or_default();

        Some(format!("{} {}", event.message(), whence).trim_end().to_string())
    }

    pub fn flush(&self) {
        let sinks = Arc::clone(&self.sinks.read());
        for sink in sinks.iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| sink.flush())).is_err() {
                tracing::warn!("log sink panicked while flushing");
            }
        }
    }

    /// Releases every subscription. Later emits do nothing. Safe to call repeatedly.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let released = std::mem::take(&mut *self.sinks.write());
        tracing::debug!("emitter disposed, released {} sink(s)", released.len());
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn deliver(sink: &dyn LogSink, event: &LogEvent) {
    match panic::catch_unwind(AssertUnwindSafe(|| sink.write_log(event))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::debug!("log sink failed on {} event, dropped for it: {:#}", event.severity(), err),
        Err(_) => tracing::warn!("log sink panicked on {} event, dropped for it", event.severity()),
    }
}

/// Feeds records from the `log` facade into an [`Emitter`].
pub struct LogBridge {
    emitter: Arc<Emitter>,
    filter: LevelFilter,
}

impl LogBridge {
    pub fn new(emitter: Arc<Emitter>, filter: LevelFilter) -> Self {
        Self { emitter, filter }
    }

    pub fn init(self) -> eyre::Result<()> {
        log::set_max_level(self.filter);
        log::set_boxed_logger(Box::new(self)).context("Failed registering boxed logger")?;

        Ok(())
    }

    fn severity(level: log::Level) -> Severity {
        match level {
            log::Level::Error => Severity::Error,
            log::Level::Warn => Severity::Warning,
            log::Level::Info => Severity::Info,
            log::Level::Debug | log::Level::Trace => Severity::Debug,
        }
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        !self.emitter.is_disposed() && self.filter >= metadata.level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let call_site = CallSite::new(
            record.module_path().unwrap_or(record.target()),
            record.file().unwrap_or_default(),
            record.line().unwrap_or_default(),
        );

        self.emitter.emit(
            Self::severity(record.level()),
            record.args().to_string(),
            None,
            Some(call_site),
        );
    }

    fn flush(&self) {
        self.emitter.flush()
    }
}
