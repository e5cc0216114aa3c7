use core::fmt;
use std::{
    backtrace::{Backtrace, BacktraceStatus},
    cell::Cell,
    iter,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Local};

/// Upper bound on the number of cause-chain elements that are ever collected or
/// rendered. A malformed chain stops here instead of looping forever.
pub const MAX_CAUSE_DEPTH: usize = 64;

/// The closed set of severities an event can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Exception,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Exception,
    ];

    /// Single letter tag used inside the `[<level>]` segment of a rendered line.
    pub fn tag(&self) -> &'static str {
        match self {
            Severity::Debug => "D",
            Severity::Info => "I",
            Severity::Warning => "W",
            Severity::Error => "E",
            Severity::Exception => "X",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per severity. Used for mute tables, whence tables and colour maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityFlags<T> {
    pub debug: T,
    pub info: T,
    pub warning: T,
    pub error: T,
    pub exception: T,
}

impl<T: Copy> SeverityFlags<T> {
    pub fn all(value: T) -> Self {
        Self {
            debug: value,
            info: value,
            warning: value,
            error: value,
            exception: value,
        }
    }

    pub fn get(&self, severity: Severity) -> T {
        match severity {
            Severity::Debug => self.debug,
            Severity::Info => self.info,
            Severity::Warning => self.warning,
            Severity::Error => self.error,
            Severity::Exception => self.exception,
        }
    }

    pub fn set(&mut self, severity: Severity, value: T) {
        let slot = match severity {
            Severity::Debug => &mut self.debug,
            Severity::Info => &mut self.info,
            Severity::Warning => &mut self.warning,
            Severity::Error => &mut self.error,
            Severity::Exception => &mut self.exception,
        };
        *slot = value;
    }
}

impl SeverityFlags<bool> {
    /// Call-site shown for Debug, Error and Exception; hidden for Info and Warning.
    pub fn default_whence() -> Self {
        Self {
            debug: true,
            info: false,
            warning: false,
            error: true,
            exception: true,
        }
    }
}

/// Where in the caller's code an emit operation was invoked.
///
/// The core never works this out by itself; callers build it, usually through the
/// [`call_site!`](crate::call_site) macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub caller: String,
    pub file: String,
    pub line: u32,
}

impl CallSite {
    pub fn new(caller: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            caller: caller.into(),
            file: file.into(),
            line,
        }
    }
}

/// Renders the whence text: `<caller> at <file>:<line>`.
impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.caller, self.file, self.line)
    }
}

/// A captured error and, optionally, the error that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    message: String,
    stack: Option<String>,
    source: Option<String>,
    cause: Option<Box<ErrorInfo>>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            source: None,
            cause: None,
        }
    }

    pub fn with_stack(self, stack: impl Into<String>) -> Self {
        Self {
            stack: Some(stack.into()),
            ..self
        }
    }

    pub fn with_source(self, source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..self
        }
    }

    /// Records the frames of `backtrace` as the stack. A backtrace that wasn't
    /// captured leaves the current stack alone.
    pub fn with_backtrace(self, backtrace: &Backtrace) -> Self {
        Self {
            stack: rendered(backtrace).or(self.stack),
            ..self
        }
    }

    /// Sets the source unless one is already recorded.
    pub fn or_source(self, source: impl Into<String>) -> Self {
        Self {
            source: self.source.or_else(|| Some(source.into())),
            ..self
        }
    }

    pub fn caused_by(self, cause: ErrorInfo) -> Self {
        Self {
            cause: Some(Box::new(cause)),
            ..self
        }
    }

    /// Captures `err` and its `source()` chain, keeping at most
    /// [`MAX_CAUSE_DEPTH`] elements. The outermost element gets the current
    /// backtrace as its stack when `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE`
    /// enables capture.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::from_chain(iter::successors(Some(err), |e| e.source()))
    }

    fn from_chain<'a>(chain: impl Iterator<Item = &'a (dyn std::error::Error + 'static)>) -> Self {
        let messages: Vec<String> = chain.take(MAX_CAUSE_DEPTH).map(|e| e.to_string()).collect();

        messages
            .into_iter()
            .rev()
            .fold(None, |cause: Option<ErrorInfo>, message| {
                Some(ErrorInfo {
                    message,
                    stack: None,
                    source: None,
                    cause: cause.map(Box::new),
                })
            })
            .unwrap_or_else(|| ErrorInfo::new(""))
            .with_backtrace(&Backtrace::capture())
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn cause(&self) -> Option<&ErrorInfo> {
        self.cause.as_deref()
    }

    /// Walks this error and its causes, outermost first.
    pub fn chain(&self) -> Chain<'_> {
        Chain {
            next: Some(self),
            remaining: MAX_CAUSE_DEPTH,
        }
    }
}

impl From<&eyre::Report> for ErrorInfo {
    fn from(report: &eyre::Report) -> Self {
        Self::from_chain(report.chain())
    }
}

impl From<eyre::Report> for ErrorInfo {
    fn from(report: eyre::Report) -> Self {
        Self::from(&report)
    }
}

impl From<&str> for ErrorInfo {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ErrorInfo {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

pub struct Chain<'a> {
    next: Option<&'a ErrorInfo>,
    remaining: usize,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a ErrorInfo;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let current = self.next?;
        self.next = current.cause();
        self.remaining -= 1;
        Some(current)
    }
}

fn rendered(backtrace: &Backtrace) -> Option<String> {
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

/// `site` followed by the frames of the calling thread, captured regardless of
/// `RUST_BACKTRACE`. Usually reached through [`stack_trace!`](crate::stack_trace).
pub fn stack_trace(site: &CallSite) -> String {
    format!("{}\n{}", site, Backtrace::force_capture())
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// Process-unique number of the calling thread, assigned on first use.
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|slot| {
        if slot.get() == 0 {
            slot.set(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed));
        }
        slot.get()
    })
}

/// One logged occurrence.
///
/// Thread identity and timestamp are captured when the event is built and never
/// change afterwards. Sinks only ever see `&LogEvent`.
#[derive(Debug, Clone)]
pub struct LogEvent {
    severity: Severity,
    message: String,
    error: Option<ErrorInfo>,
    call_site: Option<CallSite>,
    thread_id: u64,
    thread_name: Option<String>,
    timestamp: DateTime<Local>,
}

impl LogEvent {
    pub fn new(severity: Severity, message: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            severity,
            message: message.into(),
            error: None,
            call_site: None,
            thread_id: current_thread_id(),
            thread_name: std::thread::current().name().map(str::to_owned),
            timestamp,
        }
    }

    pub fn with_error(self, error: Option<ErrorInfo>) -> Self {
        Self { error, ..self }
    }

    pub fn with_call_site(self, call_site: Option<CallSite>) -> Self {
        Self { call_site, ..self }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn call_site(&self) -> Option<&CallSite> {
        self.call_site.as_ref()
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    pub fn timestamp(&self) -> &DateTime<Local> {
        &self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Looping;

    impl fmt::Display for Looping {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("looping")
        }
    }

    impl std::error::Error for Looping {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(self)
        }
    }

    #[test]
    fn self_referencing_source_is_capped() {
        let info = ErrorInfo::from_error(&Looping);
        assert_eq!(info.chain().count(), MAX_CAUSE_DEPTH);
        assert!(info.chain().all(|e| e.message() == "looping"));
    }

    #[test]
    fn eyre_report_keeps_context_order() {
        let report = eyre::eyre!("disk full").wrap_err("saving settings");
        let info = ErrorInfo::from(&report);
        let messages: Vec<_> = info.chain().map(ErrorInfo::message).collect();
        assert_eq!(messages, vec!["saving settings", "disk full"]);
    }

    #[test]
    fn thread_ids_differ_across_threads() {
        let here = current_thread_id();
        assert_eq!(here, current_thread_id());

        let there = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn event_captures_thread_name() {
        let event = std::thread::Builder::new()
            .name("worker-7".into())
            .spawn(|| LogEvent::new(Severity::Info, "hi", Local::now()))
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(event.thread_name(), Some("worker-7"));
        assert_ne!(event.thread_id(), current_thread_id());
    }

    #[test]
    fn whence_text() {
        let site = CallSite::new("app::run", "src/app.rs", 42);
        assert_eq!(site.to_string(), "app::run at src/app.rs:42");
    }

    #[test]
    fn default_whence_table() {
        let flags = SeverityFlags::default_whence();
        assert!(flags.get(Severity::Debug));
        assert!(!flags.get(Severity::Info));
        assert!(!flags.get(Severity::Warning));
        assert!(flags.get(Severity::Error));
        assert!(flags.get(Severity::Exception));
    }

    #[test]
    fn severity_names() {
        let names: Vec<String> = Severity::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["DEBUG", "INFO", "WARNING", "ERROR", "EXCEPTION"]);
    }

    #[test]
    fn captured_backtrace_becomes_the_stack() {
        let info = ErrorInfo::new("boom").with_backtrace(&Backtrace::force_capture());
        assert!(!info.stack().unwrap_or_default().is_empty());

        let kept = ErrorInfo::new("boom")
            .with_stack("by hand")
            .with_backtrace(&Backtrace::disabled());
        assert_eq!(kept.stack(), Some("by hand"));
    }

    #[test]
    fn source_is_filled_only_once() {
        let info = ErrorInfo::new("boom").or_source("app::io").or_source("app::other");
        assert_eq!(info.source(), Some("app::io"));
    }
}
