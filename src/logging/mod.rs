mod clock;
mod event;
mod formatters;
mod logger;
mod macros;
mod sinks;

pub use clock::{day_bucket, hour_bucket, Clock, ManualClock, SystemClock};
pub use event::{
    current_thread_id, stack_trace, CallSite, Chain, ErrorInfo, LogEvent, Severity,
    SeverityFlags, MAX_CAUSE_DEPTH,
};
pub use formatters::{FormatConfig, LineFormatter};
pub use logger::{Emitter, LogBridge};
pub use sinks::{CachedSink, ConsoleSink, FileSink, RolloverPolicy};

pub trait LogFormatter: Sync + Send {
    /// Renders one event. Exception events may produce several lines.
    fn format(&self, event: &LogEvent) -> Vec<String>;

    fn accepts(&self, _severity: Severity) -> bool {
        true
    }
}

/// A consumer of every event an [`Emitter`] broadcasts.
///
/// Errors returned (and panics raised) from `write_log` are swallowed by the
/// emitter; they never reach the code that logged.
pub trait LogSink: Sync + Send {
    fn write_log(&self, event: &LogEvent) -> eyre::Result<()>;
    fn flush(&self);
}
