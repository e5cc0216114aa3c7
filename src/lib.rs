//! Multi-sink logging: one [`Emitter`] broadcasts each event to every subscribed
//! [`LogSink`], each of which renders, filters or stores it on its own terms.

pub mod logging;

pub use logging::{
    current_thread_id, stack_trace, CachedSink, CallSite, Clock, ConsoleSink, Emitter, ErrorInfo, FileSink,
    FormatConfig, LineFormatter, LogBridge, LogEvent, LogFormatter, LogSink, ManualClock,
    RolloverPolicy, Severity, SeverityFlags, SystemClock,
};
