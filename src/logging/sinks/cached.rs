use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::logging::{
    event::{current_thread_id, LogEvent},
    formatters::LineFormatter,
    LogFormatter, LogSink,
};

/// Keeps rendered lines in memory, optionally only those logged from one thread.
///
/// Typical use is to isolate one worker's narrative: bind the sink to the worker's
/// thread, let it run, then `pause`, read `messages`, replay them elsewhere and
/// `resume`.
pub struct CachedSink {
    messages: Mutex<Vec<String>>,
    paused: AtomicBool,
    thread_filter: Option<u64>,
    formatter: Box<dyn LogFormatter>,
}

impl CachedSink {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            paused: AtomicBool::new(false),
            thread_filter: None,
            formatter: Box::new(LineFormatter::default()),
        }
    }

    /// Only events whose thread id equals `thread_id` are kept.
    pub fn for_thread(thread_id: u64) -> Self {
        Self {
            thread_filter: Some(thread_id),
            ..Self::new()
        }
    }

    pub fn for_current_thread() -> Self {
        Self::for_thread(current_thread_id())
    }

    pub fn with_formatter(self, formatter: Box<dyn LogFormatter>) -> Self {
        Self { formatter, ..self }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn thread_filter(&self) -> Option<u64> {
        self.thread_filter
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl Default for CachedSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for CachedSink {
    fn write_log(&self, event: &LogEvent) -> eyre::Result<()> {
        if self.is_paused() {
            return Ok(());
        }

        if self.thread_filter.is_some_and(|id| id != event.thread_id()) {
            return Ok(());
        }

        if !self.formatter.accepts(event.severity()) {
            return Ok(());
        }

        let lines = self.formatter.format(event);
        self.messages.lock().extend(lines);
        Ok(())
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use chrono::Local;

    use super::*;
    use crate::logging::{event::Severity, FormatConfig};

    fn bare(sink: CachedSink) -> CachedSink {
        sink.with_formatter(Box::new(LineFormatter::new(FormatConfig::bare())))
    }

    fn event(message: &str) -> LogEvent {
        LogEvent::new(Severity::Info, message, Local::now())
    }

    #[test]
    fn paused_events_are_dropped_for_good() {
        let sink = bare(CachedSink::new());

        sink.write_log(&event("one")).unwrap();
        sink.pause();
        sink.write_log(&event("two")).unwrap();
        sink.resume();
        sink.write_log(&event("three")).unwrap();

        assert_eq!(sink.messages(), vec!["one", "three"]);
    }

    #[test]
    fn thread_filter_rejects_other_threads() {
        let sink = bare(CachedSink::for_current_thread());
        assert_eq!(sink.thread_filter(), Some(current_thread_id()));

        let foreign = std::thread::spawn(|| event("elsewhere")).join().unwrap();
        sink.write_log(&foreign).unwrap();
        sink.write_log(&event("here")).unwrap();

        assert_eq!(sink.messages(), vec!["here"]);
    }

    #[test]
    fn muted_severity_is_skipped() {
        let mut config = FormatConfig::bare();
        config.mute.set(Severity::Debug, true);
        let sink = CachedSink::new().with_formatter(Box::new(LineFormatter::new(config)));

        sink.write_log(&LogEvent::new(Severity::Debug, "noise", Local::now())).unwrap();
        sink.write_log(&event("signal")).unwrap();

        assert_eq!(sink.messages(), vec!["signal"]);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let sink = bare(CachedSink::new());
        sink.write_log(&event("x")).unwrap();
        assert!(!sink.is_empty());

        sink.clear();
        assert!(sink.is_empty());
        assert_eq!(sink.len(), 0);
    }
}
