use std::io::Write;

use parking_lot::Mutex;
use yansi::{Color, Paint};

use crate::logging::{
    event::{LogEvent, SeverityFlags},
    LogSink,
};

pub struct ConsoleSink {
    writer: Mutex<Box<dyn Write + Send>>,
    colors: SeverityFlags<Color>,
    mute: SeverityFlags<bool>,
    use_ansi: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            colors: SeverityFlags {
                debug: Color::Green,
                info: Color::White,
                warning: Color::Yellow,
                error: Color::Red,
                exception: Color::Magenta,
            },
            mute: SeverityFlags::default(),
            use_ansi: true,
        }
    }

    pub fn with_ansi(self, use_ansi: bool) -> Self {
        Self { use_ansi, ..self }
    }

    pub fn with_mute(self, mute: SeverityFlags<bool>) -> Self {
        Self { mute, ..self }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.use_ansi {
            text.fg(color).to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for ConsoleSink {
    fn write_log(&self, event: &LogEvent) -> eyre::Result<()> {
        if self.mute.get(event.severity()) {
            return Ok(());
        }

        let color = self.colors.get(event.severity());
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", self.paint(event.message(), color))?;

        let mut indent = String::new();
        for error in event.error().into_iter().flat_map(|e| e.chain()) {
            let block = [
                format!("{}EXCEPTION: {}", indent, error.message()),
                format!("{}  SOURCE: {}", indent, error.source().unwrap_or_default()),
                format!("{}  STACK: {}", indent, error.stack().unwrap_or_default()),
            ];
            for line in block {
                writeln!(writer, "{}", self.paint(&line, color))?;
            }
            indent.push_str("    ");
        }

        writer.flush()?;
        Ok(())
    }

    fn flush(&self) {
        let _ = self.writer.lock().flush();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Local;

    use super::*;
    use crate::logging::event::{ErrorInfo, Severity};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    #[test]
    fn plain_output_with_cause_chain() {
        let out = Shared::default();
        let sink = ConsoleSink::with_writer(Box::new(out.clone())).with_ansi(false);

        let event = LogEvent::new(Severity::Exception, "request failed", Local::now()).with_error(Some(
            ErrorInfo::new("timeout").with_source("net").caused_by(ErrorInfo::new("refused")),
        ));
        sink.write_log(&event).unwrap();

        assert_eq!(
            out.text(),
            "request failed\n\
             EXCEPTION: timeout\n  SOURCE: net\n  STACK: \n\
             \x20   EXCEPTION: refused\n      SOURCE: \n      STACK: \n"
        );
    }

    #[test]
    fn muted_severity_is_not_printed() {
        let out = Shared::default();
        let mut mute = SeverityFlags::default();
        mute.set(Severity::Debug, true);
        let sink = ConsoleSink::with_writer(Box::new(out.clone())).with_mute(mute);

        sink.write_log(&LogEvent::new(Severity::Debug, "hidden", Local::now())).unwrap();
        sink.write_log(&LogEvent::new(Severity::Error, "shown", Local::now())).unwrap();

        let text = out.text();
        assert!(!text.contains("hidden"));
        assert!(text.contains("shown"));
    }
}
