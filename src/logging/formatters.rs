use super::{
    event::{LogEvent, Severity, SeverityFlags},
    LogFormatter,
};

const INDENT_STEP: &str = "     ";

#[derive(Debug, Clone)]
pub struct FormatConfig {
    pub show_timestamp: bool,
    pub show_level: bool,
    pub show_thread: bool,
    pub datetime_format: String,
    pub mute: SeverityFlags<bool>,
    pub show_whence: SeverityFlags<bool>,
}

impl FormatConfig {
    pub fn new() -> Self {
        Self {
            show_timestamp: true,
            show_level: true,
            show_thread: true,
            datetime_format: "%Y%m%d.%H%M%S%.3f".to_string(),
            mute: SeverityFlags::all(false),
            show_whence: SeverityFlags::default_whence(),
        }
    }

    /// Only the message and whence; handy when lines are compared verbatim.
    pub fn bare() -> Self {
        Self {
            show_timestamp: false,
            show_level: false,
            show_thread: false,
            ..Self::new()
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders `<timestamp> [<level>] [Thd:<id>/<name>] <message> <whence>`.
pub struct LineFormatter {
    config: FormatConfig,
}

impl LineFormatter {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    fn timestamp(&self, event: &LogEvent) -> String {
        if !self.config.show_timestamp {
            return String::new();
        }

        format!("{} ", event.timestamp().format(&self.config.datetime_format))
    }

    fn level(&self, severity: Severity) -> String {
        if !self.config.show_level {
            return String::new();
        }

        format!("[{}] ", severity.tag())
    }

    fn thread(&self, event: &LogEvent) -> String {
        if !self.config.show_thread {
            return String::new();
        }

        match event.thread_name().filter(|name| !name.is_empty()) {
            Some(name) => format!("[Thd:{}/{}] ", event.thread_id(), name),
            None => format!("[Thd:{}] ", event.thread_id()),
        }
    }

    fn whence(&self, event: &LogEvent) -> String {
        if !self.config.show_whence.get(event.severity()) {
            return String::new();
        }

        event
            .call_site()
            .map(|site| site.to_string())
            .unwrap_or_default()
    }
}

impl Default for LineFormatter {
    fn default() -> Self {
        Self::new(FormatConfig::new())
    }
}

impl LogFormatter for LineFormatter {
    fn accepts(&self, severity: Severity) -> bool {
        !self.config.mute.get(severity)
    }

    fn format(&self, event: &LogEvent) -> Vec<String> {
        let prefix = format!(
            "{}{}{}",
            self.timestamp(event),
            self.level(event.severity()),
            self.thread(event),
        );

        let mut lines = vec![format!("{}{} {}", prefix, event.message(), self.whence(event))
            .trim_end()
            .to_string()];

        if event.severity() != Severity::Exception {
            return lines;
        }

        let mut indent = String::from(INDENT_STEP);
        for error in event.error().into_iter().flat_map(|e| e.chain()) {
            let block = [
                format!("Exception : {}", error.message()),
                format!("    Stack : {}", error.stack().unwrap_or_default()),
                format!("   Source : {}", error.source().unwrap_or_default()),
            ];
            for text in block {
                lines.push(format!("{}{}{}", prefix, indent, text).trim_end().to_string());
            }
            indent.push_str(INDENT_STEP);
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;
    use crate::logging::event::{CallSite, ErrorInfo};

    fn event(severity: Severity, message: &str) -> LogEvent {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).single().unwrap();
        LogEvent::new(severity, message, at)
            .with_call_site(Some(CallSite::new("app::run", "src/app.rs", 7)))
    }

    #[test]
    fn full_line_layout() {
        let formatter = LineFormatter::default();
        let ev = event(Severity::Debug, "starting");
        let lines = formatter.format(&ev);

        assert_eq!(
            lines,
            vec![format!(
                "20240501.130405.000 [D] [Thd:{}{}] starting app::run at src/app.rs:7",
                ev.thread_id(),
                ev.thread_name().map(|n| format!("/{n}")).unwrap_or_default(),
            )]
        );
    }

    #[test]
    fn info_hides_whence_and_trims() {
        let formatter = LineFormatter::new(FormatConfig::bare());
        assert_eq!(formatter.format(&event(Severity::Info, "ready")), vec!["ready"]);
        assert_eq!(formatter.format(&event(Severity::Error, "")), vec![" app::run at src/app.rs:7"]);
    }

    #[test]
    fn mute_table_drives_accepts() {
        let mut config = FormatConfig::new();
        config.mute.set(Severity::Warning, true);
        let formatter = LineFormatter::new(config);

        assert!(!formatter.accepts(Severity::Warning));
        assert!(formatter.accepts(Severity::Error));
    }

    #[test]
    fn exception_blocks_indent_by_depth() {
        let chain = ErrorInfo::new("OUTER")
            .with_source("demo")
            .caused_by(ErrorInfo::new("Inner1").caused_by(ErrorInfo::new("Inner2").with_stack("at main")));
        let ev = event(Severity::Exception, "boom").with_error(Some(chain));

        let lines = LineFormatter::new(FormatConfig::bare()).format(&ev);
        assert_eq!(lines.len(), 1 + 3 * 3);

        let blocks: Vec<&String> = lines.iter().filter(|l| l.contains("Exception :")).collect();
        assert_eq!(blocks.len(), 3);

        let indents: Vec<usize> = blocks.iter().map(|l| l.len() - l.trim_start().len()).collect();
        assert_eq!(indents, vec![5, 10, 15]);

        assert!(blocks[0].ends_with("Exception : OUTER"));
        assert!(blocks[1].ends_with("Exception : Inner1"));
        assert!(blocks[2].ends_with("Exception : Inner2"));
        assert_eq!(lines[3], "        Source : demo");
        assert_eq!(lines[8], "                   Stack : at main");
    }

    #[test]
    fn non_exception_ignores_error() {
        let ev = event(Severity::Error, "failed").with_error(Some(ErrorInfo::new("cause")));
        assert_eq!(LineFormatter::new(FormatConfig::bare()).format(&ev).len(), 1);
    }
}
