//! Emit macros that fill in the call-site for you.

/// Call-site of the macro invocation: module path, file and line.
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(module_path!(), file!(), line!())
    };
}

/// Call-site line followed by the frames of the current thread.
#[macro_export]
macro_rules! stack_trace {
    () => {
        $crate::stack_trace(&$crate::call_site!())
    };
}

#[macro_export]
macro_rules! emit {
    ($emitter:expr, $severity:expr, $($arg:tt)+) => {{
        $emitter.emit(
            $severity,
            format!($($arg)+),
            None,
            Some($crate::call_site!()),
        )
    }};
}

#[macro_export]
macro_rules! debug {
    ($emitter:expr, $($arg:tt)+) => {
        $crate::emit!($emitter, $crate::Severity::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($emitter:expr, $($arg:tt)+) => {
        $crate::emit!($emitter, $crate::Severity::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! warning {
    ($emitter:expr, $($arg:tt)+) => {
        $crate::emit!($emitter, $crate::Severity::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($emitter:expr, $($arg:tt)+) => {
        $crate::emit!($emitter, $crate::Severity::Error, $($arg)+)
    };
}

/// `exception!(emitter, err, "fmt", args..)`; `err` is anything convertible into
/// an [`ErrorInfo`](crate::ErrorInfo).
#[macro_export]
macro_rules! exception {
    ($emitter:expr, $err:expr, $($arg:tt)+) => {{
        $emitter.emit(
            $crate::Severity::Exception,
            format!($($arg)+),
            Some($crate::ErrorInfo::from($err).or_source(module_path!())),
            Some($crate::call_site!()),
        )
    }};
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{CachedSink, Emitter, FormatConfig, LineFormatter};

    #[test]
    fn macros_capture_this_file() {
        let emitter = Emitter::new();
        let cache = Arc::new(CachedSink::new().with_formatter(Box::new(LineFormatter::new(FormatConfig::bare()))));
        emitter.subscribe(cache.clone());

        crate::debug!(emitter, "step {}", 1);
        crate::info!(emitter, "quiet whence");
        crate::exception!(emitter, eyre::eyre!("root"), "failed after {} tries", 3);

        let lines = cache.messages();
        assert!(lines[0].starts_with("step 1 multilog::logging::macros::tests at "));
        assert!(lines[0].contains("macros.rs:"));
        assert_eq!(lines[1], "quiet whence");
        assert!(lines[2].starts_with("failed after 3 tries"));
        assert_eq!(lines[3], "     Exception : root");
        assert_eq!(lines[5], "        Source : multilog::logging::macros::tests");
    }

    #[test]
    fn stack_trace_starts_with_the_call_site() {
        let trace = crate::stack_trace!();

        let mut lines = trace.lines();
        let site = lines.next().unwrap();
        assert!(site.starts_with("multilog::logging::macros::tests at "));
        assert!(site.contains("macros.rs:"));
        assert!(lines.next().is_some());
    }
}
