use std::sync::Arc;

use multilog::{CachedSink, Emitter, FormatConfig, LineFormatter};

// Capture is decided once per process, so this binary holds a single test.
#[test]
fn exception_from_eyre_renders_a_stack() {
    std::env::set_var("RUST_LIB_BACKTRACE", "1");

    let emitter = Emitter::new();
    let cache = Arc::new(CachedSink::new().with_formatter(Box::new(LineFormatter::new(FormatConfig::bare()))));
    emitter.subscribe(cache.clone());

    let report = eyre::eyre!("connection reset").wrap_err("sync failed");
    multilog::exception!(emitter, &report, "giving up");

    let lines = cache.messages();
    let stack = lines
        .iter()
        .find_map(|line| line.trim_start().strip_prefix("Stack :"))
        .unwrap();
    assert!(!stack.trim().is_empty());

    let source = lines
        .iter()
        .find_map(|line| line.trim_start().strip_prefix("Source :"))
        .unwrap();
    assert_eq!(source.trim(), "backtrace");
}
