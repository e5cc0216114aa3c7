mod cached;
mod console;
mod file;

pub use cached::CachedSink;
pub use console::ConsoleSink;
pub use file::{FileSink, RolloverPolicy};
