pub mod reporter;

pub use reporter::{FileLogger, MemoryReporter, NoOpReporter, Reporter};
