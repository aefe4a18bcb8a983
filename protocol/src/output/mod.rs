mod line;

pub use line::{ClassifiedLine, LogSeverity};
