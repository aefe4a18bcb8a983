mod event;
mod report;
mod status;

pub use event::{ConsoleOutput, ConsoleStream, ServerEvent};
pub use report::InstanceReport;
pub use status::InstanceStatus;
