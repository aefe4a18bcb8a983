mod process;
mod process_helper;

pub use process::{ProcessHandle, ProcessSupervisor};
pub use process_helper::ProcessHelper;
