mod action;
mod scheduler;
pub mod trigger;

pub use action::ActionExecutor;
pub use scheduler::TaskScheduler;
