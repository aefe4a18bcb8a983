mod config;
mod event;

pub use config::{TaskAction, TaskConfig, TriggerConfig, TriggerKind};
pub use event::TriggerEvent;
