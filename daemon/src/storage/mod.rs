pub mod file;
mod settings;

pub use settings::{ConfigStore, JsonConfigStore};
