pub mod comm;
pub mod error;
pub mod launch;
mod launcher;
pub mod profile;
pub mod status;

pub use launcher::Launcher;
