pub mod management;
pub mod minecraft;
pub mod output;
pub mod tasker;
pub mod utils;
