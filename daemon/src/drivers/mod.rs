mod console;
mod driver;
mod graceful_shutdown;
mod log_sink;

pub use console::ConsoleDriver;
pub use driver::Driver;
pub use graceful_shutdown::GracefulShutdown;
pub use log_sink::LogSinkDriver;
