use crate::app::run_app;

mod app;
pub mod config;
mod drivers;
mod management;
mod output;
mod players;
mod storage;
mod tasker;
mod utils;

fn init_logger() {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();
    run_app().await
}
