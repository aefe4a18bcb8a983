use anyhow::Context;
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use std::ops::Deref;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, CONFIG_FILE};
use crate::drivers::{ConsoleDriver, GracefulShutdown, LogSinkDriver};
use crate::management::comm::ProcessSupervisor;
use crate::management::error::InputError;
use crate::management::profile::ServerProfiles;
use crate::management::Launcher;
use crate::players::PlayerRoster;
use crate::storage::{ConfigStore, JsonConfigStore};
use crate::tasker::{ActionExecutor, TaskScheduler};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
static START_TIME: LazyLock<DateTime<Local>> = LazyLock::new(Local::now);

pub struct ApplicationState {
    pub stop_token: CancellationToken,
    pub store: Arc<dyn ConfigStore>,
    pub supervisor: Arc<ProcessSupervisor>,
    pub launcher: Arc<Launcher>,
    pub roster: PlayerRoster,
    pub scheduler: TaskScheduler,
}
pub type AppState = Arc<ApplicationState>;

pub fn get_start_time() -> &'static DateTime<Local> {
    START_TIME.deref()
}

async fn init_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn ConfigStore> = Arc::new(
        JsonConfigStore::open(&config.settings_file)
            .with_context(|| format!("failed to open {}", config.settings_file.display()))?,
    );

    let supervisor = Arc::new(ProcessSupervisor::new(config.supervisor.clone()));
    let roster = PlayerRoster::attach(&supervisor.events());
    let launcher = Arc::new(Launcher::new(
        supervisor.clone(),
        ServerProfiles::builtin(),
        store.clone(),
    ));

    let scheduler = TaskScheduler::new(supervisor.events());
    let executor = Arc::new(ActionExecutor::new(launcher.clone()));
    if executor.attach(&scheduler.fired()).is_none() {
        warn!("task executor could not be attached");
    }
    scheduler.load(&config.tasks).await;

    Ok(Arc::new(ApplicationState {
        stop_token: CancellationToken::new(),
        store,
        supervisor,
        launcher,
        roster,
        scheduler,
    }))
}

/// Disables every trigger, then stops the server if one is running.
async fn shutdown(state: &AppState) {
    state.scheduler.shutdown().await;
    match state.supervisor.stop(true).await {
        Ok(()) => info!("server stopped"),
        Err(InputError::ProcessNotRunning) => {}
        Err(err) => warn!("failed to stop server: {}", err),
    }
}

pub async fn run_app() -> anyhow::Result<()> {
    let _ = get_start_time();
    info!("mcsv daemon v{}", VERSION);

    let config = AppConfig::load(Path::new(CONFIG_FILE))?;
    debug!(
        "config loaded: {}",
        serde_json::to_string_pretty(&config).unwrap_or_default()
    );
    let state = init_app_state(&config).await?;

    let mut gs = GracefulShutdown::new();
    gs.add_driver(LogSinkDriver::new(state.clone()));
    gs.add_driver(ConsoleDriver::new(state.clone()));
    gs.watch(state.stop_token.clone()).await;

    shutdown(&state).await;
    info!("Bye.");
    Ok(())
}
