use mcsv_protocol::tasker::TaskConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::file::{Config, FileIoWithBackup};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Wait after the stop command before terminating the server.
    pub stop_timeout_secs: u64,
    /// Wait after terminating before killing it.
    pub kill_timeout_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: 10,
            kill_timeout_secs: 5,
        }
    }
}

impl SupervisorConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_secs(self.kill_timeout_secs)
    }
}

/// immutable through full lifetime of app, unless restart app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Section/key settings store (launch settings, console preferences).
    pub settings_file: PathBuf,
    pub supervisor: SupervisorConfig,
    pub tasks: Vec<TaskConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings_file: PathBuf::from("settings.json"),
            supervisor: SupervisorConfig::default(),
            tasks: vec![],
        }
    }
}

impl FileIoWithBackup for AppConfig {}

impl Config for AppConfig {
    type ConfigType = AppConfig;
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
        Self::load_config_or_default(path, Self::default)
    }
}
