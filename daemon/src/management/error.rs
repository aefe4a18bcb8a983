use crate::management::launch::LaunchValidation;
use mcsv_protocol::management::instance::InstanceStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("a server process is already supervised")]
    AlreadyRunning,
    #[error("launch validation failed: {0}")]
    Invalid(LaunchValidation),
    #[error("failed to prepare launch: {0:#}")]
    PrepareFailed(anyhow::Error),
    #[error("failed to spawn server process: {0}")]
    SpawnFailed(#[from] std::io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("server process is not running")]
    ProcessNotRunning,
    #[error("server stdin is closed")]
    StdinClosed,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition: {0} -> {1}")]
    InvalidTransition(InstanceStatus, InstanceStatus),
}
