use crate::output::ClassifiedLine;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

/// One line of server console output, both as written by the process and as classified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsoleOutput {
    pub stream: ConsoleStream,
    pub raw: String,
    pub line: ClassifiedLine,
}

/// Lifecycle and output events of one supervised server process.
///
/// Events of a single process run are emitted in the order they happened:
/// `Starting`, `Started`, any number of `Output`/`Ready`/`Stopping`, then
/// exactly one of `Stopped` or `Crashed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    Starting {
        profile: String,
    },
    Started {
        session: Uuid,
        pid: u32,
        started_at: DateTime<Local>,
    },
    /// The server reported that it finished loading.
    Ready,
    Output(ConsoleOutput),
    Stopping,
    Stopped {
        exit_code: Option<i32>,
    },
    Crashed {
        exit_code: Option<i32>,
    },
    /// Emitted after `Starting` when the process could not be spawned.
    LaunchFailed {
        reason: String,
    },
}

impl ServerEvent {
    /// True for the events that end a process run.
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Stopped { .. } | Self::Crashed { .. })
    }
}
