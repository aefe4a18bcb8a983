use crate::app::AppState;
use crate::drivers::Driver;
use crate::storage::ConfigStore;
use chrono::{DateTime, Local};
use log::{log, Level};
use mcsv_protocol::management::instance::{ConsoleOutput, ServerEvent};
use mcsv_protocol::output::LogSeverity;
use tokio::select;

const CONSOLE_SECTION: &str = "console";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConsolePrefs {
    show_time: bool,
    show_date: bool,
}

impl ConsolePrefs {
    fn from_store(store: &dyn ConfigStore) -> Self {
        Self {
            show_time: store.read_bool(CONSOLE_SECTION, "show_time", true),
            show_date: store.read_bool(CONSOLE_SECTION, "show_date", false),
        }
    }

    fn stamp(&self, now: &DateTime<Local>) -> Option<String> {
        match (self.show_date, self.show_time) {
            (true, true) => Some(now.format("[%Y-%m-%d %H:%M:%S] ").to_string()),
            (true, false) => Some(now.format("[%Y-%m-%d] ").to_string()),
            (false, true) => Some(now.format("[%H:%M:%S] ").to_string()),
            (false, false) => None,
        }
    }
}

fn level(severity: LogSeverity) -> Level {
    match severity {
        LogSeverity::Info | LogSeverity::PlayerAction => Level::Info,
        LogSeverity::Warning => Level::Warn,
        LogSeverity::Severe => Level::Error,
    }
}

fn render(prefs: &ConsolePrefs, output: &ConsoleOutput, now: &DateTime<Local>) -> (Level, String) {
    let stamp = prefs.stamp(now).unwrap_or_default();
    (level(output.line.severity), format!("{}{}", stamp, output.line.message))
}

/// Routes classified server console lines to the log under the `console` target.
pub struct LogSinkDriver {
    app_state: AppState,
}

impl LogSinkDriver {
    pub fn new(app_state: AppState) -> Self {
        Self { app_state }
    }
}

#[async_trait::async_trait]
impl Driver for LogSinkDriver {
    async fn run(&self) {
        let prefs = ConsolePrefs::from_store(self.app_state.store.as_ref());
        let events = self.app_state.supervisor.events();
        let (id, mut rx) = events.subscribe();
        loop {
            let event = select! {
                _ = self.app_state.stop_token.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if let ServerEvent::Output(output) = event {
                if output.line.message.is_empty() {
                    continue;
                }
                let (level, message) = render(&prefs, &output, &Local::now());
                log!(target: "console", level, "{}", message);
            }
        }
        events.remove_listener(id);
    }

    fn name(&self) -> &'static str {
        "log sink"
    }
}
