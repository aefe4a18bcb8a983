use crate::app::{get_start_time, AppState};
use crate::drivers::Driver;
use chrono::Local;
use log::{debug, info, warn};
use mcsv_protocol::minecraft::Player;
use std::io::BufRead;
use tokio::select;
use tokio::sync::mpsc;

const HELP: &str = "#players #status #start #stop #kill #restart #tasks \
    #kick <name> #ban <name> #ban-ip <name> #op <name> #deop <name> #quit";

/// One line typed at the daemon console.
#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand<'a> {
    /// Anything not starting with `#` goes to the server as typed.
    Forward(&'a str),
    Players,
    Status,
    Start,
    Stop,
    Kill,
    Restart,
    Tasks,
    Kick(&'a str),
    Ban(&'a str),
    BanIp(&'a str),
    Op(&'a str),
    Deop(&'a str),
    Quit,
    Help,
    Unknown(&'a str),
}

impl<'a> ConsoleCommand<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('#') else {
            return Some(Self::Forward(line));
        };
        let (verb, arg) = match command.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (command, ""),
        };
        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("players", "") => Self::Players,
            ("status", "") => Self::Status,
            ("start", "") => Self::Start,
            ("stop", "") => Self::Stop,
            ("kill", "") => Self::Kill,
            ("restart", "") => Self::Restart,
            ("tasks", "") => Self::Tasks,
            ("kick", name) if !name.is_empty() => Self::Kick(name),
            ("ban", name) if !name.is_empty() => Self::Ban(name),
            ("ban-ip", name) if !name.is_empty() => Self::BanIp(name),
            ("op", name) if !name.is_empty() => Self::Op(name),
            ("deop", name) if !name.is_empty() => Self::Deop(name),
            ("quit", "") | ("exit", "") => Self::Quit,
            ("help", _) => Self::Help,
            _ => Self::Unknown(line),
        };
        Some(command)
    }
}

/// Reads stdin on a plain thread; tokio's stdin would keep the runtime alive at exit.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("console-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        debug!("stdin read failed: {}", err);
                        break;
                    }
                }
            }
        });
    if let Err(err) = spawned {
        warn!("console input unavailable: {}", err);
    }
    rx
}

/// Interactive daemon console: forwards input to the server and runs `#` commands.
pub struct ConsoleDriver {
    app_state: AppState,
}

impl ConsoleDriver {
    pub fn new(app_state: AppState) -> Self {
        Self { app_state }
    }

    async fn send(&self, command: &str) {
        if let Err(err) = self.app_state.supervisor.send_input(command).await {
            warn!("{}", err);
        }
    }

    fn player(&self, name: &str) -> Player {
        self.app_state
            .roster
            .get(name)
            .unwrap_or_else(|| Player::new(name, None))
    }

    async fn handle(&self, command: ConsoleCommand<'_>) {
        let state = &self.app_state;
        match command {
            ConsoleCommand::Forward(text) => self.send(text).await,
            ConsoleCommand::Players => {
                let players = state.roster.list();
                let names: Vec<_> = players.iter().map(|p| p.name.as_str()).collect();
                info!("{} player(s) online: {}", players.len(), names.join(", "));
            }
            ConsoleCommand::Status => {
                let mut report = state.supervisor.report().await;
                report.players = state.roster.list().to_vec();
                let uptime = Local::now() - *get_start_time();
                info!(
                    "server {} ({}), pid {:?}, exit code {:?}, {} player(s); daemon up {}s",
                    report.status,
                    report.profile,
                    report.pid,
                    report.exit_code,
                    report.players.len(),
                    uptime.num_seconds()
                );
            }
            ConsoleCommand::Start => match state.launcher.start().await {
                Ok(handle) => info!("server started (pid={})", handle.pid),
                Err(err) => warn!("{}", err),
            },
            ConsoleCommand::Stop => {
                if let Err(err) = state.supervisor.stop(true).await {
                    warn!("{}", err);
                }
            }
            ConsoleCommand::Kill => {
                if let Err(err) = state.supervisor.kill().await {
                    warn!("{}", err);
                }
            }
            ConsoleCommand::Restart => match state.launcher.restart().await {
                Ok(handle) => info!("server restarted (pid={})", handle.pid),
                Err(err) => warn!("{}", err),
            },
            ConsoleCommand::Tasks => {
                let tasks = state.scheduler.tasks().await;
                if tasks.is_empty() {
                    info!("no tasks configured");
                }
                for task in tasks {
                    info!(
                        "{} [{}] {}: {} ({}) {:?}",
                        task.id,
                        if task.enabled { "on" } else { "off" },
                        task.name,
                        task.trigger,
                        task.description,
                        task.parameters
                    );
                    info!("    parameters: {}", task.parameter_description);
                }
            }
            ConsoleCommand::Kick(name) => self.send(&self.player(name).kick_command()).await,
            ConsoleCommand::Ban(name) => self.send(&self.player(name).ban_command()).await,
            ConsoleCommand::BanIp(name) => self.send(&self.player(name).ban_ip_command()).await,
            ConsoleCommand::Op(name) => self.send(&self.player(name).op_command(true)).await,
            ConsoleCommand::Deop(name) => self.send(&self.player(name).op_command(false)).await,
            ConsoleCommand::Quit => state.stop_token.cancel(),
            ConsoleCommand::Help => info!("{}", HELP),
            ConsoleCommand::Unknown(line) => warn!("unknown command {:?}, try #help", line),
        }
    }
}

#[async_trait::async_trait]
impl Driver for ConsoleDriver {
    async fn run(&self) {
        let mut lines = spawn_stdin_reader();
        loop {
            let line = select! {
                _ = self.app_state.stop_token.cancelled() => break,
                line = lines.recv() => match line {
                    Some(line) => line,
                    None => {
                        debug!("console input closed");
                        break;
                    }
                },
            };
            if let Some(command) = ConsoleCommand::parse(&line) {
                self.handle(command).await;
            }
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_commands() {
        let cases = [
            ("list", ConsoleCommand::Forward("list")),
            ("  say hi  ", ConsoleCommand::Forward("say hi")),
            ("#players", ConsoleCommand::Players),
            ("#STOP", ConsoleCommand::Stop),
            ("#restart", ConsoleCommand::Restart),
            ("#tasks", ConsoleCommand::Tasks),
            ("#kick Steve", ConsoleCommand::Kick("Steve")),
            ("#ban   Alex ", ConsoleCommand::Ban("Alex")),
            ("#op Notch", ConsoleCommand::Op("Notch")),
            ("#ban-ip Steve", ConsoleCommand::BanIp("Steve")),
            ("#deop Notch", ConsoleCommand::Deop("Notch")),
            ("#exit", ConsoleCommand::Quit),
            ("#help me", ConsoleCommand::Help),
            ("#kick", ConsoleCommand::Unknown("#kick")),
            ("#start now", ConsoleCommand::Unknown("#start now")),
            ("#fly", ConsoleCommand::Unknown("#fly")),
        ];
        for (line, expected) in cases {
            assert_eq!(ConsoleCommand::parse(line), Some(expected), "{line}");
        }
        assert_eq!(ConsoleCommand::parse("   "), None);
    }
}
