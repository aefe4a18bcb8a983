use crate::config::SupervisorConfig;
use crate::management::comm::ProcessHelper;
use crate::management::error::{InputError, LaunchError};
use crate::management::launch::LaunchSpec;
use crate::management::profile::{ServerProfile, StatusHint};
use crate::management::status::StatusMachine;
use crate::utils::Event;
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use mcsv_protocol::management::instance::{
    ConsoleOutput, ConsoleStream, InstanceReport, InstanceStatus, ServerEvent,
};
use mcsv_protocol::output::LogSeverity;
use mcsv_protocol::utils::Encoding;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::select;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use uuid::Uuid;

/// How long output is still drained after the process exited; grandchildren may hold the pipes.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Snapshot of the supervised OS process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessHandle {
    pub session: Uuid,
    pub pid: u32,
    pub status: InstanceStatus,
    pub started_at: DateTime<Local>,
    /// Set only once the process reached `Stopped` or `Crashed`.
    pub exit_code: Option<i32>,
}

struct LiveProcess {
    session: Uuid,
    pid: u32,
    started_at: DateTime<Local>,
    stop_command: String,
    input_tx: mpsc::UnboundedSender<String>,
    kill_notify: Arc<Notify>,
    exited: watch::Receiver<bool>,
}

#[derive(Default)]
struct SupervisorState {
    machine: StatusMachine,
    profile: Option<String>,
    process: Option<LiveProcess>,
    last_run: Option<ProcessHandle>,
}

/// Owns at most one server process at a time.
pub struct ProcessSupervisor {
    state: Arc<Mutex<SupervisorState>>,
    events: Arc<Event<ServerEvent>>,
    config: SupervisorConfig,
}

/// What the reader task needs from the run it belongs to.
struct RunContext {
    session: Uuid,
    profile: Arc<dyn ServerProfile>,
    encoding: Encoding,
    state: Arc<Mutex<SupervisorState>>,
    events: Arc<Event<ServerEvent>>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SupervisorState::default())),
            events: Arc::new(Event::new()),
            config,
        }
    }

    /// Lifecycle and output events, in emission order per subscriber.
    pub fn events(&self) -> Arc<Event<ServerEvent>> {
        self.events.clone()
    }

    pub async fn status(&self) -> InstanceStatus {
        self.state.lock().await.machine.status()
    }

    /// The live process, or the last run once it has exited.
    pub async fn handle(&self) -> Option<ProcessHandle> {
        let state = self.state.lock().await;
        let status = state.machine.status();
        match &state.process {
            Some(process) => Some(ProcessHandle {
                session: process.session,
                pid: process.pid,
                status,
                started_at: process.started_at,
                exit_code: None,
            }),
            None => state.last_run.clone(),
        }
    }

    pub async fn report(&self) -> InstanceReport {
        let profile = self.state.lock().await.profile.clone().unwrap_or_default();
        let status = self.status().await;
        let handle = self.handle().await;
        InstanceReport {
            profile,
            status,
            session: handle.as_ref().map(|h| h.session),
            pid: handle.as_ref().map(|h| h.pid),
            started_at: handle.as_ref().map(|h| h.started_at),
            exit_code: handle.and_then(|h| h.exit_code),
            players: vec![],
        }
    }

    pub async fn start(
        &self,
        profile: Arc<dyn ServerProfile>,
        mut spec: LaunchSpec,
    ) -> Result<ProcessHandle, LaunchError> {
        let mut state = self.state.lock().await;
        if state.machine.status().is_active() {
            return Err(LaunchError::AlreadyRunning);
        }

        let validation = profile.validate(&mut spec);
        for warning in validation.warnings() {
            warn!("{}: {}", warning.field, warning.message);
        }
        if !validation.is_ok() {
            return Err(LaunchError::Invalid(validation));
        }

        state.machine.transition(InstanceStatus::Starting).map_err(|err| {
            error!("{}", err);
            LaunchError::AlreadyRunning
        })?;
        state.profile = Some(profile.name().to_string());
        self.events.invoke(ServerEvent::Starting {
            profile: profile.name().to_string(),
        });

        match self.spawn(&mut state, profile, &spec).await {
            Ok(handle) => Ok(handle),
            Err(err) => {
                if let Err(err) = state.machine.transition(InstanceStatus::Idle) {
                    error!("{}", err);
                }
                self.events.invoke(ServerEvent::LaunchFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn spawn(
        &self,
        state: &mut SupervisorState,
        profile: Arc<dyn ServerProfile>,
        spec: &LaunchSpec,
    ) -> Result<ProcessHandle, LaunchError> {
        profile
            .prepare_launch(spec)
            .await
            .map_err(LaunchError::PrepareFailed)?;

        let descriptor = profile.launch_descriptor(spec);
        info!(
            "launching {} server: {} {}",
            profile.name(),
            descriptor.program.display(),
            descriptor.command_line().cloned().collect::<Vec<_>>().join(" ")
        );

        let mut cmd = Command::new(&descriptor.program);
        cmd.args(descriptor.command_line())
            .current_dir(&descriptor.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let pid = child.id().unwrap_or(0);
        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(LaunchError::SpawnFailed(std::io::Error::other(
                "child stdio was not captured",
            )));
        };

        let session = Uuid::new_v4();
        let started_at = Local::now();
        let kill_notify = Arc::new(Notify::new());
        let (exited_tx, exited_rx) = watch::channel(false);
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        if let Err(err) = state.machine.transition(InstanceStatus::Running) {
            error!("{}", err);
        }
        state.process = Some(LiveProcess {
            session,
            pid,
            started_at,
            stop_command: profile.stop_command().to_string(),
            input_tx,
            kill_notify: kill_notify.clone(),
            exited: exited_rx,
        });
        self.events.invoke(ServerEvent::Started {
            session,
            pid,
            started_at,
        });

        tokio::spawn(write_input(stdin, input_rx, spec.input_encoding.clone()));
        let ctx = RunContext {
            session,
            profile,
            encoding: spec.output_encoding.clone(),
            state: self.state.clone(),
            events: self.events.clone(),
        };
        tokio::spawn(supervise(ctx, child, stdout, stderr, kill_notify, exited_tx));

        Ok(ProcessHandle {
            session,
            pid,
            status: InstanceStatus::Running,
            started_at,
            exit_code: None,
        })
    }

    /// Writes one line to the server's stdin.
    pub async fn send_input(&self, text: &str) -> Result<(), InputError> {
        let state = self.state.lock().await;
        match (&state.process, state.machine.status()) {
            (Some(process), InstanceStatus::Running) => process
                .input_tx
                .send(text.trim_end_matches(['\r', '\n']).to_string())
                .map_err(|_| InputError::StdinClosed),
            _ => Err(InputError::ProcessNotRunning),
        }
    }

    /// Stops the server and waits until its exit has been reported.
    ///
    /// Graceful: stop command, then SIGTERM, then kill, each after its timeout.
    pub async fn stop(&self, graceful: bool) -> Result<(), InputError> {
        let (pid, stop_command, input_tx, kill_notify, mut exited) = {
            let mut state = self.state.lock().await;
            let Some(process) = &state.process else {
                return Err(InputError::ProcessNotRunning);
            };
            let snapshot = (
                process.pid,
                process.stop_command.clone(),
                process.input_tx.clone(),
                process.kill_notify.clone(),
                process.exited.clone(),
            );
            if state.machine.status() == InstanceStatus::Running {
                if let Err(err) = state.machine.transition(InstanceStatus::Stopping) {
                    error!("{}", err);
                }
                self.events.invoke(ServerEvent::Stopping);
            }
            snapshot
        };

        if graceful {
            if input_tx.send(stop_command).is_ok()
                && tokio::time::timeout(self.config.stop_timeout(), wait_exit(&mut exited))
                    .await
                    .is_ok()
            {
                return Ok(());
            }
            warn!("server (pid={}) did not stop in time, terminating", pid);
            if let Err(err) = ProcessHelper::stop(pid) {
                warn!("could not terminate process (pid={}): {}", pid, err);
            }
            if tokio::time::timeout(self.config.kill_timeout(), wait_exit(&mut exited))
                .await
                .is_ok()
            {
                return Ok(());
            }
            warn!("server (pid={}) ignored termination, killing", pid);
        }

        kill_notify.notify_one();
        wait_exit(&mut exited).await;
        Ok(())
    }

    pub async fn kill(&self) -> Result<(), InputError> {
        self.stop(false).await
    }
}

async fn wait_exit(exited: &mut watch::Receiver<bool>) {
    while !*exited.borrow_and_update() {
        if exited.changed().await.is_err() {
            break;
        }
    }
}

async fn write_input(
    mut stdin: ChildStdin,
    mut input_rx: mpsc::UnboundedReceiver<String>,
    encoding: Encoding,
) {
    while let Some(line) = input_rx.recv().await {
        let mut bytes = encoding.encode(&line);
        bytes.extend_from_slice(encoding.newline());
        if let Err(err) = stdin.write_all(&bytes).await {
            debug!("server stdin closed: {}", err);
            break;
        }
        if let Err(err) = stdin.flush().await {
            debug!("server stdin closed: {}", err);
            break;
        }
    }
}

/// Next complete line in the stream's encoding; a trailing partial line is returned at EOF.
///
/// Read bytes are moved into `buf` before the next await, so the future can be dropped by
/// `select!` without losing output.
async fn next_line<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    buf: &mut Vec<u8>,
    encoding: &Encoding,
) -> Option<Vec<u8>> {
    loop {
        if let Some(line) = encoding.take_line(buf) {
            return Some(line);
        }
        let chunk = match reader.fill_buf().await {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!("server output read failed: {}", err);
                &[]
            }
        };
        if chunk.is_empty() {
            return (!buf.is_empty()).then(|| std::mem::take(buf));
        }
        let n = chunk.len();
        buf.extend_from_slice(chunk);
        reader.consume(n);
    }
}

async fn supervise(
    ctx: RunContext,
    mut child: Child,
    stdout: impl AsyncRead + Unpin,
    stderr: impl AsyncRead + Unpin,
    kill_notify: Arc<Notify>,
    exited_tx: watch::Sender<bool>,
) {
    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
    let (mut out_open, mut err_open) = (true, true);
    let mut exit_code: Option<Option<i32>> = None;

    loop {
        if !out_open && !err_open && exit_code.is_some() {
            break;
        }
        select! {
            line = next_line(&mut stdout, &mut out_buf, &ctx.encoding), if out_open => {
                match line {
                    Some(line) => ctx.handle_line(ConsoleStream::Stdout, &line).await,
                    None => out_open = false,
                }
            }
            line = next_line(&mut stderr, &mut err_buf, &ctx.encoding), if err_open => {
                match line {
                    Some(line) => ctx.handle_line(ConsoleStream::Stderr, &line).await,
                    None => err_open = false,
                }
            }
            result = child.wait(), if exit_code.is_none() => {
                exit_code = Some(match result {
                    Ok(status) => status.code(),
                    Err(err) => {
                        error!("failed to wait for server process: {}", err);
                        None
                    }
                });
            }
            _ = kill_notify.notified(), if exit_code.is_none() => {
                if let Err(err) = child.start_kill() {
                    warn!("Could not kill process (pid={:?}): {}", child.id(), err);
                }
            }
            _ = tokio::time::sleep(DRAIN_GRACE), if exit_code.is_some() => break,
            else => break,
        }
    }

    let exit_code = match exit_code {
        Some(code) => code,
        None => child.wait().await.ok().and_then(|status| status.code()),
    };
    ctx.on_exit(exit_code).await;
    let _ = exited_tx.send(true);
}

impl RunContext {
    async fn handle_line(&self, stream: ConsoleStream, bytes: &[u8]) {
        let raw = self.encoding.decode(bytes);
        let raw = raw.trim_end_matches(['\r', '\n']).to_string();
        let mut line = self.profile.classify(&raw);
        if stream == ConsoleStream::Stderr && line.severity == LogSeverity::Info {
            line.severity = LogSeverity::Warning;
        }
        let hint = self.profile.status_hint(&line.message);

        self.events
            .invoke(ServerEvent::Output(ConsoleOutput { stream, raw, line }));

        match hint {
            Some(StatusHint::Ready) => {
                info!("server is ready");
                self.events.invoke(ServerEvent::Ready);
            }
            Some(StatusHint::Stopping) => {
                let mut state = self.state.lock().await;
                let current = state.process.as_ref().map(|p| p.session);
                if current == Some(self.session)
                    && state.machine.status() == InstanceStatus::Running
                    && state.machine.transition(InstanceStatus::Stopping).is_ok()
                {
                    self.events.invoke(ServerEvent::Stopping);
                }
            }
            None => {}
        }
    }

    async fn on_exit(&self, exit_code: Option<i32>) {
        let mut state = self.state.lock().await;
        let Some(process) = state.process.take() else {
            return;
        };
        let (status, event) = match state.machine.status() {
            InstanceStatus::Stopping => {
                (InstanceStatus::Stopped, ServerEvent::Stopped { exit_code })
            }
            _ => (InstanceStatus::Crashed, ServerEvent::Crashed { exit_code }),
        };
        if let Err(err) = state.machine.transition(status) {
            error!("{}", err);
        }
        match status {
            InstanceStatus::Stopped => info!("server stopped (exit code {:?})", exit_code),
            _ => warn!("server crashed (exit code {:?})", exit_code),
        }
        state.last_run = Some(ProcessHandle {
            session: process.session,
            pid: process.pid,
            status,
            started_at: process.started_at,
            exit_code,
        });
        self.events.invoke(event);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::management::profile::{JavaProfile, ScriptProfile};
    use pretty_assertions::assert_eq;

    fn supervisor() -> ProcessSupervisor {
        ProcessSupervisor::new(SupervisorConfig {
            stop_timeout_secs: 2,
            kill_timeout_secs: 2,
        })
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed")
    }

    async fn wait_for_exit(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
        loop {
            let event = next_event(rx).await;
            if event.is_exit() {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn start_while_running_is_rejected() {
        let supervisor = supervisor();
        let handle = supervisor
            .start(ScriptProfile::new("read line"), LaunchSpec::default())
            .await
            .unwrap();
        assert_eq!(handle.status, InstanceStatus::Running);
        assert_eq!(supervisor.status().await, InstanceStatus::Running);

        let second = supervisor
            .start(ScriptProfile::new("read line"), LaunchSpec::default())
            .await;
        assert!(matches!(second, Err(LaunchError::AlreadyRunning)));
        assert_eq!(supervisor.handle().await.map(|h| h.pid), Some(handle.pid));

        supervisor.kill().await.unwrap();
    }

    #[tokio::test]
    async fn output_is_delivered_in_order() {
        let supervisor = supervisor();
        let (_, mut rx) = supervisor.events().subscribe();
        supervisor
            .start(
                ScriptProfile::new("for i in 1 2 3 4 5; do echo \"line $i\"; done; echo oops >&2"),
                LaunchSpec::default(),
            )
            .await
            .unwrap();

        assert!(matches!(next_event(&mut rx).await, ServerEvent::Starting { .. }));
        assert!(matches!(next_event(&mut rx).await, ServerEvent::Started { .. }));

        let mut stdout = vec![];
        let mut stderr = vec![];
        let exit = loop {
            match next_event(&mut rx).await {
                ServerEvent::Output(output) if output.stream == ConsoleStream::Stdout => {
                    stdout.push(output.raw)
                }
                ServerEvent::Output(output) => stderr.push(output.line),
                event if event.is_exit() => break event,
                _ => {}
            }
        };
        assert_eq!(stdout, vec!["line 1", "line 2", "line 3", "line 4", "line 5"]);
        assert_eq!(stderr.len(), 1);
        assert_eq!(stderr[0].severity, LogSeverity::Warning);
        // exited on its own without a stop request
        assert_eq!(exit, ServerEvent::Crashed { exit_code: Some(0) });
        assert_eq!(supervisor.status().await, InstanceStatus::Crashed);
    }

    #[tokio::test]
    async fn utf16_output_is_split_on_encoded_newlines() {
        let supervisor = supervisor();
        let (_, mut rx) = supervisor.events().subscribe();
        let spec = LaunchSpec {
            output_encoding: Encoding::UTF16LE,
            ..LaunchSpec::default()
        };
        // second line starts with U+010A, whose low byte is 0x0A
        let script = r"printf 'h\000i\000\r\000\n\000\n\001o\000k\000\n\000'";
        supervisor.start(ScriptProfile::new(script), spec).await.unwrap();

        let mut stdout = vec![];
        loop {
            match next_event(&mut rx).await {
                ServerEvent::Output(output) => stdout.push(output.raw),
                event if event.is_exit() => break,
                _ => {}
            }
        }
        assert_eq!(stdout, vec!["hi", "\u{010A}ok"]);
    }

    #[tokio::test]
    async fn crash_reports_exit_code() {
        let supervisor = supervisor();
        let (_, mut rx) = supervisor.events().subscribe();
        supervisor
            .start(ScriptProfile::new("echo boom; exit 3"), LaunchSpec::default())
            .await
            .unwrap();
        assert_eq!(wait_for_exit(&mut rx).await, ServerEvent::Crashed { exit_code: Some(3) });
        let handle = supervisor.handle().await.unwrap();
        assert_eq!(handle.status, InstanceStatus::Crashed);
        assert_eq!(handle.exit_code, Some(3));
        assert_eq!(
            supervisor.send_input("list").await,
            Err(InputError::ProcessNotRunning)
        );

        // a crashed server may be started again
        supervisor
            .start(ScriptProfile::new("read line"), LaunchSpec::default())
            .await
            .unwrap();
        supervisor.kill().await.unwrap();
    }

    #[tokio::test]
    async fn graceful_stop_sends_stop_command() {
        let supervisor = supervisor();
        let (_, mut rx) = supervisor.events().subscribe();
        let script = r#"
            echo 'Done (1.234s)! For help, type "help"'
            while read line; do
                if [ "$line" = "stop" ]; then echo "Stopping the server"; exit 0; fi
                echo "got $line"
            done
        "#;
        supervisor
            .start(ScriptProfile::new(script), LaunchSpec::default())
            .await
            .unwrap();
        loop {
            if next_event(&mut rx).await == ServerEvent::Ready {
                break;
            }
        }

        supervisor.send_input("list\n").await.unwrap();
        loop {
            if let ServerEvent::Output(output) = next_event(&mut rx).await {
                if output.raw == "got list" {
                    break;
                }
            }
        }

        supervisor.stop(true).await.unwrap();
        assert_eq!(next_event(&mut rx).await, ServerEvent::Stopping);
        assert_eq!(wait_for_exit(&mut rx).await, ServerEvent::Stopped { exit_code: Some(0) });
        assert_eq!(supervisor.status().await, InstanceStatus::Stopped);
        assert_eq!(supervisor.stop(true).await, Err(InputError::ProcessNotRunning));
    }

    #[tokio::test]
    async fn console_stop_is_not_a_crash() {
        let supervisor = supervisor();
        let (_, mut rx) = supervisor.events().subscribe();
        let script = "read line; echo '[12:00:00] [Server thread/INFO]: Stopping the server'";
        supervisor
            .start(ScriptProfile::new(script), LaunchSpec::default())
            .await
            .unwrap();
        supervisor.send_input("stop").await.unwrap();
        assert_eq!(wait_for_exit(&mut rx).await, ServerEvent::Stopped { exit_code: Some(0) });
    }

    #[tokio::test]
    async fn stubborn_process_is_terminated() {
        let supervisor = ProcessSupervisor::new(SupervisorConfig {
            stop_timeout_secs: 1,
            kill_timeout_secs: 1,
        });
        let (_, mut rx) = supervisor.events().subscribe();
        supervisor
            .start(
                ScriptProfile::new("trap '' TERM; while read line; do :; done"),
                LaunchSpec::default(),
            )
            .await
            .unwrap();
        supervisor.stop(true).await.unwrap();
        assert!(matches!(
            wait_for_exit(&mut rx).await,
            ServerEvent::Stopped { .. }
        ));
    }

    #[tokio::test]
    async fn kill_stops_immediately() {
        let supervisor = supervisor();
        let (_, mut rx) = supervisor.events().subscribe();
        supervisor
            .start(ScriptProfile::new("trap '' TERM; read line"), LaunchSpec::default())
            .await
            .unwrap();
        supervisor.kill().await.unwrap();
        assert_eq!(wait_for_exit(&mut rx).await, ServerEvent::Stopped { exit_code: None });
    }

    #[tokio::test]
    async fn spawn_failure_leaves_no_process() {
        let supervisor = supervisor();
        let (_, mut rx) = supervisor.events().subscribe();
        let spec = LaunchSpec {
            working_dir: "/definitely/not/a/dir".into(),
            ..Default::default()
        };
        let result = supervisor.start(ScriptProfile::new("exit 0"), spec).await;
        assert!(matches!(result, Err(LaunchError::SpawnFailed(_))));
        assert_eq!(supervisor.status().await, InstanceStatus::Idle);
        assert!(supervisor.handle().await.is_none());

        assert!(matches!(next_event(&mut rx).await, ServerEvent::Starting { .. }));
        assert!(matches!(next_event(&mut rx).await, ServerEvent::LaunchFailed { .. }));
    }

    #[tokio::test]
    async fn prepare_failure_aborts_launch() {
        let supervisor = supervisor();
        let profile = ScriptProfile::failing_prepare("exit 0");
        let result = supervisor.start(profile, LaunchSpec::default()).await;
        assert!(matches!(result, Err(LaunchError::PrepareFailed(_))));
        assert_eq!(supervisor.status().await, InstanceStatus::Idle);
    }

    #[tokio::test]
    async fn invalid_launch_is_rejected_before_spawn() {
        let supervisor = supervisor();
        let (_, mut rx) = supervisor.events().subscribe();
        let dir = tempfile::tempdir().unwrap();
        let spec = LaunchSpec {
            working_dir: dir.path().to_path_buf(),
            jar_file: "missing.jar".into(),
            ..Default::default()
        };
        let result = supervisor.start(Arc::new(JavaProfile::vanilla()), spec).await;
        assert!(matches!(result, Err(LaunchError::Invalid(_))));
        assert_eq!(supervisor.status().await, InstanceStatus::Idle);
        assert!(rx.try_recv().is_err());
    }
}
