use crate::management::Launcher;
use crate::tasker::scheduler::TaskFired;
use crate::utils::{Event, TListener};
use anyhow::Context;
use log::{info, warn};
use mcsv_protocol::tasker::TaskAction;
use std::sync::Arc;

/// Carries out the actions of fired tasks against the supervised server.
pub struct ActionExecutor {
    launcher: Arc<Launcher>,
}

impl ActionExecutor {
    pub fn new(launcher: Arc<Launcher>) -> Self {
        Self { launcher }
    }

    pub async fn execute(&self, action: &TaskAction) -> anyhow::Result<()> {
        let supervisor = self.launcher.supervisor();
        match action {
            TaskAction::Command(command) => supervisor
                .send_input(command)
                .await
                .with_context(|| format!("failed to send {:?}", command))?,
            TaskAction::Say(text) => supervisor
                .send_input(&format!("say {}", text))
                .await
                .context("failed to broadcast")?,
            TaskAction::Start => {
                self.launcher.start().await.context("failed to start server")?;
            }
            TaskAction::Stop => supervisor.stop(true).await.context("failed to stop server")?,
            TaskAction::Restart => {
                self.launcher
                    .restart()
                    .await
                    .context("failed to restart server")?;
            }
        }
        Ok(())
    }

    /// Runs the actions in order. A failing action is logged and the rest still run.
    pub async fn run(&self, fired: &TaskFired) {
        info!(target: "tasker", "running task {:?} ({})", fired.name, fired.reason);
        for action in &fired.actions {
            if let Err(err) = self.execute(action).await {
                warn!(target: "tasker", "task {:?}: {:#}", fired.name, err);
            }
        }
    }

    /// Executes every task fired on `fired`, one task at a time.
    pub fn attach(self: &Arc<Self>, fired: &Event<TaskFired>) -> Option<u64> {
        let executor = self.clone();
        fired.add_async_listener(
            move |task| {
                let executor = executor.clone();
                async move { executor.run(&task).await }
            },
            TListener::Simple,
        )
    }
}
