use crate::tasker::trigger::{create_trigger, Trigger, TriggerConfigError};
use crate::utils::{Event, TListener};
use log::{info, warn};
use mcsv_protocol::management::instance::ServerEvent;
use mcsv_protocol::tasker::{TaskAction, TaskConfig, TriggerEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A task whose trigger fired; handed to whoever executes the actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFired {
    pub task: Uuid,
    pub name: String,
    pub reason: String,
    pub actions: Vec<TaskAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: Uuid,
    pub name: String,
    pub trigger: &'static str,
    /// What the trigger reacts to.
    pub description: &'static str,
    pub parameters: String,
    /// Accepted parameter format.
    pub parameter_description: &'static str,
    pub enabled: bool,
}

struct ScheduledTask {
    config: TaskConfig,
    trigger: Arc<dyn Trigger>,
    listener: Option<u64>,
}

/// Holds the configured tasks and forwards their trigger firings as [`TaskFired`].
///
/// The scheduler only sees the [`Trigger`] interface, never a concrete trigger kind.
pub struct TaskScheduler {
    tasks: Mutex<Vec<ScheduledTask>>,
    fired: Arc<Event<TaskFired>>,
    server_events: Arc<Event<ServerEvent>>,
}

impl TaskScheduler {
    pub fn new(server_events: Arc<Event<ServerEvent>>) -> Self {
        Self {
            tasks: Mutex::new(vec![]),
            fired: Arc::new(Event::new()),
            server_events,
        }
    }

    pub fn fired(&self) -> Arc<Event<TaskFired>> {
        self.fired.clone()
    }

    /// Adds every valid task; invalid ones are logged and skipped.
    pub async fn load(&self, configs: &[TaskConfig]) {
        for config in configs {
            if let Err(err) = self.add_task(config.clone()).await {
                warn!(target: "tasker", "skipping task {:?}: {}", config.name, err);
            }
        }
    }

    pub async fn add_task(&self, config: TaskConfig) -> Result<Uuid, TriggerConfigError> {
        let trigger = create_trigger(&config.trigger, self.server_events.clone())?;

        let fired = self.fired.clone();
        let (task, name, actions) = (config.id, config.name.clone(), config.actions.clone());
        let listener = trigger.events().add_sync_listener(
            move |event| {
                if let TriggerEvent::Fired { reason } = event {
                    fired.invoke(TaskFired {
                        task,
                        name: name.clone(),
                        reason,
                        actions: actions.clone(),
                    });
                }
            },
            TListener::Simple,
        );
        if listener.is_none() {
            warn!(target: "tasker", "task {:?} has no runtime to deliver firings", config.name);
        }

        if config.enabled {
            trigger.enable();
        }
        info!(
            target: "tasker",
            "task {:?} scheduled ({} {}){}",
            config.name,
            trigger.name(),
            trigger.parameters(),
            if config.enabled { "" } else { ", disabled" }
        );

        let id = config.id;
        self.tasks.lock().await.push(ScheduledTask {
            config,
            trigger,
            listener,
        });
        Ok(id)
    }

    pub async fn remove_task(&self, id: Uuid) -> bool {
        let task = {
            let mut tasks = self.tasks.lock().await;
            match tasks.iter().position(|task| task.config.id == id) {
                Some(pos) => tasks.remove(pos),
                None => return false,
            }
        };
        task.trigger.disable().await;
        if let Some(listener) = task.listener {
            task.trigger.events().remove_listener(listener);
        }
        true
    }

    /// Enables or disables a task's trigger; `false` when no such task exists.
    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> bool {
        let mut tasks = self.tasks.lock().await;
        let Some(task) = tasks.iter_mut().find(|task| task.config.id == id) else {
            return false;
        };
        task.config.enabled = enabled;
        if enabled {
            task.trigger.enable();
        } else {
            task.trigger.disable().await;
        }
        true
    }

    pub async fn tasks(&self) -> Vec<TaskSummary> {
        self.tasks
            .lock()
            .await
            .iter()
            .map(|task| TaskSummary {
                id: task.config.id,
                name: task.config.name.clone(),
                trigger: task.trigger.name(),
                description: task.trigger.description(),
                parameters: task.trigger.parameters(),
                parameter_description: task.trigger.parameter_description(),
                enabled: task.trigger.enabled(),
            })
            .collect()
    }

    /// Disables every trigger; no task fires after this returns.
    pub async fn shutdown(&self) {
        let tasks = self.tasks.lock().await;
        for task in tasks.iter() {
            task.trigger.disable().await;
        }
    }
}
