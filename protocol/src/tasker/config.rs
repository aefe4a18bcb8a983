use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fires at wall-clock times of day (`HH:MM:SS;HH:MM:SS`).
    CurrentTime,
    /// Fires on server lifecycle events (`started;ready;stopped;crashed`).
    ServerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerConfig {
    pub kind: TriggerKind,
    pub parameters: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    /// Raw console command, sent to the server as typed.
    Command(String),
    /// Broadcast to all players (`say <text>`).
    Say(String),
    Start,
    Stop,
    Restart,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskConfig {
    #[serde(default = "uuid::Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub trigger: TriggerConfig,
    pub actions: Vec<TaskAction>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TASK_TEXT: &str = r#"{
        "name": "nightly restart",
        "trigger": { "kind": "current_time", "parameters": "04:00:00;" },
        "actions": [
            { "say": "Restarting in a moment" },
            { "command": "save-all" },
            "restart"
        ]
    }"#;

    #[test]
    fn task_config_deserialize_test() {
        let task: TaskConfig = serde_json::from_str(TASK_TEXT).unwrap();
        assert_eq!(task.name, "nightly restart");
        assert_eq!(
            task.trigger,
            TriggerConfig {
                kind: TriggerKind::CurrentTime,
                parameters: "04:00:00;".into(),
            }
        );
        assert_eq!(
            task.actions,
            vec![
                TaskAction::Say("Restarting in a moment".into()),
                TaskAction::Command("save-all".into()),
                TaskAction::Restart,
            ]
        );
        assert!(task.enabled);
    }
}
