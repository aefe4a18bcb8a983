use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TriggerEvent {
    Enabled,
    Disabled,
    /// `reason` names the condition that held, e.g. the target time.
    Fired { reason: String },
}
