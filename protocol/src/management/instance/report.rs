use crate::management::instance::status::InstanceStatus;
use crate::minecraft::Player;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceReport {
    pub profile: String,
    pub status: InstanceStatus,
    pub session: Option<Uuid>,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Local>>,
    pub exit_code: Option<i32>,
    pub players: Vec<Player>,
}
