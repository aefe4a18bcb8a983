use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    /// Address the player connected from, when the server logged it.
    pub ip: Option<IpAddr>,
}

impl Player {
    pub fn new(name: impl Into<String>, ip: Option<IpAddr>) -> Self {
        Self {
            name: name.into(),
            ip,
        }
    }

    pub fn kick_command(&self) -> String {
        format!("kick {}", self.name)
    }

    pub fn ban_command(&self) -> String {
        format!("ban {}", self.name)
    }

    /// Bans the recorded address, or the name when no address is known
    /// (the server resolves online players itself).
    pub fn ban_ip_command(&self) -> String {
        match self.ip {
            Some(ip) => format!("ban-ip {}", ip),
            None => format!("ban-ip {}", self.name),
        }
    }

    pub fn op_command(&self, op: bool) -> String {
        if op {
            format!("op {}", self.name)
        } else {
            format!("deop {}", self.name)
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlayerActionKind {
    Join,
    Leave,
    Kick,
    Ban,
    IpBan,
}

/// A player related console message, extracted from server output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    Join { name: String, ip: Option<IpAddr> },
    Leave { name: String },
    Kick { name: String },
    Ban { name: String },
    /// `name` holds the banned address when the server only logged the address.
    IpBan { name: String },
}

impl PlayerAction {
    pub fn kind(&self) -> PlayerActionKind {
        match self {
            Self::Join { .. } => PlayerActionKind::Join,
            Self::Leave { .. } => PlayerActionKind::Leave,
            Self::Kick { .. } => PlayerActionKind::Kick,
            Self::Ban { .. } => PlayerActionKind::Ban,
            Self::IpBan { .. } => PlayerActionKind::IpBan,
        }
    }
}
