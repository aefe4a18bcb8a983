use crate::minecraft::PlayerAction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    #[default]
    Info,
    Warning,
    Severe,
    PlayerAction,
}

impl LogSeverity {
    /// Maps a console log level token (`INFO`, `WARN`, ...) to a severity.
    /// Unknown tokens are `Info`.
    pub fn from_level(level: &str) -> Self {
        match level.to_ascii_uppercase().as_str() {
            "WARN" | "WARNING" => Self::Warning,
            "SEVERE" | "ERROR" | "FATAL" => Self::Severe,
            _ => Self::Info,
        }
    }
}

/// Result of classifying one console line.
///
/// `severity` is `PlayerAction` exactly when `action` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub severity: LogSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<PlayerAction>,
}

impl ClassifiedLine {
    pub fn log(severity: LogSeverity, message: impl Into<String>) -> Self {
        debug_assert!(severity != LogSeverity::PlayerAction);
        Self {
            severity,
            message: message.into(),
            action: None,
        }
    }

    pub fn player(action: PlayerAction, message: impl Into<String>) -> Self {
        Self {
            severity: LogSeverity::PlayerAction,
            message: message.into(),
            action: Some(action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_mapping() {
        assert_eq!(LogSeverity::from_level("INFO"), LogSeverity::Info);
        assert_eq!(LogSeverity::from_level("warn"), LogSeverity::Warning);
        assert_eq!(LogSeverity::from_level("WARNING"), LogSeverity::Warning);
        assert_eq!(LogSeverity::from_level("SEVERE"), LogSeverity::Severe);
        assert_eq!(LogSeverity::from_level("ERROR"), LogSeverity::Severe);
        assert_eq!(LogSeverity::from_level("TRACE"), LogSeverity::Info);
        assert_eq!(LogSeverity::from_level(""), LogSeverity::Info);
    }

    #[test]
    fn empty_line_is_info() {
        let line = ClassifiedLine::default();
        assert_eq!(line.severity, LogSeverity::Info);
        assert!(line.message.is_empty());
        assert!(line.action.is_none());
    }
}
