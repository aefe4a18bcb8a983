use lazy_static::lazy_static;
use log::trace;
use mcsv_protocol::minecraft::{PlayerAction, PlayerActionKind};
use mcsv_protocol::output::{ClassifiedLine, LogSeverity};
use regex::{Captures, Regex};
use std::net::IpAddr;

lazy_static! {
    static ref ANSI_ESCAPE: Regex =
        Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("Failed to compile ANSI_ESCAPE regex");
    static ref FORMAT_CODE: Regex =
        Regex::new(r"§[0-9a-fk-orA-FK-OR]?").expect("Failed to compile FORMAT_CODE regex");
}

/// One phrase family of player messages.
///
/// `phrase` decides whether a message belongs to the family, `extractors` pull the
/// player out of it (named groups `name` and optionally `ip`).
pub struct PlayerRule {
    kind: PlayerActionKind,
    phrase: Regex,
    extractors: Vec<Regex>,
}

impl PlayerRule {
    pub fn new(
        kind: PlayerActionKind,
        phrase: &str,
        extractors: &[&str],
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            kind,
            phrase: Regex::new(phrase)?,
            extractors: extractors
                .iter()
                .map(|pattern| Regex::new(pattern))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn kind(&self) -> PlayerActionKind {
        self.kind
    }

    fn matches(&self, message: &str) -> bool {
        self.phrase.is_match(message)
    }

    fn extract(&self, message: &str) -> Option<PlayerAction> {
        let caps = self
            .extractors
            .iter()
            .find_map(|extractor| extractor.captures(message))?;
        let name = caps.name("name")?.as_str().trim();
        if name.is_empty() {
            return None;
        }
        Some(build_action(self.kind, name.to_string(), &caps))
    }
}

fn build_action(kind: PlayerActionKind, name: String, caps: &Captures) -> PlayerAction {
    match kind {
        PlayerActionKind::Join => {
            let ip = caps
                .name("ip")
                .and_then(|ip| ip.as_str().trim_matches(['[', ']']).parse::<IpAddr>().ok());
            PlayerAction::Join { name, ip }
        }
        PlayerActionKind::Leave => PlayerAction::Leave { name },
        PlayerActionKind::Kick => PlayerAction::Kick { name },
        PlayerActionKind::Ban => PlayerAction::Ban { name },
        PlayerActionKind::IpBan => PlayerAction::IpBan { name },
    }
}

/// Profile specific classification table.
///
/// `timestamp` matches the leading time/level prefix and may capture a `level` or
/// `inline_level` group. Player rules are tried in order, first phrase match wins.
pub struct OutputRules {
    timestamp: Regex,
    player_rules: Vec<PlayerRule>,
}

impl OutputRules {
    pub fn new(timestamp: &str, player_rules: Vec<PlayerRule>) -> Result<Self, regex::Error> {
        Ok(Self {
            timestamp: Regex::new(timestamp)?,
            player_rules,
        })
    }

    /// Strips the leading timestamp and level, returning the severity they imply and the message.
    pub fn remove_timestamp<'a>(&self, text: &'a str) -> (LogSeverity, &'a str) {
        match self.timestamp.captures(text) {
            Some(caps) => {
                let severity = caps
                    .name("level")
                    .or_else(|| caps.name("inline_level"))
                    .map(|level| LogSeverity::from_level(level.as_str()))
                    .unwrap_or_default();
                let end = caps.get(0).map_or(0, |m| m.end());
                (severity, text[end..].trim())
            }
            None => (LogSeverity::Info, text.trim()),
        }
    }

    /// The first player rule whose phrase family matches `message`.
    pub fn parse_message_type(&self, message: &str) -> Option<&PlayerRule> {
        self.player_rules.iter().find(|rule| rule.matches(message))
    }
}

/// Removes terminal noise: prompt redraws, ANSI escapes, `§` format codes and control characters.
pub fn filter_text(raw: &str) -> String {
    let line = raw.trim_end_matches(['\r', '\n']);
    // jline redraws the prompt with a carriage return, keep what was printed last
    let line = line.rsplit('\r').next().unwrap_or(line);
    let line = ANSI_ESCAPE.replace_all(line, "");
    let line = FORMAT_CODE.replace_all(&line, "");
    let line: String = line
        .chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    let line = line.trim();
    line.strip_prefix('>').unwrap_or(line).trim().to_string()
}

/// Classifies one raw console line. Never fails: anything unrecognised is a log line.
pub fn classify(rules: &OutputRules, raw: &str) -> ClassifiedLine {
    let text = filter_text(raw);
    if text.is_empty() {
        return ClassifiedLine::default();
    }

    let (severity, message) = rules.remove_timestamp(&text);
    let Some(rule) = rules.parse_message_type(message) else {
        return ClassifiedLine::log(severity, message);
    };

    match rule.extract(message) {
        Some(action) => ClassifiedLine::player(action, message),
        None => {
            trace!("{:?} phrase without extractable player: {}", rule.kind(), message);
            ClassifiedLine::log(severity, message)
        }
    }
}
