use crate::output::classifier::{OutputRules, PlayerRule};
use lazy_static::lazy_static;
use mcsv_protocol::minecraft::PlayerActionKind;

const LEVELS: &str = "INFO|WARN|WARNING|ERROR|SEVERE|FATAL|DEBUG|TRACE";

lazy_static! {
    /// Vanilla and Bukkit style output.
    ///
    /// Kick and ban phrases only match the fixed text around the player name, so a name like
    /// `Kicker` or `ShipBandit` never selects them. Kick is tried before ban so that
    /// `Kicked Steve: You are banned` still removes Steve.
    ///
    /// Prefixes: `[12:00:00] [Server thread/INFO]:`, `[12:00:00 INFO]:`,
    /// `2012-01-01 12:00:00 [INFO]`.
    pub static ref JAVA_RULES: OutputRules = OutputRules::new(
        &format!(
            r"^(?:(?:\d{{4}}-\d{{2}}-\d{{2}}\s+)?\[?\d{{2}}:\d{{2}}:\d{{2}}(?:[.,:]\d{{3}})?(?:\s+(?P<inline_level>{LEVELS}))?\]?:?\s*)?(?:\[(?:[^\]]*/)?(?P<level>{LEVELS})\]:?\s*)?"
        ),
        vec![
            PlayerRule::new(
                PlayerActionKind::IpBan,
                r"(?i)^bann(?:ed|ing) ip |\sip[- ]?banned\b",
                &[
                    r"^(?P<name>\w{1,16}) lost connection: You have been IP banned",
                    r"^Banned IP address (?P<name>[0-9A-Fa-f.:]+)",
                    r"^Banning ip (?P<name>[0-9A-Fa-f.:]+)",
                ],
            ),
            PlayerRule::new(
                PlayerActionKind::Kick,
                r"(?i)^kick(?:ed|ing) \w{1,16}(?::|$)|lost connection: .*\bkicked\b",
                &[
                    r"^Kicked (?P<name>\w{1,16})",
                    r"^Kicking (?P<name>\w{1,16})",
                    r"^(?P<name>\w{1,16}) lost connection: .*[Kk]icked",
                ],
            ),
            PlayerRule::new(
                PlayerActionKind::Ban,
                r"(?i)^bann(?:ed|ing) \w{1,16}(?::|$)|\sbann(?:ed|ing)\b",
                &[
                    r"^Banned (?P<name>\w{1,16})(?::|$)",
                    r"^Banning (?P<name>\w{1,16})$",
                    r"^(?P<name>\w{1,16}) lost connection: You are banned",
                ],
            ),
            PlayerRule::new(
                PlayerActionKind::Leave,
                r"left the game|lost connection",
                &[r"^(?P<name>\w{1,16}) (?:left the game|lost connection)"],
            ),
            PlayerRule::new(
                PlayerActionKind::Join,
                r"joined the game|logged in",
                &[
                    r"^(?P<name>\w{1,16}) ?\[/(?P<ip>[^\]]+):\d+\] logged in",
                    r"^(?P<name>\w{1,16}) joined the game",
                ],
            ),
        ]
        .into_iter()
        .collect::<Result<_, _>>()
        .expect("Failed to compile java player rules"),
    )
    .expect("Failed to compile java timestamp regex");

    /// Bedrock dedicated server output:
    /// `[2024-05-01 12:00:00:123 INFO] Player connected: Steve, xuid: ...`.
    pub static ref BEDROCK_RULES: OutputRules = OutputRules::new(
        &format!(
            r"^(?:\[\d{{4}}-\d{{2}}-\d{{2}} \d{{2}}:\d{{2}}:\d{{2}}(?:[:.]\d{{3}})?\s+(?P<level>{LEVELS})\]\s*)?"
        ),
        vec![
            PlayerRule::new(
                PlayerActionKind::Kick,
                r"^Kicked .{1,32}? from the game",
                &[r"^Kicked (?P<name>[^,]{1,32}?) from the game"],
            ),
            PlayerRule::new(
                PlayerActionKind::Leave,
                r"Player disconnected",
                &[r"^Player disconnected: (?P<name>[^,]{1,32}), xuid"],
            ),
            PlayerRule::new(
                PlayerActionKind::Join,
                r"Player connected",
                &[r"^Player connected: (?P<name>[^,]{1,32}), xuid"],
            ),
        ]
        .into_iter()
        .collect::<Result<_, _>>()
        .expect("Failed to compile bedrock player rules"),
    )
    .expect("Failed to compile bedrock timestamp regex");
}
