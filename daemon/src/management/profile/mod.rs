mod bedrock;
mod java;
#[cfg(all(test, unix))]
mod script;

use crate::management::launch::{LaunchDescriptor, LaunchSpec, LaunchValidation};
use crate::output::{classify, OutputRules};
use mcsv_protocol::output::ClassifiedLine;
use std::sync::Arc;

pub use bedrock::BedrockProfile;
pub use java::JavaProfile;
#[cfg(all(test, unix))]
pub(crate) use script::ScriptProfile;

/// Lifecycle information carried by a console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHint {
    /// Startup finished, the server accepts players.
    Ready,
    /// The server began shutting down on its own (e.g. `stop` typed at the console).
    Stopping,
}

/// Capabilities and behaviour of one server kind.
#[async_trait::async_trait]
pub trait ServerProfile: Send + Sync {
    fn name(&self) -> &'static str;

    fn site(&self) -> &'static str;

    fn is_local(&self) -> bool {
        true
    }

    fn supports_plugins(&self) -> bool;

    /// True when the server is a native executable rather than a jar run by java.
    fn has_custom_assembly(&self) -> bool;

    /// Pre-spawn checks. May normalise `spec` in place.
    fn validate(&self, spec: &mut LaunchSpec) -> LaunchValidation;

    /// Profile specific work that must succeed before the process is spawned.
    async fn prepare_launch(&self, spec: &LaunchSpec) -> anyhow::Result<()>;

    fn launch_descriptor(&self, spec: &LaunchSpec) -> LaunchDescriptor;

    fn output_rules(&self) -> &OutputRules;

    fn classify(&self, line: &str) -> ClassifiedLine {
        classify(self.output_rules(), line)
    }

    fn status_hint(&self, message: &str) -> Option<StatusHint>;

    fn stop_command(&self) -> &str {
        "stop"
    }
}

/// One line summary of a profile, e.g. `CraftBukkit (https://bukkit.org): local, java, plugins`.
pub fn describe(profile: &dyn ServerProfile) -> String {
    format!(
        "{} ({}): {}, {}, {}",
        profile.name(),
        if profile.site().is_empty() { "-" } else { profile.site() },
        if profile.is_local() { "local" } else { "remote" },
        if profile.has_custom_assembly() { "native" } else { "java" },
        if profile.supports_plugins() { "plugins" } else { "no plugins" },
    )
}

/// Known server kinds, looked up by (case-insensitive) name.
pub struct ServerProfiles {
    profiles: Vec<Arc<dyn ServerProfile>>,
}

impl ServerProfiles {
    pub fn new(profiles: Vec<Arc<dyn ServerProfile>>) -> Self {
        Self { profiles }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            Arc::new(JavaProfile::vanilla()),
            Arc::new(JavaProfile::craftbukkit()),
            Arc::new(BedrockProfile),
        ])
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ServerProfile>> {
        self.profiles
            .iter()
            .find(|profile| profile.name().eq_ignore_ascii_case(name.trim()))
            .cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.profiles.iter().map(|profile| profile.name())
    }
}
