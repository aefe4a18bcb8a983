use crate::management::launch::{LaunchDescriptor, LaunchSpec, LaunchValidation};
use crate::management::profile::{JavaProfile, ServerProfile, StatusHint};
use crate::output::rules::JAVA_RULES;
use crate::output::OutputRules;
use std::path::PathBuf;
use std::sync::Arc;

/// Runs a shell script, classifying output like a java server.
pub(crate) struct ScriptProfile {
    script: String,
    prepare_fails: bool,
}

impl ScriptProfile {
    pub(crate) fn new(script: &str) -> Arc<dyn ServerProfile> {
        Arc::new(Self {
            script: script.to_string(),
            prepare_fails: false,
        })
    }

    pub(crate) fn failing_prepare(script: &str) -> Arc<dyn ServerProfile> {
        Arc::new(Self {
            script: script.to_string(),
            prepare_fails: true,
        })
    }
}

#[async_trait::async_trait]
impl ServerProfile for ScriptProfile {
    fn name(&self) -> &'static str {
        "Script"
    }

    fn site(&self) -> &'static str {
        ""
    }

    fn supports_plugins(&self) -> bool {
        false
    }

    fn has_custom_assembly(&self) -> bool {
        true
    }

    fn validate(&self, _spec: &mut LaunchSpec) -> LaunchValidation {
        LaunchValidation::default()
    }

    async fn prepare_launch(&self, _spec: &LaunchSpec) -> anyhow::Result<()> {
        if self.prepare_fails {
            anyhow::bail!("resource missing");
        }
        Ok(())
    }

    fn launch_descriptor(&self, spec: &LaunchSpec) -> LaunchDescriptor {
        LaunchDescriptor {
            program: PathBuf::from("/bin/sh"),
            flags: vec![],
            args: vec!["-c".into(), self.script.clone()],
            working_dir: spec.working_dir.clone(),
        }
    }

    fn output_rules(&self) -> &OutputRules {
        &JAVA_RULES
    }

    fn status_hint(&self, message: &str) -> Option<StatusHint> {
        JavaProfile::vanilla().status_hint(message)
    }
}
