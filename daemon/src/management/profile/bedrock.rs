use crate::management::launch::{LaunchDescriptor, LaunchSpec, LaunchValidation};
use crate::management::profile::{ServerProfile, StatusHint};
use crate::output::rules::BEDROCK_RULES;
use crate::output::OutputRules;
use anyhow::bail;
use std::path::PathBuf;

#[cfg(windows)]
const ASSEMBLY: &str = "bedrock_server.exe";
#[cfg(not(windows))]
const ASSEMBLY: &str = "bedrock_server";

/// Bedrock dedicated server, a native executable living in the working directory.
pub struct BedrockProfile;

impl BedrockProfile {
    pub fn assembly(spec: &LaunchSpec) -> PathBuf {
        let path = spec.working_dir.join(ASSEMBLY);
        std::path::absolute(&path).unwrap_or(path)
    }
}

#[async_trait::async_trait]
impl ServerProfile for BedrockProfile {
    fn name(&self) -> &'static str {
        "Bedrock"
    }

    fn site(&self) -> &'static str {
        "https://www.minecraft.net/download/server/bedrock"
    }

    fn supports_plugins(&self) -> bool {
        false
    }

    fn has_custom_assembly(&self) -> bool {
        true
    }

    fn validate(&self, spec: &mut LaunchSpec) -> LaunchValidation {
        let mut validation = LaunchValidation::default();
        let assembly = Self::assembly(spec);
        if !assembly.is_file() {
            validation.error("working_dir", format!("{} does not exist", assembly.display()));
        }
        validation
    }

    async fn prepare_launch(&self, spec: &LaunchSpec) -> anyhow::Result<()> {
        let assembly = Self::assembly(spec);
        if !tokio::fs::try_exists(&assembly).await? {
            bail!("{} does not exist", assembly.display());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = tokio::fs::metadata(&assembly).await?.permissions();
            if permissions.mode() & 0o111 == 0 {
                permissions.set_mode(permissions.mode() | 0o755);
                tokio::fs::set_permissions(&assembly, permissions).await?;
            }
        }
        Ok(())
    }

    /// The executable takes no command line; everything is in `server.properties`.
    fn launch_descriptor(&self, spec: &LaunchSpec) -> LaunchDescriptor {
        LaunchDescriptor {
            program: Self::assembly(spec),
            flags: vec![],
            args: vec![],
            working_dir: spec.working_dir.clone(),
        }
    }

    fn output_rules(&self) -> &OutputRules {
        &BEDROCK_RULES
    }

    fn status_hint(&self, message: &str) -> Option<StatusHint> {
        match message {
            "Server started." => Some(StatusHint::Ready),
            "Server stop requested." | "Stopping server..." => Some(StatusHint::Stopping),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_assembly_fails_validation_and_prepare() {
        let dir = tempfile::tempdir().unwrap();
        let mut spec = LaunchSpec {
            server_type: "Bedrock".into(),
            working_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(!BedrockProfile.validate(&mut spec).is_ok());
        assert!(BedrockProfile.prepare_launch(&spec).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn prepare_marks_assembly_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut spec = LaunchSpec {
            working_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let assembly = dir.path().join(ASSEMBLY);
        std::fs::write(&assembly, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&assembly, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert!(BedrockProfile.validate(&mut spec).is_ok());
        BedrockProfile.prepare_launch(&spec).await.unwrap();
        let mode = std::fs::metadata(&assembly).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0);

        let descriptor = BedrockProfile.launch_descriptor(&spec);
        assert!(descriptor.program.is_absolute());
        assert!(descriptor.flags.is_empty() && descriptor.args.is_empty());
    }

    #[test]
    fn status_hints() {
        assert_eq!(BedrockProfile.status_hint("Server started."), Some(StatusHint::Ready));
        assert_eq!(BedrockProfile.status_hint("Stopping server..."), Some(StatusHint::Stopping));
        assert_eq!(BedrockProfile.status_hint("Level Name: world"), None);
    }
}
