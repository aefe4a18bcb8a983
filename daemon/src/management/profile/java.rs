use crate::management::launch::{self, LaunchDescriptor, LaunchSpec, LaunchValidation};
use crate::management::profile::{ServerProfile, StatusHint};
use crate::output::rules::JAVA_RULES;
use crate::output::OutputRules;
use anyhow::Context;
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use std::path::Path;

lazy_static! {
    static ref DONE_PATTERN: Regex =
        Regex::new(r#"Done \(\d+[.,]\d{1,3}s\)! For help, type ["']help["']"#)
            .expect("Failed to compile DONE_PATTERN regex");
}

/// A server distributed as a jar and launched with java.
pub struct JavaProfile {
    name: &'static str,
    site: &'static str,
    plugins: bool,
}

impl JavaProfile {
    pub fn vanilla() -> Self {
        Self {
            name: "Vanilla",
            site: "https://www.minecraft.net",
            plugins: false,
        }
    }

    pub fn craftbukkit() -> Self {
        Self {
            name: "CraftBukkit",
            site: "https://bukkit.org",
            plugins: true,
        }
    }
}

async fn fix_eula(working_dir: &Path) -> anyhow::Result<()> {
    let eula_path = working_dir.join("eula.txt");
    if tokio::fs::try_exists(&eula_path).await? {
        let content = tokio::fs::read_to_string(&eula_path).await?;
        if content.lines().any(|l| l.trim() == "eula=true") {
            return Ok(());
        }
        let eula = content
            .lines()
            .map(|l| if l.starts_with("eula") { "eula=true" } else { l })
            .collect::<Vec<_>>()
            .join("\n");
        tokio::fs::write(&eula_path, eula.as_bytes()).await?;
    } else {
        let eula = format!(
            "#By changing the setting below to TRUE you are indicating your agreement to our EULA (https://aka.ms/MinecraftEULA).\n#{}\neula=true\n",
            chrono::Local::now().format("%a %b %d %H:%M:%S %Z %Y")
        );
        tokio::fs::write(&eula_path, eula.as_bytes()).await?;
    }
    info!("accepted EULA in {}", eula_path.display());
    Ok(())
}

#[async_trait::async_trait]
impl ServerProfile for JavaProfile {
    fn name(&self) -> &'static str {
        self.name
    }

    fn site(&self) -> &'static str {
        self.site
    }

    fn supports_plugins(&self) -> bool {
        self.plugins
    }

    fn has_custom_assembly(&self) -> bool {
        false
    }

    fn validate(&self, spec: &mut LaunchSpec) -> LaunchValidation {
        launch::validate_java_launch(spec)
    }

    async fn prepare_launch(&self, spec: &LaunchSpec) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&spec.working_dir)
            .await
            .with_context(|| format!("failed to create {}", spec.working_dir.display()))?;
        if spec.accept_eula {
            fix_eula(&spec.working_dir)
                .await
                .context("failed to write eula.txt")?;
        }
        Ok(())
    }

    fn launch_descriptor(&self, spec: &LaunchSpec) -> LaunchDescriptor {
        let mut flags = vec![
            format!("-Xms{}M", spec.min_ram),
            format!("-Xmx{}M", spec.max_ram),
        ];
        flags.extend(launch::split_args(&spec.optional_flags));

        // the jar is resolved by the child against its own working directory
        let mut args = vec![
            "-jar".to_string(),
            spec.jar_file.display().to_string(),
            "nogui".to_string(),
        ];
        args.extend(launch::split_args(&spec.optional_arguments));

        LaunchDescriptor {
            program: spec.java_path.clone().into(),
            flags,
            args,
            working_dir: spec.working_dir.clone(),
        }
    }

    fn output_rules(&self) -> &OutputRules {
        &JAVA_RULES
    }

    fn status_hint(&self, message: &str) -> Option<StatusHint> {
        if DONE_PATTERN.is_match(message) {
            Some(StatusHint::Ready)
        } else if message.starts_with("Stopping the server")
            || message.starts_with("Stopping server")
        {
            Some(StatusHint::Stopping)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn launch_descriptor_test() {
        let spec = LaunchSpec {
            java_path: "/opt/java/bin/java".into(),
            jar_file: "server.jar".into(),
            min_ram: 512,
            max_ram: 2048,
            optional_flags: "-XX:+UseG1GC \"-Dlog4j.configurationFile=log 4j.xml\"".into(),
            optional_arguments: "--port 25570".into(),
            working_dir: "/srv/mc".into(),
            ..Default::default()
        };
        let descriptor = JavaProfile::vanilla().launch_descriptor(&spec);
        assert_eq!(descriptor.program, PathBuf::from("/opt/java/bin/java"));
        assert_eq!(
            descriptor.flags,
            vec!["-Xms512M", "-Xmx2048M", "-XX:+UseG1GC", "-Dlog4j.configurationFile=log 4j.xml"]
        );
        assert_eq!(descriptor.args, vec!["-jar", "server.jar", "nogui", "--port", "25570"]);
        assert_eq!(descriptor.working_dir, PathBuf::from("/srv/mc"));
        assert_eq!(descriptor.command_line().next().map(String::as_str), Some("-Xms512M"));
    }

    #[test]
    fn status_hints() {
        let profile = JavaProfile::vanilla();
        assert_eq!(
            profile.status_hint(r#"Done (3.512s)! For help, type "help""#),
            Some(StatusHint::Ready)
        );
        assert_eq!(
            profile.status_hint(r#"Done (12,001s)! For help, type "help" or "?""#),
            Some(StatusHint::Ready)
        );
        assert_eq!(profile.status_hint("Stopping the server"), Some(StatusHint::Stopping));
        assert_eq!(profile.status_hint("<Steve> Stopping the server lol"), None);
        assert_eq!(profile.status_hint("Preparing spawn area: 40%"), None);
    }

    #[tokio::test]
    async fn prepare_launch_writes_eula() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("server");
        let mut spec = LaunchSpec {
            working_dir: working_dir.clone(),
            ..Default::default()
        };

        let profile = JavaProfile::vanilla();
        profile.prepare_launch(&spec).await.unwrap();
        assert!(working_dir.is_dir());
        assert!(!working_dir.join("eula.txt").exists());

        spec.accept_eula = true;
        profile.prepare_launch(&spec).await.unwrap();
        let eula = std::fs::read_to_string(working_dir.join("eula.txt")).unwrap();
        assert!(eula.lines().any(|l| l == "eula=true"));

        std::fs::write(working_dir.join("eula.txt"), "#comment\neula=false\n").unwrap();
        profile.prepare_launch(&spec).await.unwrap();
        let eula = std::fs::read_to_string(working_dir.join("eula.txt")).unwrap();
        assert_eq!(eula, "#comment\neula=true");
    }
}
