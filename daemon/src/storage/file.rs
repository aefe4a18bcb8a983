use std::path::Path;

use serde::{Deserialize, Serialize};

pub trait FileIoWithBackup {
    /// Writes the given content to a file and creates a backup of the file before writing.
    fn write_with_backup<P: AsRef<Path>>(path: P, content: &str) -> Result<(), std::io::Error> {
        let path = path.as_ref();

        if path.exists() {
            let backup_path = path.with_extension("bak");
            std::fs::copy(path, backup_path)?;
        } else if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Trait for configuration handling.
pub trait Config: FileIoWithBackup {
    type ConfigType: Serialize + for<'de> Deserialize<'de>;

    fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Self::ConfigType> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self::ConfigType = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn save_config<P: AsRef<Path>>(path: P, config: &Self::ConfigType) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(config)?;
        Self::write_with_backup(path, &content)?;
        Ok(())
    }

    fn load_config_or_default<P: AsRef<Path>, F: FnOnce() -> Self::ConfigType>(
        path: P,
        default: F,
    ) -> anyhow::Result<Self::ConfigType> {
        match std::fs::metadata(path.as_ref()) {
            Ok(metadata) if metadata.is_file() => Self::load_config(path),
            _ => {
                let config = default();
                Self::save_config(path, &config)?;
                Ok(config)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    struct Sample;

    impl FileIoWithBackup for Sample {}

    impl Config for Sample {
        type ConfigType = BTreeMap<String, u32>;
    }

    #[test]
    fn default_is_written_on_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sample.json");

        let loaded = Sample::load_config_or_default(&path, || BTreeMap::from([("a".into(), 1)]))
            .unwrap();
        assert_eq!(loaded.get("a"), Some(&1));
        assert!(path.is_file());

        let reloaded = Sample::load_config_or_default(&path, BTreeMap::new).unwrap();
        assert_eq!(reloaded, loaded);
    }

    #[test]
    fn save_keeps_previous_file_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");

        Sample::save_config(&path, &BTreeMap::from([("a".into(), 1)])).unwrap();
        Sample::save_config(&path, &BTreeMap::from([("a".into(), 2)])).unwrap();

        let backup = Sample::load_config(path.with_extension("bak")).unwrap();
        assert_eq!(backup.get("a"), Some(&1));
        assert_eq!(Sample::load_config(&path).unwrap().get("a"), Some(&2));
    }
}
