use crate::storage::file::{Config, FileIoWithBackup};
use log::warn;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

type Sections = BTreeMap<String, BTreeMap<String, Value>>;

/// Durable section/key/value settings.
///
/// Reads never fail: a missing key or a value of the wrong type yields `default`.
pub trait ConfigStore: Send + Sync {
    fn read_bool(&self, section: &str, key: &str, default: bool) -> bool;
    fn read_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn read_string(&self, section: &str, key: &str, default: &str) -> String;

    fn write_bool(&self, section: &str, key: &str, value: bool) -> anyhow::Result<()>;
    fn write_int(&self, section: &str, key: &str, value: i64) -> anyhow::Result<()>;
    fn write_string(&self, section: &str, key: &str, value: &str) -> anyhow::Result<()>;
}

/// [`ConfigStore`] backed by a pretty-printed JSON document, persisted on every write.
pub struct JsonConfigStore {
    path: Option<PathBuf>,
    sections: RwLock<Sections>,
}

impl FileIoWithBackup for JsonConfigStore {}

impl Config for JsonConfigStore {
    type ConfigType = Sections;
}

impl JsonConfigStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let sections = Self::load_config_or_default(path, Sections::new)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            sections: RwLock::new(sections),
        })
    }

    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            sections: RwLock::new(Sections::new()),
        }
    }

    fn read_value<R>(
        &self,
        section: &str,
        key: &str,
        f: impl FnOnce(&Value) -> Option<R>,
    ) -> Option<R> {
        let sections = self.sections.read().unwrap_or_else(PoisonError::into_inner);
        let value = sections.get(section)?.get(key)?;
        let typed = f(value);
        if typed.is_none() {
            warn!("settings [{}] {} has unexpected value {}, using default", section, key, value);
        }
        typed
    }

    fn write_value(&self, section: &str, key: &str, value: Value) -> anyhow::Result<()> {
        let mut sections = self.sections.write().unwrap_or_else(PoisonError::into_inner);
        sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value);
        match &self.path {
            Some(path) => Self::save_config(path, &sections),
            None => Ok(()),
        }
    }
}

impl ConfigStore for JsonConfigStore {
    fn read_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.read_value(section, key, Value::as_bool)
            .unwrap_or(default)
    }

    fn read_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.read_value(section, key, Value::as_i64)
            .unwrap_or(default)
    }

    fn read_string(&self, section: &str, key: &str, default: &str) -> String {
        self.read_value(section, key, |v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    fn write_bool(&self, section: &str, key: &str, value: bool) -> anyhow::Result<()> {
        self.write_value(section, key, Value::Bool(value))
    }

    fn write_int(&self, section: &str, key: &str, value: i64) -> anyhow::Result<()> {
        self.write_value(section, key, Value::from(value))
    }

    fn write_string(&self, section: &str, key: &str, value: &str) -> anyhow::Result<()> {
        self.write_value(section, key, Value::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_keys_yield_defaults() {
        let store = JsonConfigStore::in_memory();
        assert!(store.read_bool("starter", "accept_eula", true));
        assert_eq!(store.read_int("starter", "max_ram", 1024), 1024);
        assert_eq!(store.read_string("starter", "java_path", "java"), "java");
    }

    #[test]
    fn mistyped_value_yields_default() {
        let store = JsonConfigStore::in_memory();
        store.write_string("starter", "max_ram", "lots").unwrap();
        assert_eq!(store.read_int("starter", "max_ram", 1024), 1024);
        assert_eq!(store.read_string("starter", "max_ram", ""), "lots");
    }

    #[test]
    fn writes_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        {
            let store = JsonConfigStore::open(&path).unwrap();
            store.write_bool("console", "show_date", true).unwrap();
            store.write_int("starter", "min_ram", 512).unwrap();
            store.write_string("starter", "jar_file", "server.jar").unwrap();
        }

        let store = JsonConfigStore::open(&path).unwrap();
        assert!(store.read_bool("console", "show_date", false));
        assert_eq!(store.read_int("starter", "min_ram", 128), 512);
        assert_eq!(store.read_string("starter", "jar_file", ""), "server.jar");
        assert!(path.with_extension("bak").is_file());
    }
}
