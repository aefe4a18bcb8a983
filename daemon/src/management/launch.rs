use crate::storage::ConfigStore;
use log::warn;
use mcsv_protocol::utils::Encoding;
use std::fmt;
use std::path::{Path, PathBuf};

pub const STARTER_SECTION: &str = "starter";
/// Jars smaller than this are treated as truncated downloads.
const MIN_JAR_SIZE: u64 = 1024;

/// User-level launch settings, read from the `starter` settings section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub server_type: String,
    pub java_path: String,
    pub jar_file: PathBuf,
    pub min_ram: u32,
    pub max_ram: u32,
    pub optional_arguments: String,
    pub optional_flags: String,
    pub accept_eula: bool,
    pub working_dir: PathBuf,
    pub output_encoding: Encoding,
    pub input_encoding: Encoding,
}

impl Default for LaunchSpec {
    fn default() -> Self {
        Self {
            server_type: "Vanilla".into(),
            java_path: "java".into(),
            jar_file: PathBuf::new(),
            min_ram: 128,
            max_ram: 1024,
            optional_arguments: String::new(),
            optional_flags: String::new(),
            accept_eula: false,
            working_dir: PathBuf::from("."),
            output_encoding: Encoding::UTF8,
            input_encoding: Encoding::UTF8,
        }
    }
}

fn read_ram(store: &dyn ConfigStore, key: &str, default: u32) -> u32 {
    let value = store.read_int(STARTER_SECTION, key, default as i64);
    u32::try_from(value).unwrap_or_else(|_| {
        warn!("settings [starter] {} = {} is out of range, using {}", key, value, default);
        default
    })
}

fn read_encoding(store: &dyn ConfigStore, key: &str) -> Encoding {
    let name = store.read_string(STARTER_SECTION, key, Encoding::UTF8.name());
    name.parse().unwrap_or_else(|err| {
        warn!("settings [starter] {}: {}, falling back to utf-8", key, err);
        Encoding::UTF8
    })
}

impl LaunchSpec {
    pub fn from_store(store: &dyn ConfigStore) -> Self {
        let default = Self::default();
        Self {
            server_type: store.read_string(STARTER_SECTION, "server_type", &default.server_type),
            java_path: store.read_string(STARTER_SECTION, "java_path", &default.java_path),
            jar_file: store.read_string(STARTER_SECTION, "jar_file", "").into(),
            min_ram: read_ram(store, "min_ram", default.min_ram),
            max_ram: read_ram(store, "max_ram", default.max_ram),
            optional_arguments: store.read_string(STARTER_SECTION, "optional_arguments", ""),
            optional_flags: store.read_string(STARTER_SECTION, "optional_flags", ""),
            accept_eula: store.read_bool(STARTER_SECTION, "accept_eula", false),
            working_dir: store.read_string(STARTER_SECTION, "working_dir", ".").into(),
            output_encoding: read_encoding(store, "output_encoding"),
            input_encoding: read_encoding(store, "input_encoding"),
        }
    }

    /// Jar location; relative paths are resolved against the working directory.
    pub fn jar_path(&self) -> PathBuf {
        if self.jar_file.is_absolute() {
            self.jar_file.clone()
        } else {
            self.working_dir.join(&self.jar_file)
        }
    }
}

/// Fully resolved command line for one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchDescriptor {
    pub program: PathBuf,
    /// Runtime flags, placed before `args` (e.g. `-Xmx1024M`).
    pub flags: Vec<String>,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl LaunchDescriptor {
    pub fn command_line(&self) -> impl Iterator<Item = &String> {
        self.flags.iter().chain(self.args.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchIssue {
    pub field: &'static str,
    pub severity: IssueSeverity,
    pub message: String,
}

/// Outcome of pre-spawn checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchValidation {
    pub issues: Vec<LaunchIssue>,
}

impl LaunchValidation {
    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &LaunchIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LaunchIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Warning)
    }

    pub fn error(&mut self, field: &'static str, message: impl Into<String>) {
        self.issues.push(LaunchIssue {
            field,
            severity: IssueSeverity::Error,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, field: &'static str, message: impl Into<String>) {
        self.issues.push(LaunchIssue {
            field,
            severity: IssueSeverity::Warning,
            message: message.into(),
        });
    }
}

impl fmt::Display for LaunchValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for issue in self.errors() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", issue.field, issue.message)?;
            first = false;
        }
        if first {
            f.write_str("ok")?;
        }
        Ok(())
    }
}

/// Checks a java-launched server: jar file sanity, java availability and RAM bounds.
///
/// `min_ram > max_ram` is repaired in place by raising `max_ram`.
pub fn validate_java_launch(spec: &mut LaunchSpec) -> LaunchValidation {
    let mut validation = LaunchValidation::default();

    let jar = spec.jar_path();
    if spec.jar_file.as_os_str().is_empty() {
        validation.error("jar_file", "no server jar configured");
    } else if !jar.is_file() {
        validation.error("jar_file", format!("{} does not exist", jar.display()));
    } else if jar.extension().and_then(|ext| ext.to_str()) != Some("jar") {
        validation.error("jar_file", format!("{} is not a .jar file", jar.display()));
    } else {
        match std::fs::metadata(&jar) {
            Ok(metadata) if metadata.len() < MIN_JAR_SIZE => {
                validation.error(
                    "jar_file",
                    format!("{} is corrupt, download it again", jar.display()),
                );
            }
            Ok(_) => {}
            Err(err) => validation.error("jar_file", format!("{}: {}", jar.display(), err)),
        }
    }

    if find_executable(&spec.java_path).is_none() {
        validation.error("java_path", format!("java executable '{}' not found", spec.java_path));
    }

    if spec.min_ram > spec.max_ram {
        validation.warning(
            "max_ram",
            format!(
                "min_ram ({}M) exceeds max_ram ({}M), raising max_ram",
                spec.min_ram, spec.max_ram
            ),
        );
        spec.max_ram = spec.min_ram;
    }

    validation
}

/// Resolves an executable: paths are checked directly, bare names are searched on `PATH`.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let candidate = candidate.with_extension("exe");
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    })
}

/// Splits an argument string on whitespace, keeping quoted sections together.
pub fn split_args(text: &str) -> Vec<String> {
    let mut args = vec![];
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        args.push(current);
    }
    args
}
