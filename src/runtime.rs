//! Host runtime facts fed into the store.
//!
//! The store seeds and refreshes four sections from whatever hosts it:
//! interpreter-style settings, defined constants, loaded extensions with
//! their functions, and already-included source files. Those facts come
//! through the [`RuntimeSnapshot`] trait so the store can be driven by a
//! fixed snapshot in tests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Directive may be changed by user code.
pub const ACCESS_USER: u8 = 1;
/// Directive may be changed per directory.
pub const ACCESS_PERDIR: u8 = 2;
/// Directive may only be changed system-wide.
pub const ACCESS_SYSTEM: u8 = 4;
/// Directive may be changed anywhere.
pub const ACCESS_ALL: u8 = ACCESS_USER | ACCESS_PERDIR | ACCESS_SYSTEM;

/// One interpreter setting with its global and local values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub global_value: Option<String>,
    pub local_value: Option<String>,
    pub access: u8,
}

impl Directive {
    /// A directive whose global and local values are both `value`.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            global_value: Some(value.clone()),
            local_value: Some(value),
            access: ACCESS_ALL,
        }
    }

    pub fn with_local(mut self, local: impl Into<String>) -> Self {
        self.local_value = Some(local.into());
        self
    }

    pub fn with_access(mut self, access: u8) -> Self {
        self.access = access;
        self
    }
}

/// Provider of host runtime facts.
pub trait RuntimeSnapshot: Send + Sync {
    /// Settings keyed by directive name.
    fn settings(&self) -> BTreeMap<String, Directive>;

    /// Constants grouped by origin (`group → name → value`).
    fn constants(&self) -> Map<String, Value>;

    /// Loaded extensions with the functions each exports.
    fn extensions(&self) -> Vec<(String, Vec<String>)>;

    /// Source files the host has already loaded.
    fn included_files(&self) -> Vec<PathBuf>;

    /// Configuration files the host itself loaded at startup.
    fn loaded_config_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// A fixed snapshot assembled by hand.
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshot {
    settings: BTreeMap<String, Directive>,
    constants: Map<String, Value>,
    extensions: Vec<(String, Vec<String>)>,
    included_files: Vec<PathBuf>,
    loaded_config_files: Vec<PathBuf>,
}

impl StaticSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_setting(mut self, name: impl Into<String>, directive: Directive) -> Self {
        self.settings.insert(name.into(), directive);
        self
    }

    /// Shorthand for an `include_path` directive.
    pub fn with_include_path(self, global: impl Into<String>, local: impl Into<String>) -> Self {
        self.with_setting("include_path", Directive::new(global).with_local(local))
    }

    pub fn with_constant(
        mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let group = self
            .constants
            .entry(group.into())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(group) = group {
            group.insert(name.into(), value.into());
        }
        self
    }

    pub fn with_extension<I, S>(mut self, name: impl Into<String>, functions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions
            .push((name.into(), functions.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with_included_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.included_files.push(path.into());
        self
    }

    pub fn with_loaded_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.loaded_config_files.push(path.into());
        self
    }
}

impl RuntimeSnapshot for StaticSnapshot {
    fn settings(&self) -> BTreeMap<String, Directive> {
        self.settings.clone()
    }

    fn constants(&self) -> Map<String, Value> {
        self.constants.clone()
    }

    fn extensions(&self) -> Vec<(String, Vec<String>)> {
        self.extensions.clone()
    }

    fn included_files(&self) -> Vec<PathBuf> {
        self.included_files.clone()
    }

    fn loaded_config_files(&self) -> Vec<PathBuf> {
        self.loaded_config_files.clone()
    }
}

/// Snapshot of the running process.
///
/// ## Environment Variables
/// - `BOOTSTRAP_CONFIG_DIR` - Host config dir (default: `<config dir>/bootstrap-config`)
/// - `BOOTSTRAP_INCLUDE_PATH` - Global include path (default: `.`)
/// - `BOOTSTRAP_LOCAL_INCLUDE_PATH` - Local include path (default: global plus the config dir)
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    config_dir: Option<PathBuf>,
}

impl Default for ProcessSnapshot {
    fn default() -> Self {
        Self::discover()
    }
}

impl ProcessSnapshot {
    /// Discover the host config directory from environment and defaults.
    pub fn discover() -> Self {
        let config_dir = std::env::var("BOOTSTRAP_CONFIG_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|d| d.join("bootstrap-config")));
        Self { config_dir }
    }

    pub fn with_config_dir(config_dir: Option<PathBuf>) -> Self {
        Self { config_dir }
    }

    pub fn config_dir(&self) -> Option<&std::path::Path> {
        self.config_dir.as_deref()
    }
}

/// Operations each built-in capability exposes, reported as extensions.
const BUILTIN_EXTENSIONS: &[(&str, &[&str])] = &[
    (
        "core",
        &[
            "get",
            "put",
            "remove",
            "defined",
            "peek",
            "to_json",
            "file_in_path",
            "define_scalar_constants",
            "add_class",
        ],
    ),
    ("ini", &["parse", "parse_and_return", "parse_with_deadline"]),
    ("json", &["to_json", "restore"]),
];

impl RuntimeSnapshot for ProcessSnapshot {
    fn settings(&self) -> BTreeMap<String, Directive> {
        let global = std::env::var("BOOTSTRAP_INCLUDE_PATH").unwrap_or_else(|_| ".".to_string());
        let local = std::env::var("BOOTSTRAP_LOCAL_INCLUDE_PATH").unwrap_or_else(|_| {
            match &self.config_dir {
                Some(dir) => format!("{}:{}", global, dir.display()),
                None => global.clone(),
            }
        });

        let mut settings = BTreeMap::new();
        settings.insert("default_charset".to_string(), Directive::new("UTF-8"));
        settings.insert(
            "include_path".to_string(),
            Directive::new(global).with_local(local),
        );
        settings.insert(
            "user_ini.filename".to_string(),
            Directive::new("settings.ini").with_access(ACCESS_PERDIR | ACCESS_SYSTEM),
        );
        settings
    }

    fn constants(&self) -> Map<String, Value> {
        let core = json!({
            "OS": std::env::consts::OS,
            "ARCH": std::env::consts::ARCH,
            "FAMILY": std::env::consts::FAMILY,
            "PATH_SEPARATOR": ":",
            "VERSION": env!("CARGO_PKG_VERSION"),
        });
        let mut constants = Map::new();
        constants.insert("core".to_string(), core);
        constants
    }

    fn extensions(&self) -> Vec<(String, Vec<String>)> {
        BUILTIN_EXTENSIONS
            .iter()
            .map(|(name, functions)| {
                (
                    name.to_string(),
                    functions.iter().map(|f| f.to_string()).collect(),
                )
            })
            .collect()
    }

    fn included_files(&self) -> Vec<PathBuf> {
        std::env::current_exe().into_iter().collect()
    }

    fn loaded_config_files(&self) -> Vec<PathBuf> {
        self.config_dir
            .iter()
            .map(|dir| dir.join("settings.ini"))
            .filter(|path| path.is_file())
            .collect()
    }
}
