//! Store options and well-known section names.
//!
//! Options are plain serde structs with per-field defaults so they can be
//! embedded in a host's own settings file, and can be overridden from the
//! environment at the composition root.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Top-level section holding the store's own bookkeeping.
pub const CONFIG_SECTION: &str = "config";
/// `config.scanned_files`: files merged via `parse`.
pub const SCANNED_FILES: &str = "scanned_files";
/// `config.included_files`: source files the host has already loaded.
pub const INCLUDED_FILES: &str = "included_files";
/// `config.non_constants`: keys never exported to the constant table.
pub const NON_CONSTANTS: &str = "non_constants";
/// `config.checkOnAddClass`: default filesystem check for `add_class`.
pub const CHECK_ON_ADD_CLASS: &str = "checkOnAddClass";
/// Section mapping class names to files.
pub const KNOWN_CLASS_LOCATIONS: &str = "knownClassLocations";
/// Section holding host constants, grouped by origin.
pub const CONSTANTS_SECTION: &str = "constants";
/// Group inside `constants` for values exported by this store.
pub const USER_CONSTANTS: &str = "user";
/// Section mapping extension names to their function lists.
pub const EXTENSIONS_SECTION: &str = "extensions";
/// Search path directive consulted by `file_in_path`.
pub const INCLUDE_PATH: &str = "include_path";

/// How raw INI values are turned into JSON scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerMode {
    /// Booleans, null, integers and floats become typed values.
    #[default]
    Typed,
    /// Every value stays a string.
    Raw,
}

impl FromStr for ScannerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typed" => Ok(ScannerMode::Typed),
            "raw" | "normal" => Ok(ScannerMode::Raw),
            other => Err(format!("unknown scanner mode: {}", other)),
        }
    }
}

/// Options for a [`ConfigStore`](super::ConfigStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Value typing applied to parsed INI sources.
    #[serde(default)]
    pub scanner_mode: ScannerMode,

    /// Allow `define_scalar_constants` to write the constant table.
    #[serde(default)]
    pub export_constants: bool,

    /// Seed for `config.checkOnAddClass`.
    #[serde(default)]
    pub check_on_add_class: bool,

    /// Suffix appended to class names when searching the include path.
    #[serde(default = "default_class_extension")]
    pub class_extension: String,

    /// Separator between include path entries.
    #[serde(default = "default_path_separator")]
    pub path_separator: char,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            scanner_mode: ScannerMode::default(),
            export_constants: false,
            check_on_add_class: false,
            class_extension: default_class_extension(),
            path_separator: default_path_separator(),
        }
    }
}

fn default_class_extension() -> String {
    ".php".to_string()
}

fn default_path_separator() -> char {
    ':'
}

impl StoreOptions {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.apply_overrides(|name| std::env::var(name).ok());
        options
    }

    /// Apply `BOOTSTRAP_*` overrides looked up through `lookup`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(mode) = lookup("BOOTSTRAP_SCANNER_MODE") {
            match mode.parse() {
                Ok(mode) => self.scanner_mode = mode,
                Err(e) => tracing::warn!("Ignoring BOOTSTRAP_SCANNER_MODE: {}", e),
            }
        }

        if let Some(flag) = lookup("BOOTSTRAP_EXPORT_CONSTANTS") {
            match parse_flag(&flag) {
                Some(flag) => self.export_constants = flag,
                None => tracing::warn!("Ignoring BOOTSTRAP_EXPORT_CONSTANTS={}", flag),
            }
        }

        if let Some(flag) = lookup("BOOTSTRAP_CHECK_ON_ADD_CLASS") {
            match parse_flag(&flag) {
                Some(flag) => self.check_on_add_class = flag,
                None => tracing::warn!("Ignoring BOOTSTRAP_CHECK_ON_ADD_CLASS={}", flag),
            }
        }

        if let Some(extension) = lookup("BOOTSTRAP_CLASS_EXTENSION") {
            self.class_extension = extension;
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let options = StoreOptions::default();
        assert_eq!(options.scanner_mode, ScannerMode::Typed);
        assert!(!options.export_constants);
        assert_eq!(options.class_extension, ".php");
        assert_eq!(options.path_separator, ':');
    }

    #[test]
    fn test_deserialize_fills_missing_fields() {
        let options: StoreOptions =
            serde_json::from_str(r#"{"scanner_mode": "raw", "export_constants": true}"#).unwrap();
        assert_eq!(options.scanner_mode, ScannerMode::Raw);
        assert!(options.export_constants);
        assert_eq!(options.class_extension, ".php");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("BOOTSTRAP_SCANNER_MODE", "raw"),
            ("BOOTSTRAP_EXPORT_CONSTANTS", "on"),
            ("BOOTSTRAP_CHECK_ON_ADD_CLASS", "maybe"),
            ("BOOTSTRAP_CLASS_EXTENSION", ".inc"),
        ]
        .into_iter()
        .collect();

        let mut options = StoreOptions::default();
        options.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(options.scanner_mode, ScannerMode::Raw);
        assert!(options.export_constants);
        // unparseable flag leaves the default alone
        assert!(!options.check_on_add_class);
        assert_eq!(options.class_extension, ".inc");
    }
}
