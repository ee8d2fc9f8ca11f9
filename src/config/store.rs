//! The configuration store.
//!
//! A [`ConfigStore`] owns one ordered tree of configuration values. It is
//! seeded from a [`RuntimeSnapshot`] when constructed, merges INI sources
//! and explicit mappings into that tree, and answers reads addressed by
//! key, path, or a selection of `(section, leaf)` pairs.
//!
//! All mutation happens under a single write lock per operation, so
//! concurrent merges never interleave. Reads that report runtime state
//! (`get`, `defined`, `peek`) refresh the runtime-derived sections first,
//! taking the write lock only when those sections are stale.

use super::address::Address;
use super::files::{find_in_dirs, search_dirs};
use super::merge::merge_into;
use super::source::{self, Source};
use super::types::*;
use crate::constants::{self, ConstantTable};
use crate::error::{ConfigError, Result};
use crate::runtime::{ProcessSnapshot, RuntimeSnapshot};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Process-wide instance, created on first use.
static GLOBAL: OnceLock<Arc<ConfigStore>> = OnceLock::new();

/// In-memory registry of nested configuration.
pub struct ConfigStore {
    data: RwLock<Map<String, Value>>,
    snapshot: Arc<dyn RuntimeSnapshot>,
    constants: Arc<ConstantTable>,
    options: StoreOptions,
}

impl ConfigStore {
    /// Build a store and run the bootstrap step.
    ///
    /// Every top-level key present after bootstrap is recorded in
    /// `config.non_constants`, so only settings added later are eligible
    /// for constant export.
    pub fn new(snapshot: Arc<dyn RuntimeSnapshot>, options: StoreOptions) -> Self {
        Self::with_constant_table(snapshot, options, Arc::new(ConstantTable::new()))
    }

    /// Build a store exporting constants into `constants`.
    pub fn with_constant_table(
        snapshot: Arc<dyn RuntimeSnapshot>,
        options: StoreOptions,
        constants: Arc<ConstantTable>,
    ) -> Self {
        let store = Self {
            data: RwLock::new(Map::new()),
            snapshot,
            constants,
            options,
        };

        {
            let mut data = store.write();
            store.refresh_locked(&mut data);
            let keys: Vec<Value> = data.keys().cloned().map(Value::String).collect();
            let config = config_section_mut(&mut data);
            config.insert(
                CHECK_ON_ADD_CLASS.to_string(),
                Value::Bool(store.options.check_on_add_class),
            );
            config.insert(NON_CONSTANTS.to_string(), Value::Array(keys));
        }

        debug!("Configuration store ready");
        store
    }

    /// The process-wide store, built from [`ProcessSnapshot`] and
    /// [`StoreOptions::from_env`] on first use.
    pub fn global() -> Arc<ConfigStore> {
        Self::global_with(|| {
            ConfigStore::with_constant_table(
                Arc::new(ProcessSnapshot::discover()),
                StoreOptions::from_env(),
                constants::global(),
            )
        })
    }

    /// The process-wide store, built by `init` if it does not exist yet.
    ///
    /// `init` runs at most once per process; later calls return the
    /// existing instance and ignore their `init`.
    pub fn global_with(init: impl FnOnce() -> ConfigStore) -> Arc<ConfigStore> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(init())))
    }

    /// Whether the process-wide store has been created.
    pub fn is_initialized() -> bool {
        GLOBAL.get().is_some()
    }

    /// Rebuild a store from the text written by its `Display` or
    /// `Serialize` output, then refresh runtime state.
    pub fn restore(
        serialized: &str,
        snapshot: Arc<dyn RuntimeSnapshot>,
        options: StoreOptions,
    ) -> Result<Self> {
        let data: Map<String, Value> = serde_json::from_str(serialized)?;
        let store = Self {
            data: RwLock::new(data),
            snapshot,
            constants: Arc::new(ConstantTable::new()),
            options,
        };
        {
            let mut data = store.write();
            store.refresh_locked(&mut data);
        }
        Ok(store)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn constant_table(&self) -> &Arc<ConstantTable> {
        &self.constants
    }

    /// Read a value.
    ///
    /// Fails with `NotFound` when the key, path, or any selected pair is
    /// absent.
    pub fn get(&self, address: impl Into<Address>) -> Result<Value> {
        let address = address.into();
        let data = self.refreshed();
        address
            .resolve(&data)
            .ok_or_else(|| ConfigError::not_found(&address))
    }

    /// Read a value, `None` when absent.
    pub fn lookup(&self, address: impl Into<Address>) -> Option<Value> {
        address.into().resolve(&self.read())
    }

    /// Whether a value exists. A selection requires every pair.
    pub fn defined(&self, address: impl Into<Address>) -> bool {
        let address = address.into();
        let data = self.refreshed();
        address.exists(&data)
    }

    /// Merge a mapping of top-level keys.
    ///
    /// Mappings are merged one level deep with the incoming values
    /// winning; anything else replaces the existing value. Empty keys are
    /// ignored.
    pub fn put(&self, incoming: Map<String, Value>) {
        let mut data = self.write();
        let merged = merge_into(&mut data, incoming);
        ensure_config_invariant(&mut data);
        debug!(keys = merged, "Merged configuration");
    }

    /// Merge a single top-level key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let mut incoming = Map::new();
        incoming.insert(key.into(), value.into());
        self.put(incoming);
    }

    /// Remove a top-level key, returning its value.
    ///
    /// The `config` section cannot be removed.
    pub fn remove(&self, key: &str) -> Option<Value> {
        if key == CONFIG_SECTION {
            warn!("Refusing to remove the '{}' section", CONFIG_SECTION);
            return None;
        }
        self.write().shift_remove(key)
    }

    /// Run `f` with exclusive access to the whole tree.
    ///
    /// Use this when several keys must change atomically.
    pub fn with_write<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut data = self.write();
        let result = f(&mut data);
        ensure_config_invariant(&mut data);
        result
    }

    /// All top-level keys, in insertion order.
    pub fn peek(&self) -> Vec<String> {
        self.refreshed().keys().cloned().collect()
    }

    /// JSON text of `get(address)`.
    pub fn to_json(&self, address: impl Into<Address>) -> Result<String> {
        Ok(serde_json::to_string(&self.get(address)?)?)
    }

    /// Indented JSON text of `get(address)`.
    pub fn to_json_pretty(&self, address: impl Into<Address>) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.get(address)?)?)
    }

    /// Files merged via `parse`, in order.
    pub fn scanned_files(&self) -> Vec<String> {
        self.read()
            .get(CONFIG_SECTION)
            .and_then(|config| config.get(SCANNED_FILES))
            .and_then(Value::as_array)
            .map(|files| {
                files
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Locate `file` as given, or under the `include_path` directories.
    ///
    /// Returns the input unchanged when it exists as given. `None` means
    /// no candidate exists.
    pub fn file_in_path(&self, file: impl AsRef<Path>) -> Option<PathBuf> {
        let file = file.as_ref();
        if file.as_os_str().is_empty() {
            return None;
        }
        if file.exists() {
            return Some(file.to_path_buf());
        }

        let dirs = {
            let data = self.read();
            let include_path = data.get(INCLUDE_PATH)?;
            search_dirs(include_path, self.options.path_separator)
        };
        let found = find_in_dirs(file, &dirs);
        debug!(file = %file.display(), found = ?found, "Searched include path");
        found
    }

    /// Parse a source and merge it.
    pub fn parse(&self, source: impl Into<Source>) -> Result<()> {
        self.parse_and_return(source).map(|_| ())
    }

    /// Parse a source, merge it, and return the parsed mapping as it was
    /// before merging.
    ///
    /// A name that resolves through `file_in_path` is read as a file;
    /// otherwise a name containing `]` is parsed as INI text; anything
    /// else is ambiguous and rejected. Streams are drained first and an
    /// empty stream is an I/O error. Parsed files are recorded once in
    /// `config.scanned_files`.
    pub fn parse_and_return(&self, source: impl Into<Source>) -> Result<Map<String, Value>> {
        let mode = self.options.scanner_mode;
        let (parsed, origin) = match source.into() {
            Source::Name(name) => match self.file_in_path(&name) {
                Some(path) => (self.parse_file(&path)?, Some(path)),
                None if source::looks_like_ini(&name) => {
                    (source::parse_ini(&name, mode, "INI text")?, None)
                }
                None => {
                    return Err(ConfigError::parse(
                        format!("\"{}\"", name),
                        "not a file in the include path and not INI text",
                    ));
                }
            },
            Source::File(path) => match self.file_in_path(&path) {
                Some(found) => (self.parse_file(&found)?, Some(found)),
                None => {
                    return Err(ConfigError::io(
                        format!("locating {}", path.display()),
                        std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "not found as given or in the include path",
                        ),
                    ));
                }
            },
            Source::Stream(reader) => {
                let text = source::decode(source::drain(reader)?, "stream")?;
                (source::parse_ini(&text, mode, "stream")?, None)
            }
            Source::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(ConfigError::io(
                        "reading configuration buffer",
                        std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "buffer is empty"),
                    ));
                }
                let text = source::decode(bytes, "buffer")?;
                (source::parse_ini(&text, mode, "buffer")?, None)
            }
        };

        let mut data = self.write();
        merge_into(&mut data, parsed.clone());
        ensure_config_invariant(&mut data);
        if let Some(path) = origin {
            record_scanned_file(&mut data, &path);
        }
        Ok(parsed)
    }

    /// Drain `reader` on the blocking pool and parse it, failing with
    /// `Timeout` if the read does not finish within `deadline`.
    ///
    /// A timed-out read keeps running in the background until the reader
    /// returns; its result is discarded.
    pub async fn parse_with_deadline<R>(
        &self,
        reader: R,
        deadline: Duration,
    ) -> Result<Map<String, Value>>
    where
        R: Read + Send + 'static,
    {
        let drain = tokio::task::spawn_blocking(move || source::drain(reader));
        let bytes = match tokio::time::timeout(deadline, drain).await {
            Err(_) => return Err(ConfigError::Timeout(deadline)),
            Ok(Err(join)) => {
                return Err(ConfigError::io(
                    "draining configuration stream",
                    std::io::Error::other(join),
                ));
            }
            Ok(Ok(bytes)) => bytes?,
        };
        self.parse_and_return(Source::Bytes(bytes))
    }

    /// Export scalar top-level settings into the constant table.
    ///
    /// Does nothing unless `export_constants` is enabled. Keys listed in
    /// `config.non_constants`, invalid names, non-scalars, and names
    /// already defined are skipped. Returns how many were defined.
    pub fn define_scalar_constants(&self) -> usize {
        if !self.options.export_constants {
            debug!("Constant export disabled, skipping");
            return 0;
        }

        let data = self.refreshed();
        let excluded: HashSet<&str> = data
            .get(CONFIG_SECTION)
            .and_then(|config| config.get(NON_CONSTANTS))
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let defined = data
            .iter()
            .filter(|(key, _)| !excluded.contains(key.as_str()))
            .filter(|(key, value)| self.constants.define(key, value))
            .count();
        info!(defined, "Exported scalar settings as constants");
        defined
    }

    /// Register `file` as the location of class `name`.
    ///
    /// With `check_filesystem` unset, `config.checkOnAddClass` decides
    /// whether the file must be found through `file_in_path` first.
    /// Returns whether the class was registered.
    pub fn add_class(&self, name: &str, file: &str, check_filesystem: Option<bool>) -> bool {
        let check = check_filesystem.unwrap_or_else(|| {
            self.lookup((CONFIG_SECTION, CHECK_ON_ADD_CLASS))
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        });

        if check && self.file_in_path(file).is_none() {
            debug!(class = %name, file = %file, "Class file not found, not registering");
            return false;
        }

        let mut location = Map::new();
        location.insert(name.to_string(), Value::String(file.to_string()));
        self.set(KNOWN_CLASS_LOCATIONS, location);
        true
    }

    fn parse_file(&self, path: &Path) -> Result<Map<String, Value>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::io(format!("reading {}", path.display()), e))?;
        let origin = format!("\"{}\"", path.display());
        source::parse_ini(&text, self.options.scanner_mode, &origin)
    }

    fn read(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Map<String, Value>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read guard over the tree with the runtime-derived sections current.
    ///
    /// Runtime state is gathered before locking. When the tree already
    /// holds it only a read lock is taken, so concurrent reads run in
    /// parallel; otherwise the sections are rewritten under a short write
    /// lock first.
    fn refreshed(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        let runtime = self.runtime_state();
        {
            let data = self.read();
            if runtime.is_current(&data) {
                return data;
            }
        }
        {
            let mut data = self.write();
            self.apply_runtime_state(&mut data, runtime);
        }
        self.read()
    }

    fn refresh_locked(&self, data: &mut Map<String, Value>) {
        self.apply_runtime_state(data, self.runtime_state());
    }

    fn runtime_state(&self) -> RuntimeState {
        let mut constants = self.snapshot.constants();
        constants.insert(
            USER_CONSTANTS.to_string(),
            Value::Object(self.constants.to_map()),
        );

        let extensions: Map<String, Value> = self
            .snapshot
            .extensions()
            .into_iter()
            .map(|(name, functions)| {
                let functions = functions.into_iter().map(Value::String).collect();
                (name, Value::Array(functions))
            })
            .collect();

        RuntimeState {
            included_files: path_list(&self.snapshot.included_files()),
            constants: Value::Object(constants),
            extensions: Value::Object(extensions),
        }
    }

    /// Bootstrap step: seed settings and scanned files once, then
    /// overwrite the runtime-derived sections.
    fn apply_runtime_state(&self, data: &mut Map<String, Value>, runtime: RuntimeState) {
        if data.is_empty() {
            for (name, directive) in self.snapshot.settings() {
                match serde_json::to_value(&directive) {
                    Ok(value) => {
                        data.insert(name, value);
                    }
                    Err(e) => warn!(setting = %name, error = %e, "Skipping unserializable setting"),
                }
            }
        }

        // Checked before anything else creates `scanned_files`.
        let config = config_section_mut(data);
        let seeded = config.get(SCANNED_FILES).is_some_and(Value::is_array);
        if !seeded {
            let loaded = path_list(&self.snapshot.loaded_config_files());
            config.insert(SCANNED_FILES.to_string(), loaded);
        }
        config.insert(INCLUDED_FILES.to_string(), runtime.included_files);

        data.insert(CONSTANTS_SECTION.to_string(), runtime.constants);
        data.insert(EXTENSIONS_SECTION.to_string(), runtime.extensions);
    }
}

/// Runtime-derived sections, gathered from the snapshot.
struct RuntimeState {
    included_files: Value,
    constants: Value,
    extensions: Value,
}

impl RuntimeState {
    /// Whether `data` is bootstrapped and already holds these sections.
    fn is_current(&self, data: &Map<String, Value>) -> bool {
        let config = data.get(CONFIG_SECTION);
        config
            .and_then(|config| config.get(SCANNED_FILES))
            .is_some_and(Value::is_array)
            && config.and_then(|config| config.get(INCLUDED_FILES)) == Some(&self.included_files)
            && data.get(CONSTANTS_SECTION) == Some(&self.constants)
            && data.get(EXTENSIONS_SECTION) == Some(&self.extensions)
    }
}

fn path_list(paths: &[PathBuf]) -> Value {
    Value::Array(
        paths
            .iter()
            .map(|path| Value::String(path.to_string_lossy().into_owned()))
            .collect(),
    )
}

/// Keep `config` a mapping with a `scanned_files` sequence.
fn ensure_config_invariant(data: &mut Map<String, Value>) {
    let config = config_section_mut(data);
    if !config.get(SCANNED_FILES).is_some_and(Value::is_array) {
        config.insert(SCANNED_FILES.to_string(), Value::Array(Vec::new()));
    }
}

fn config_section_mut(data: &mut Map<String, Value>) -> &mut Map<String, Value> {
    let slot = data
        .entry(CONFIG_SECTION)
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        warn!("'{}' was replaced by a non-mapping value, resetting it", CONFIG_SECTION);
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(config) => config,
        _ => unreachable!("config section was just made a mapping"),
    }
}

fn record_scanned_file(data: &mut Map<String, Value>, path: &Path) {
    let canonical = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let entry = Value::String(canonical.to_string_lossy().into_owned());

    let config = config_section_mut(data);
    if let Some(Value::Array(files)) = config.get_mut(SCANNED_FILES)
        && !files.contains(&entry)
    {
        info!(file = %canonical.display(), "Scanned configuration file");
        files.push(entry);
    }
}

impl fmt::Display for ConfigStore {
    /// JSON text of the whole tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.read();
        let text = serde_json::to_string(&*data).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("keys", &self.read().len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Only the data tree is serialized; the snapshot provider and constant
/// table are not.
impl Serialize for ConfigStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.read().serialize(serializer)
    }
}
