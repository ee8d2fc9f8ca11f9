//! Class name → file resolution.
//!
//! Resolution order:
//! 1. `knownClassLocations[name]` in the store
//! 2. `name` plus the class extension, searched with `file_in_path`
//! 3. failure: `ClassNotFound`, or a warning in best-effort mode
//!
//! A resolved file is handed to a [`ClassLoader`] at most once per class
//! name. No lock is held while the loader runs, so a loader may resolve
//! other classes (a parent class, an interface). Concurrent resolves of the
//! same name wait for the first one to finish.

use crate::config::{ConfigStore, KNOWN_CLASS_LOCATIONS};
use crate::error::{ConfigError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

/// What to do when a class cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Return `ClassNotFound`.
    #[default]
    FailFast,
    /// Log a warning and return `Ok(None)`.
    BestEffort,
}

/// Loads (executes, includes) a resolved class file.
pub trait ClassLoader: Send + Sync {
    fn load(&self, class: &str, path: &Path) -> Result<()>;
}

/// Loader that records each file and never loads the same path twice.
#[derive(Debug, Default)]
pub struct IncludeOnce {
    included: Mutex<Vec<PathBuf>>,
}

impl IncludeOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files loaded so far, in order.
    pub fn included(&self) -> Vec<PathBuf> {
        self.included
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClassLoader for IncludeOnce {
    fn load(&self, class: &str, path: &Path) -> Result<()> {
        let mut included = self.included.lock().unwrap_or_else(PoisonError::into_inner);
        if included.iter().any(|p| p == path) {
            debug!(class = %class, path = %path.display(), "File already included");
            return Ok(());
        }

        if !path.is_file() {
            return Err(ConfigError::io(
                format!("including {} for class {}", path.display(), class),
                std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        included.push(path.to_path_buf());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LoadState {
    loaded: HashMap<String, PathBuf>,
    /// Names being loaded right now, with the thread loading them.
    loading: HashMap<String, ThreadId>,
}

/// Marks a name as in flight; clears it (and records the result) on drop,
/// even if the loader panics.
struct InFlight<'a> {
    state: &'a Mutex<LoadState>,
    settled: &'a Condvar,
    name: &'a str,
    loaded: Option<PathBuf>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.loading.remove(self.name);
        if let Some(path) = self.loaded.take() {
            state.loaded.insert(self.name.to_string(), path);
        }
        drop(state);
        self.settled.notify_all();
    }
}

/// Maps class names to files through a [`ConfigStore`].
pub struct ClassResolver<L: ClassLoader = IncludeOnce> {
    store: Arc<ConfigStore>,
    loader: L,
    mode: ResolveMode,
    extension: String,
    state: Mutex<LoadState>,
    settled: Condvar,
}

impl ClassResolver<IncludeOnce> {
    /// Resolver with an [`IncludeOnce`] loader.
    pub fn with_include_once(store: Arc<ConfigStore>) -> Self {
        Self::new(store, IncludeOnce::new())
    }
}

impl<L: ClassLoader> ClassResolver<L> {
    pub fn new(store: Arc<ConfigStore>, loader: L) -> Self {
        let extension = store.options().class_extension.clone();
        Self {
            store,
            loader,
            mode: ResolveMode::default(),
            extension,
            state: Mutex::new(LoadState::default()),
            settled: Condvar::new(),
        }
    }

    pub fn with_mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Find the file for `name` without loading it.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        if let Some(known) = self.store.lookup((KNOWN_CLASS_LOCATIONS, name)) {
            match known.as_str() {
                Some(file) => return Some(PathBuf::from(file)),
                None => warn!(class = %name, "Known class location is not a string, ignoring"),
            }
        }

        self.store.file_in_path(format!("{}{}", name, self.extension))
    }

    /// Resolve `name` and load its file once.
    ///
    /// Returns the file that was loaded for `name`. In best-effort mode an
    /// unresolvable name returns `Ok(None)`. A loader that asks for the
    /// class it is currently loading gets the unresolved outcome instead
    /// of waiting on itself.
    pub fn resolve(&self, name: &str) -> Result<Option<PathBuf>> {
        let current = thread::current().id();
        {
            let mut state = self.lock_state();
            loop {
                if let Some(path) = state.loaded.get(name) {
                    return Ok(Some(path.clone()));
                }
                match state.loading.get(name).copied() {
                    None => break,
                    Some(owner) if owner == current => {
                        debug!(class = %name, "Class requested while loading itself");
                        return self.unresolved(name);
                    }
                    Some(_) => {
                        state = self
                            .settled
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                }
            }
            state.loading.insert(name.to_string(), current);
        }

        let mut in_flight = InFlight {
            state: &self.state,
            settled: &self.settled,
            name,
            loaded: None,
        };

        let Some(path) = self.locate(name) else {
            return self.unresolved(name);
        };

        debug!(class = %name, path = %path.display(), "Loading class file");
        self.loader.load(name, &path)?;
        in_flight.loaded = Some(path.clone());
        Ok(Some(path))
    }

    fn unresolved(&self, name: &str) -> Result<Option<PathBuf>> {
        match self.mode {
            ResolveMode::FailFast => Err(ConfigError::class_not_found(name)),
            ResolveMode::BestEffort => {
                warn!("Could not automatically load class \"{}\"", name);
                Ok(None)
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.lock_state().loaded.contains_key(name)
    }

    /// Loaded class names with their files, sorted by name.
    pub fn loaded(&self) -> Vec<(String, PathBuf)> {
        let mut loaded: Vec<_> = self
            .lock_state()
            .loaded
            .iter()
            .map(|(name, path)| (name.clone(), path.clone()))
            .collect();
        loaded.sort_by(|a, b| a.0.cmp(&b.0));
        loaded
    }
}
