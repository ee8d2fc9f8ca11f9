//! Process-wide table of immutable constants.
//!
//! Scalar settings can be exported here by
//! [`ConfigStore::define_scalar_constants`](crate::config::ConfigStore::define_scalar_constants).
//! Once defined, a name keeps its value for the life of the table.
//!
//! Uses `arc-swap` so readers never block: every definition publishes a
//! new immutable map.

use arc_swap::ArcSwap;
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

/// Global constant table.
static GLOBAL: LazyLock<Arc<ConstantTable>> = LazyLock::new(|| Arc::new(ConstantTable::new()));

static CONSTANT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("constant name pattern is valid")
});

/// The process-wide constant table.
#[inline]
pub fn global() -> Arc<ConstantTable> {
    Arc::clone(&GLOBAL)
}

/// Whether `name` can be used as a constant name.
pub fn is_valid_name(name: &str) -> bool {
    CONSTANT_NAME.is_match(name)
}

/// Whether `value` can be stored as a constant.
pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Immutable name → scalar bindings.
#[derive(Debug, Default)]
pub struct ConstantTable {
    symbols: ArcSwap<BTreeMap<String, Value>>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `name` as `value`.
    ///
    /// Returns `false` without changing anything when the name is already
    /// defined, is not a valid constant name, or the value is not scalar.
    pub fn define(&self, name: &str, value: &Value) -> bool {
        if !is_valid_name(name) || !is_scalar(value) {
            return false;
        }

        let mut inserted = false;
        self.symbols.rcu(|current| {
            if current.contains_key(name) {
                inserted = false;
                return Arc::clone(current);
            }
            let mut next = BTreeMap::clone(current);
            next.insert(name.to_string(), value.clone());
            inserted = true;
            Arc::new(next)
        });
        inserted
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.symbols.load().get(name).cloned()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.symbols.load().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All current bindings as a JSON mapping.
    pub fn to_map(&self) -> Map<String, Value> {
        self.symbols
            .load()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}
