//! File resolution against the include path.
//!
//! The search path is configuration data itself: the `include_path`
//! directive carries a global and a local (override) component, each a
//! separator-delimited list of directories. Both are searched in order,
//! first found wins.

use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Component names inside an `include_path` directive, in search order.
const PATH_COMPONENTS: [&str; 2] = ["global_value", "local_value"];

/// Collect the search directories from an `include_path` value.
///
/// Accepts the directive form (`{global_value, local_value}`), a plain
/// string, or a sequence of strings. Empty entries are dropped and
/// duplicates removed, keeping the first occurrence.
pub fn search_dirs(include_path: &Value, separator: char) -> Vec<String> {
    let lists: Vec<&str> = match include_path {
        Value::Object(directive) => PATH_COMPONENTS
            .iter()
            .filter_map(|component| directive.get(*component).and_then(Value::as_str))
            .collect(),
        Value::String(list) => vec![list.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flat_map(|list| list.split(separator))
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .filter(|dir| seen.insert(dir.to_string()))
        .map(str::to_string)
        .collect()
}

/// Find `file` in the first directory of `dirs` that contains it.
pub fn find_in_dirs(file: &Path, dirs: &[String]) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| Path::new(dir).join(file))
        .find(|candidate| candidate.exists())
}
