//! Addressing of values inside the store.

use serde_json::{Map, Value};
use std::fmt;

/// Where to read in the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Address {
    /// The whole tree.
    #[default]
    Root,
    /// A single top-level key.
    Key(String),
    /// A nested path, one segment per level. Numeric segments index into
    /// sequences.
    Path(Vec<String>),
    /// Several `(section, leaf)` pairs, read as a mapping `leaf → value`.
    Select(Vec<(String, String)>),
}

impl Address {
    pub fn key(key: impl Into<String>) -> Self {
        Address::Key(key.into())
    }

    pub fn path<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Address::Path(segments.into_iter().map(Into::into).collect())
    }

    pub fn select<I, S, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: Into<String>,
    {
        Address::Select(
            pairs
                .into_iter()
                .map(|(section, leaf)| (section.into(), leaf.into()))
                .collect(),
        )
    }

    /// Read the addressed value out of `data`.
    pub(crate) fn resolve(&self, data: &Map<String, Value>) -> Option<Value> {
        match self {
            Address::Root => Some(Value::Object(data.clone())),
            Address::Key(key) => data.get(key).cloned(),
            Address::Path(segments) => {
                if segments.is_empty() {
                    return Some(Value::Object(data.clone()));
                }
                locate(data, segments.as_slice()).cloned()
            }
            Address::Select(pairs) => {
                let mut selected = Map::new();
                for (section, leaf) in pairs {
                    let value = locate(data, &[section.as_str(), leaf.as_str()])?;
                    selected.insert(leaf.clone(), value.clone());
                }
                Some(Value::Object(selected))
            }
        }
    }

    /// Whether the addressed value exists. `Select` requires every pair.
    pub(crate) fn exists(&self, data: &Map<String, Value>) -> bool {
        match self {
            Address::Root => true,
            Address::Key(key) => data.contains_key(key),
            Address::Path(segments) => {
                segments.is_empty() || locate(data, segments.as_slice()).is_some()
            }
            Address::Select(pairs) => pairs
                .iter()
                .all(|(section, leaf)| locate(data, &[section.as_str(), leaf.as_str()]).is_some()),
        }
    }
}

fn locate<'a, S: AsRef<str>>(data: &'a Map<String, Value>, segments: &[S]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = data.get(first.as_ref())?;
    for segment in rest {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Root => write!(f, "<root>"),
            Address::Key(key) => write!(f, "{}", key),
            Address::Path(segments) => {
                let mut iter = segments.iter();
                if let Some(first) = iter.next() {
                    write!(f, "{}", first)?;
                }
                for segment in iter {
                    write!(f, "[{}]", segment)?;
                }
                Ok(())
            }
            Address::Select(pairs) => {
                let rendered: Vec<String> = pairs
                    .iter()
                    .map(|(section, leaf)| format!("{}[{}]", section, leaf))
                    .collect();
                write!(f, "{}", rendered.join(", "))
            }
        }
    }
}

impl From<&str> for Address {
    fn from(key: &str) -> Self {
        if key.is_empty() {
            Address::Root
        } else {
            Address::Key(key.to_string())
        }
    }
}

impl From<String> for Address {
    fn from(key: String) -> Self {
        if key.is_empty() {
            Address::Root
        } else {
            Address::Key(key)
        }
    }
}

impl From<(&str, &str)> for Address {
    fn from((section, leaf): (&str, &str)) -> Self {
        Address::Path(vec![section.to_string(), leaf.to_string()])
    }
}

impl<const N: usize> From<[&str; N]> for Address {
    fn from(segments: [&str; N]) -> Self {
        Address::path(segments)
    }
}

impl From<&[(&str, &str)]> for Address {
    fn from(pairs: &[(&str, &str)]) -> Self {
        Address::select(pairs.iter().copied())
    }
}

impl From<()> for Address {
    fn from(_: ()) -> Self {
        Address::Root
    }
}
