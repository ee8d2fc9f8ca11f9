//! Configuration sources and INI decoding.
//!
//! INI syntax itself is handled by `rust-ini`; this module turns its
//! section/property lists into a JSON tree and applies value typing.

use super::types::ScannerMode;
use crate::error::{ConfigError, Result};
use ini::Ini;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Something `ConfigStore::parse` can ingest.
pub enum Source {
    /// A filename to search for, or literal INI text.
    Name(String),
    /// A file path.
    File(PathBuf),
    /// A readable stream, drained fully before parsing.
    Stream(Box<dyn Read + Send>),
    /// An already drained buffer of INI text.
    Bytes(Vec<u8>),
}

impl Source {
    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        Source::Stream(Box::new(reader))
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Source::File(path) => f.debug_tuple("File").field(path).finish(),
            Source::Stream(_) => f.write_str("Stream(..)"),
            Source::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

impl From<&str> for Source {
    fn from(name: &str) -> Self {
        Source::Name(name.to_string())
    }
}

impl From<String> for Source {
    fn from(name: String) -> Self {
        Source::Name(name)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::File(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::File(path.to_path_buf())
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes)
    }
}

/// Whether `text` looks like INI section syntax rather than a filename.
pub(crate) fn looks_like_ini(text: &str) -> bool {
    text.contains(']')
}

/// Drain a stream into memory. An empty stream is an I/O error.
pub fn drain(mut reader: impl Read) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    reader
        .read_to_end(&mut buffer)
        .map_err(|e| ConfigError::io("draining configuration stream", e))?;

    if buffer.is_empty() {
        return Err(ConfigError::io(
            "draining configuration stream",
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream yielded no data",
            ),
        ));
    }
    Ok(buffer)
}

/// Decode UTF-8 INI bytes.
pub(crate) fn decode(bytes: Vec<u8>, origin: &str) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| ConfigError::parse(origin, e.to_string()))
}

/// Parse INI text into a tree of `section → key → value`.
///
/// A `;` or `#` preceded by whitespace starts a trailing comment.
/// Keys before the first section land at the top level. A key ending in
/// `[]` collects its values into a sequence. Later duplicates of a plain
/// key override earlier ones. An input without any section or key is a
/// parse error.
pub fn parse_ini(text: &str, mode: ScannerMode, origin: &str) -> Result<Map<String, Value>> {
    let ini = Ini::load_from_str(text).map_err(|e| ConfigError::parse(origin, e.to_string()))?;

    let mut tree = Map::new();
    for (section, properties) in &ini {
        let target = match section {
            Some(name) => section_mut(&mut tree, name),
            None => &mut tree,
        };
        for (key, raw) in properties.iter() {
            insert_property(target, key, scalar(raw, mode));
        }
    }

    if tree.is_empty() {
        return Err(ConfigError::parse(origin, "no sections or settings found"));
    }
    Ok(tree)
}

fn section_mut<'a>(tree: &'a mut Map<String, Value>, name: &str) -> &'a mut Map<String, Value> {
    let slot = tree
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        warn!(section = %name, "Section shadows a top-level setting, replacing it");
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just made an object"),
    }
}

fn insert_property(target: &mut Map<String, Value>, key: &str, value: Value) {
    let Some(base) = key.strip_suffix("[]") else {
        target.insert(key.to_string(), value);
        return;
    };

    let slot = target
        .entry(base.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    match slot {
        Value::Array(items) => items.push(value),
        other => {
            let previous = other.take();
            *other = Value::Array(vec![previous, value]);
        }
    }
}

fn scalar(raw: &str, mode: ScannerMode) -> Value {
    match mode {
        ScannerMode::Raw => Value::String(raw.to_string()),
        ScannerMode::Typed => typed(raw),
    }
}

fn typed(raw: &str) -> Value {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => return Value::Bool(true),
        "false" | "off" | "no" | "none" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    // Leading zeros are kept verbatim (modes, zip codes).
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.") {
        return Value::String(raw.to_string());
    }

    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }

    let numeric = !digits.is_empty()
        && digits.bytes().any(|b| b.is_ascii_digit())
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.');
    // Only floats that print back as the same text; anything else
    // (`1.10`, integers beyond i64) would lose digits.
    if numeric
        && let Ok(float) = raw.parse::<f64>()
        && float.to_string() == raw
        && let Some(number) = Number::from_f64(float)
    {
        return Value::Number(number);
    }

    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> Value {
        Value::Object(parse_ini(text, ScannerMode::Typed, "test").unwrap())
    }

    #[test]
    fn test_sections_and_keys() {
        let tree = parse("[servers]\nscript = 10.0.0.1\nmedia = 10.0.0.2\n");
        assert_eq!(
            tree,
            json!({"servers": {"script": "10.0.0.1", "media": "10.0.0.2"}})
        );
    }

    #[test]
    fn test_keys_before_first_section_are_top_level() {
        let tree = parse("debug = on\n[db]\nport = 5432\n");
        assert_eq!(tree, json!({"debug": true, "db": {"port": 5432}}));
    }

    #[test]
    fn test_typed_values() {
        let tree = parse(
            "[t]\na = yes\nb = Off\nc = null\nd = -12\ne = 1.5\nf = 0755\ng = 10.0.0.1\nh = none\n",
        );
        assert_eq!(
            tree,
            json!({"t": {
                "a": true, "b": false, "c": null, "d": -12, "e": 1.5,
                "f": "0755", "g": "10.0.0.1", "h": false
            }})
        );
    }

    #[test]
    fn test_lossy_numbers_stay_strings() {
        let tree = parse("[app]\nversion = 1.10\nid = 123456789012345678901234\nratio = 0.25\n");
        assert_eq!(
            tree,
            json!({"app": {
                "version": "1.10",
                "id": "123456789012345678901234",
                "ratio": 0.25
            }})
        );
    }

    #[test]
    fn test_trailing_comments_are_stripped() {
        let tree = parse("[app]\nnote = a ; trailing comment\ncolor = #ff0000\nport = 8080 ; default\n");
        assert_eq!(
            tree,
            json!({"app": {"note": "a", "color": "#ff0000", "port": 8080}})
        );
    }

    #[test]
    fn test_raw_mode_keeps_strings() {
        let tree = parse_ini("[t]\na = yes\nd = 12\n", ScannerMode::Raw, "test").unwrap();
        assert_eq!(Value::Object(tree), json!({"t": {"a": "yes", "d": "12"}}));
    }

    #[test]
    fn test_bracket_keys_collect_sequences() {
        let tree = parse("[paths]\ndirs[] = /a\ndirs[] = /b\n");
        assert_eq!(tree, json!({"paths": {"dirs": ["/a", "/b"]}}));
    }

    #[test]
    fn test_empty_section_is_kept() {
        let tree = parse("[empty]\n");
        assert_eq!(tree, json!({"empty": {}}));
    }

    #[test]
    fn test_empty_input_is_parse_error() {
        let err = parse_ini("; only a comment\n", ScannerMode::Typed, "test").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_drain_empty_stream_is_io_error() {
        let err = drain(std::io::empty()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_drain_reads_everything() {
        let bytes = drain(&b"[a]\nb = c\n"[..]).unwrap();
        assert_eq!(bytes, b"[a]\nb = c\n");
    }

    #[test]
    fn test_looks_like_ini() {
        assert!(looks_like_ini("[servers]\nscript = a"));
        assert!(!looks_like_ini("servers.ini"));
    }
}
