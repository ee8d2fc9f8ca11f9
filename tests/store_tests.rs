//! Integration tests for the configuration store.
//!
//! Covers parsing through the include path, merge behaviour, addressed
//! reads, and stream handling:
//! - parse() / parse_and_return() with files, INI text and streams
//! - get() / defined() / to_json() / peek()
//! - file_in_path()
//! - parse_with_deadline()

use bootstrap_config::config::{Address, ConfigStore, ScannerMode, Source, StoreOptions};
use bootstrap_config::error::{ConfigError, ErrorCode};
use bootstrap_config::runtime::StaticSnapshot;
use serde_json::{Map, json};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SERVERS_INI: &str = "[servers]\nscript = 10.0.0.1\nmedia = 10.0.0.2\n";

/// Helper to create a store whose local include path is `dir`.
fn store_in(dir: &Path) -> ConfigStore {
    let snapshot = StaticSnapshot::new().with_include_path(".", dir.to_string_lossy());
    ConfigStore::new(Arc::new(snapshot), StoreOptions::default())
}

fn mapping(value: serde_json::Value) -> Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a mapping, got {}", other),
    }
}

/// Reader that stalls once, then yields its content across as many reads
/// as the caller needs.
struct SlowReader {
    delay: Duration,
    content: &'static [u8],
    offset: usize,
}

impl SlowReader {
    fn new(delay: Duration, content: &'static str) -> Self {
        Self {
            delay,
            content: content.as_bytes(),
            offset: 0,
        }
    }
}

impl Read for SlowReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.offset == 0 {
            std::thread::sleep(self.delay);
        }
        let rest = &self.content[self.offset..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.offset += n;
        Ok(n)
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_file_on_include_path() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("servers.ini"), SERVERS_INI).unwrap();
    let store = store_in(temp.path());

    store.parse("servers.ini").unwrap();

    assert_eq!(
        store.get("servers").unwrap(),
        json!({"script": "10.0.0.1", "media": "10.0.0.2"})
    );
    let scanned = store.scanned_files();
    assert_eq!(scanned.len(), 1);
    assert!(scanned[0].ends_with("servers.ini"));
}

#[test]
fn test_parse_twice_is_idempotent() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("servers.ini"), SERVERS_INI).unwrap();
    let store = store_in(temp.path());

    store.parse("servers.ini").unwrap();
    let first = store.to_json(Address::Root).unwrap();
    store.parse("servers.ini").unwrap();
    let second = store.to_json(Address::Root).unwrap();

    assert_eq!(first, second);
    assert_eq!(store.scanned_files().len(), 1);
}

#[test]
fn test_sections_merge_additively() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());

    store.parse("[servers]\nscript = 10.0.0.1").unwrap();
    store.parse("[servers]\nmedia = 10.0.0.2").unwrap();

    assert_eq!(
        store.get("servers").unwrap(),
        json!({"script": "10.0.0.1", "media": "10.0.0.2"})
    );
}

#[test]
fn test_later_values_override() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());

    store.parse(SERVERS_INI).unwrap();
    store.parse("[servers]\nscript = 10.0.0.9").unwrap();

    assert_eq!(
        store.get(("servers", "script")).unwrap(),
        json!("10.0.0.9")
    );
    assert_eq!(store.get(("servers", "media")).unwrap(), json!("10.0.0.2"));
}

#[test]
fn test_put_replaces_mapping_with_scalar() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());

    store.parse(SERVERS_INI).unwrap();
    store.put(mapping(json!({"servers": "maintenance"})));

    assert_eq!(store.get("servers").unwrap(), json!("maintenance"));
    assert!(!store.defined(("servers", "script")));
}

#[test]
fn test_parse_and_return_gives_parsed_mapping() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());
    store.parse(SERVERS_INI).unwrap();

    let parsed = store
        .parse_and_return("[servers]\nbackup = 10.0.0.3")
        .unwrap();

    assert_eq!(parsed, mapping(json!({"servers": {"backup": "10.0.0.3"}})));
    assert_eq!(
        store.get("servers").unwrap(),
        json!({"script": "10.0.0.1", "media": "10.0.0.2", "backup": "10.0.0.3"})
    );
}

#[test]
fn test_typed_and_raw_scanner_modes() {
    let text = "[limits]\nworkers = 8\nratio = 0.5\nenabled = on\nmode = 0755\n";

    let temp = TempDir::new().unwrap();
    let typed = store_in(temp.path());
    typed.parse(text).unwrap();
    assert_eq!(
        typed.get("limits").unwrap(),
        json!({"workers": 8, "ratio": 0.5, "enabled": true, "mode": "0755"})
    );

    let options = StoreOptions {
        scanner_mode: ScannerMode::Raw,
        ..StoreOptions::default()
    };
    let raw = ConfigStore::new(Arc::new(StaticSnapshot::new()), options);
    raw.parse(text).unwrap();
    assert_eq!(raw.get(("limits", "workers")).unwrap(), json!("8"));
    assert_eq!(raw.get(("limits", "enabled")).unwrap(), json!("on"));
}

#[test]
fn test_ambiguous_name_is_parse_error() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());

    let err = store.parse("definitely-not-here.ini").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.code(), ErrorCode::ParseError);
}

#[test]
fn test_missing_file_source_is_io_error() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());

    let err = store
        .parse(temp.path().join("missing.ini").as_path())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::IoError);
}

#[test]
fn test_empty_stream_is_io_error() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());
    let before = store.to_json(Address::Root).unwrap();

    let err = store.parse(Source::stream(std::io::empty())).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert_eq!(store.to_json(Address::Root).unwrap(), before);
}

#[test]
fn test_stream_is_parsed_but_not_recorded() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());

    store
        .parse(Source::stream(std::io::Cursor::new(SERVERS_INI)))
        .unwrap();

    assert_eq!(store.get(("servers", "media")).unwrap(), json!("10.0.0.2"));
    assert!(store.scanned_files().is_empty());
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn test_defined_on_paths() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());
    store.parse(SERVERS_INI).unwrap();

    assert!(store.defined("servers"));
    assert!(store.defined(("servers", "script")));
    assert!(!store.defined(("servers", "backup")));
    assert!(!store.defined("databases"));
}

#[test]
fn test_missing_key_is_not_found() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());

    let err = store.get(("servers", "script")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
    assert!(store.lookup("servers").is_none());
}

#[test]
fn test_select_reads_several_leaves() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());
    store.parse(SERVERS_INI).unwrap();
    store.parse("[database]\nhost = db.internal").unwrap();

    let selected = store
        .get(Address::select([("servers", "script"), ("database", "host")]))
        .unwrap();
    assert_eq!(
        selected,
        json!({"script": "10.0.0.1", "host": "db.internal"})
    );
}

#[test]
fn test_to_json_of_section() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());
    store.parse(SERVERS_INI).unwrap();

    assert_eq!(
        store.to_json("servers").unwrap(),
        r#"{"script":"10.0.0.1","media":"10.0.0.2"}"#
    );
}

#[test]
fn test_peek_lists_top_level_keys() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());
    store.parse(SERVERS_INI).unwrap();

    let keys = store.peek();
    assert!(keys.contains(&"config".to_string()));
    assert!(keys.contains(&"include_path".to_string()));
    assert_eq!(keys.last().map(String::as_str), Some("servers"));
}

#[test]
fn test_display_round_trips_through_restore() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());
    store.parse(SERVERS_INI).unwrap();

    let restored = ConfigStore::restore(
        &store.to_string(),
        Arc::new(StaticSnapshot::new()),
        StoreOptions::default(),
    )
    .unwrap();
    assert_eq!(
        restored.get("servers").unwrap(),
        store.get("servers").unwrap()
    );
}

// ============================================================================
// File search
// ============================================================================

#[test]
fn test_file_in_path_returns_existing_path_unchanged() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("servers.ini");
    fs::write(&file, SERVERS_INI).unwrap();
    let store = store_in(temp.path());

    assert_eq!(store.file_in_path(&file), Some(file.clone()));
    assert_eq!(store.file_in_path("servers.ini"), Some(file));
}

#[test]
fn test_file_in_path_absent() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());

    assert_eq!(store.file_in_path("nowhere.ini"), None);
    assert_eq!(store.file_in_path(""), None);
}

#[test]
fn test_local_include_path_override() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    fs::write(second.path().join("extra.ini"), "[extra]\nready = yes").unwrap();
    let store = store_in(first.path());

    assert_eq!(store.file_in_path("extra.ini"), None);
    store.set(
        "include_path",
        json!({"local_value": second.path().to_string_lossy()}),
    );
    store.parse("extra.ini").unwrap();
    assert_eq!(store.get(("extra", "ready")).unwrap(), json!(true));
}

// ============================================================================
// Deadline reads
// ============================================================================

#[tokio::test]
async fn test_parse_with_deadline_succeeds() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());
    let long_ini = "[servers]\nscript = 10.0.0.1\nmedia = 10.0.0.2\nbackup = 10.0.0.3\nmonitor = 10.0.0.4\n";
    let reader = SlowReader::new(Duration::from_millis(10), long_ini);

    let parsed = store
        .parse_with_deadline(reader, Duration::from_secs(5))
        .await
        .unwrap();

    assert!(parsed.contains_key("servers"));
    assert_eq!(store.get(("servers", "script")).unwrap(), json!("10.0.0.1"));
    assert_eq!(store.get(("servers", "monitor")).unwrap(), json!("10.0.0.4"));
}

#[tokio::test]
async fn test_parse_with_deadline_times_out() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());
    let reader = SlowReader::new(Duration::from_millis(500), SERVERS_INI);

    let err = store
        .parse_with_deadline(reader, Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, ConfigError::Timeout(_)));
    assert_eq!(err.code(), ErrorCode::Timeout);
    assert!(!store.defined("servers"));
}
