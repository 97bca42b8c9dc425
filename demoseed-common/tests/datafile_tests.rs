//! Record file round-trip and normalization tests

use demoseed_common::datafile::{load_records, save_records, RawRecord};
use serde_json::json;

fn record(name: &str) -> RawRecord {
    match json!({ "name": name }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");

    let records = vec![record("Acme"), record("Globex")];
    save_records(&path, &records).unwrap();

    let loaded = load_records(&path);
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0]["name"], "Acme");

    // Pretty-printed with 2-space indentation
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\n  {"));
}

#[test]
fn missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_records(&dir.path().join("absent.json")).is_empty());
}

#[test]
fn malformed_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(load_records(&path).is_empty());
}

#[test]
fn single_object_is_normalized_to_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("single.json");
    std::fs::write(&path, r#"{"name": "Solo"}"#).unwrap();

    let loaded = load_records(&path);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0]["name"], "Solo");
}

#[test]
fn bom_is_tolerated_and_stripped_on_resave() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bom.json");
    std::fs::write(&path, "\u{feff}[{\"name\": \"Acme\"}]").unwrap();

    let loaded = load_records(&path);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0]["name"], "Acme");

    // The file was re-saved without the BOM
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.starts_with('\u{feff}'));
    assert_eq!(load_records(&path).len(), 1);
}

#[test]
fn non_object_entries_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.json");
    std::fs::write(&path, r#"[{"name": "Keep"}, 42, "stray"]"#).unwrap();

    let loaded = load_records(&path);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0]["name"], "Keep");
}
