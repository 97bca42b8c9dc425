//! Persisted record files
//!
//! Generated records live in JSON array files: UTF-8, pretty-printed with
//! 2-space indentation. Loading tolerates a byte-order mark (files touched
//! by Windows editors) and transparently re-saves without it. A top-level
//! single object is normalized to a one-element list.

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{error, warn};

/// One raw record as stored on disk
pub type RawRecord = Map<String, Value>;

/// Load records from a JSON file. Never fails: unreadable or malformed
/// files yield an empty list with a logged error, matching the pipeline's
/// partial-failure posture.
pub fn load_records(path: &Path) -> Vec<RawRecord> {
    if !path.exists() {
        return Vec::new();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(path = %path.display(), "Error reading record file: {e}");
            return Vec::new();
        }
    };

    let had_bom = content.starts_with('\u{feff}');
    let stripped = content.trim_start_matches('\u{feff}');

    let value: Value = match serde_json::from_str(stripped) {
        Ok(value) => value,
        Err(e) => {
            error!(path = %path.display(), "Error parsing record file: {e}");
            return Vec::new();
        }
    };

    let records = normalize(value, path);

    if had_bom {
        // Rewrite so subsequent loads see clean UTF-8.
        if let Err(e) = save_records(path, &records) {
            warn!(path = %path.display(), "Could not re-save BOM-stripped file: {e}");
        }
    }

    records
}

/// Save records as a pretty-printed JSON array, creating parent
/// directories as needed.
pub fn save_records(path: &Path, records: &[RawRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(records).map_err(|e| Error::DataFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    std::fs::write(path, json)?;
    Ok(())
}

fn normalize(value: Value, path: &Path) -> Vec<RawRecord> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                other => {
                    warn!(path = %path.display(), "Skipping non-object entry: {other}");
                    None
                }
            })
            .collect(),
        Value::Object(map) => vec![map],
        _ => {
            warn!(path = %path.display(), "Unexpected data format in record file");
            Vec::new()
        }
    }
}
