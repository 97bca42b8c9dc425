//! Structured record extraction from completion output
//!
//! The model is asked for a JSON array but rarely returns only that: the
//! array arrives wrapped in prose, inside a markdown fence, or cut off
//! mid-object when the token budget ran out. Extraction runs a chain of
//! narrowing and repair steps and only gives up when no array-shaped JSON
//! is plausibly present. String-aware bracket counting keeps a literal `]`
//! inside a quoted value from terminating the array early.

use demoseed_common::datafile::RawRecord;
use demoseed_common::{Error, Result};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Phrases models put directly before an unfenced array.
const PREAMBLE_PHRASES: [&str; 4] = ["Here's", "Here is", "JSON:", "Array:"];

/// Recover a list of records from free-form completion output.
///
/// Fails with [`Error::Extraction`] when no array start or no plausible
/// array end can be located, or when the text between them cannot be
/// parsed even after repair.
pub fn extract_records(raw: &str) -> Result<Vec<RawRecord>> {
    let (text, start) = locate_array_start(raw)?;
    let end = locate_array_end(text, start)?;
    let json_str = sanitize(&text[start..end]);
    parse_with_repair(&json_str)
}

/// Narrow to a fenced block when one exists, then find the opening `[`.
fn locate_array_start(raw: &str) -> Result<(&str, usize)> {
    if let Some(inner) = fenced_contents(raw) {
        if let Some(pos) = inner.find('[') {
            return Ok((&inner[pos..], 0));
        }
        // Fence without an array; fall back to scanning the full text.
    }

    if let Some(pos) = raw.find('[') {
        return Ok((raw, pos));
    }

    for phrase in PREAMBLE_PHRASES {
        if let Some(idx) = raw.find(&format!("{phrase}[")) {
            return Ok((raw, idx + phrase.len()));
        }
    }

    warn!("No JSON array found in completion output");
    Err(Error::extraction("no JSON array found in response", raw))
}

fn fenced_contents(raw: &str) -> Option<&str> {
    let fence = Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok()?;
    fence
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Find the exclusive end of the array opening at `start`.
fn locate_array_end(text: &str, start: usize) -> Result<usize> {
    let closes = depth_zero_closes(&text[start..]);
    // Later depth-zero closes can only belong to a second array in the
    // same output; the first close ends the array we started in.
    if let Some(first) = closes.first() {
        return Ok(start + first);
    }

    // Truncated output never returns to depth zero. Prefer the last
    // literal `]`; failing that, keep the remainder and let the repair
    // pass re-close the array, provided at least one object completed.
    if let Some(pos) = text[start..].rfind(']') {
        return Ok(start + pos + 1);
    }
    if text[start..].contains('}') {
        debug!("Array close missing, deferring to repair pass");
        return Ok(text.len());
    }

    warn!("No valid JSON array ending found");
    Err(Error::extraction(
        "no valid JSON array ending found",
        &text[start..],
    ))
}

/// Byte offsets (exclusive) at which bracket depth returns to zero,
/// scanning from an opening `[` at offset zero. Double-quoted spans are
/// skipped; a `\`-escaped quote does not toggle string mode.
fn depth_zero_closes(text: &str) -> Vec<usize> {
    let mut closes = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' => escape_next = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    closes.push(i + 1);
                }
            }
            _ => {}
        }
    }

    closes
}

/// Strip control characters, collapse whitespace runs, and drop trailing
/// commas before a closing bracket or brace.
fn sanitize(extracted: &str) -> String {
    let mut text = extracted.trim().to_string();
    if let Ok(control) = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]") {
        text = control.replace_all(&text, " ").into_owned();
    }
    if let Ok(whitespace) = Regex::new(r"\s+") {
        text = whitespace.replace_all(&text, " ").into_owned();
    }
    if let Ok(trailing_comma) = Regex::new(r",(\s*[}\]])") {
        text = trailing_comma.replace_all(&text, "$1").into_owned();
    }
    text
}

fn parse_with_repair(json_str: &str) -> Result<Vec<RawRecord>> {
    match serde_json::from_str::<Value>(json_str) {
        Ok(value) => Ok(records_from_value(value)),
        Err(parse_err) => {
            warn!("Initial JSON parse failed, attempting repair: {parse_err}");

            // Truncate to the last complete object boundary and re-close.
            if let Some(pos) = json_str.rfind('}') {
                if pos > 0 {
                    let repaired = format!("{}]", &json_str[..=pos]);
                    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
                        info!("Parsed truncated array after re-closing");
                        return Ok(records_from_value(value));
                    }
                }
            }

            Err(Error::extraction(
                format!("JSON parse failed: {parse_err}"),
                json_str,
            ))
        }
    }
}

fn records_from_value(value: Value) -> Vec<RawRecord> {
    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            other => {
                warn!("Discarding non-object array element: {other}");
                None
            }
        })
        .collect()
}
