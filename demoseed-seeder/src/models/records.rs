//! Record types for one seeding run
//!
//! A batch moves through three shapes: [`CandidateRecord`] (generated or
//! loaded, not yet submitted), [`SeededRecord`] (one per submission
//! attempt), and [`TemporalAssignment`] (the synthetic dates written back
//! for each record the remote system accepted).

use chrono::{Duration, NaiveDateTime};
use demoseed_common::datafile::RawRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A generated or loaded record not yet submitted to the remote system.
///
/// The payload is an untyped field map; only `name` has meaning to the
/// pipeline itself (deduplication key, reference-date lookup key).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateRecord(RawRecord);

impl CandidateRecord {
    pub fn new(fields: RawRecord) -> Self {
        CandidateRecord(fields)
    }

    /// Trimmed, non-empty name, when the record carries one.
    pub fn name(&self) -> Option<&str> {
        match self.0.get("name") {
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &RawRecord {
        &self.0
    }

    pub fn into_fields(self) -> RawRecord {
        self.0
    }
}

impl From<RawRecord> for CandidateRecord {
    fn from(fields: RawRecord) -> Self {
        CandidateRecord(fields)
    }
}

/// Outcome of a remote submission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedStatus {
    Succeeded,
    Failed,
}

/// One record after its submission attempt.
///
/// `entity_id` is None either because the submission failed or because the
/// response carried no extractable identifier; in both cases the record is
/// excluded from backfill.
#[derive(Debug, Clone)]
pub struct SeededRecord {
    pub original: CandidateRecord,
    pub entity_id: Option<i64>,
    pub status: SeedStatus,
}

impl SeededRecord {
    pub fn succeeded(&self) -> bool {
        self.status == SeedStatus::Succeeded
    }
}

/// Synthetic dates for one seeded record, consumed by a single bulk
/// datastore update and never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalAssignment {
    pub entity_id: i64,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

/// The historical range synthetic creation dates are distributed across.
#[derive(Debug, Clone, Copy)]
pub struct HistoricalWindow {
    /// Clock of the run; every assignment stays at or before this.
    pub now: NaiveDateTime,
    pub lookback_days: i64,
}

impl HistoricalWindow {
    pub fn new(now: NaiveDateTime, lookback_days: i64) -> Self {
        HistoricalWindow {
            now,
            lookback_days: lookback_days.max(1),
        }
    }

    pub fn min_date(&self) -> NaiveDateTime {
        self.now - Duration::days(self.lookback_days)
    }
}

/// Per-kind totals reported once at the end of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub kind: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> CandidateRecord {
        match value {
            Value::Object(map) => CandidateRecord::new(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn name_is_trimmed() {
        let rec = record(json!({ "name": "  Acme Corp  " }));
        assert_eq!(rec.name(), Some("Acme Corp"));
    }

    #[test]
    fn blank_or_missing_name_is_none() {
        assert_eq!(record(json!({ "name": "   " })).name(), None);
        assert_eq!(record(json!({ "label": "x" })).name(), None);
        assert_eq!(record(json!({ "name": 42 })).name(), None);
    }

    #[test]
    fn window_min_date_spans_lookback() {
        let now = NaiveDateTime::parse_from_str("2025-06-16 12:00:00", "%Y-%m-%d %H:%M:%S")
            .expect("valid datetime");
        let window = HistoricalWindow::new(now, 30);
        assert_eq!(window.min_date(), now - Duration::days(30));
    }
}
