//! Synthetic temporal backfill
//!
//! The remote form interface cannot set creation or modification
//! timestamps, so after submission every accepted record gets a synthetic
//! pair written straight to the datastore. Two signals are blended per
//! record: a position-based target that spreads the batch roughly
//! uniformly across the lookback window, and (when a prior run's file
//! carries one) a reference date that preserves whatever authentic
//! ordering the source data encodes. All variation is derived from the
//! record's index with small modular-arithmetic steps, so the same batch
//! always reproduces the same calendar.
//!
//! Planning never fails. Every branch re-validates the two invariants
//! (`created <= now`, `modified >= created`) because the arithmetic can
//! independently violate either.

use crate::models::{HistoricalWindow, SeededRecord, TemporalAssignment};
use chrono::{Datelike, Duration, NaiveDateTime, Timelike, Weekday};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Reference timestamps carried by a prior run's record file, keyed by
/// record name. Raw strings; unparseable values degrade to the default
/// distribution.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDates {
    pub created: Option<String>,
    pub modified: Option<String>,
}

/// Knobs for one backfill pass
#[derive(Debug, Clone, Default)]
pub struct BackfillOptions {
    /// Shuffle batch indices before deriving dates, so file order and
    /// calendar order decouple.
    pub shuffle: bool,
    /// Fixed seed for the shuffle; unseeded shuffles differ run to run.
    pub shuffle_seed: Option<u64>,
    /// Move synthesized creation dates off weekends.
    pub business_days_only: bool,
}

/// Already-assigned second-granularity timestamps for one datastore column
pub type UsedTimestamps = HashSet<NaiveDateTime>;

/// Timestamp format the target application exports reference dates in
const REFERENCE_FORMAT: &str = "%d-%m-%y %I:%M %p";

/// Parse a reference date from a prior run's file.
pub fn parse_reference_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), REFERENCE_FORMAT).ok()
}

/// Compute a creation and modification timestamp for every seeded record
/// that received an identifier. Pure; safe to re-run over the same input.
pub fn plan_assignments(
    seeded: &[SeededRecord],
    window: &HistoricalWindow,
    originals: &HashMap<String, ReferenceDates>,
    options: &BackfillOptions,
) -> Vec<TemporalAssignment> {
    let total = seeded.len();
    let index_map = index_mapping(total, options);
    let now = window.now;
    let days_range = window.lookback_days;

    let mut assignments = Vec::new();

    for (position, record) in seeded.iter().enumerate() {
        let Some(entity_id) = record.entity_id else {
            continue;
        };
        if !record.succeeded() {
            continue;
        }

        let idx = index_map[position] as i64;
        let reference = record.original.name().and_then(|name| originals.get(name));
        let ref_created = reference
            .and_then(|r| r.created.as_deref())
            .and_then(parse_reference_datetime);
        let ref_modified = reference
            .and_then(|r| r.modified.as_deref())
            .and_then(parse_reference_datetime);

        let tod = creation_time_of_day(idx);

        let mut created = match ref_created {
            Some(parsed) => blended_creation(parsed, idx, total, window, tod),
            None => positional_creation(idx, total, days_range, now, tod),
        };

        if options.business_days_only {
            created = skip_weekend(created);
            if created > now - Duration::days(1) {
                created = at_time(now - Duration::days(1), tod);
            }
        }

        let mod_tod = modification_time_of_day(created, idx);

        let mut modified = match ref_modified {
            // An authentic modification signal is trusted as-is, unlike
            // creation dates, which still get spread across the window.
            Some(parsed) => parsed.min(now),
            None => derived_modification(created, idx, total, now, mod_tod),
        };

        // Invariant pass, unconditional: the branches above can each
        // violate one bound while satisfying the other.
        if modified < created {
            modified = at_time(
                created + Duration::days(1),
                modification_time_of_day(created, idx),
            );
        }
        if created > now {
            created = at_time(now - Duration::days(1), tod);
            if modified <= created {
                modified = at_time(
                    created + Duration::days(1),
                    modification_time_of_day(created, idx),
                );
            }
            if modified > now {
                modified = now;
            }
        }
        if modified > now {
            modified = (created + Duration::days(1)).min(now);
            if modified < created {
                modified = created;
            }
        }

        assignments.push(TemporalAssignment {
            entity_id,
            created_at: created,
            modified_at: modified,
        });
    }

    assignments
}

/// Identity mapping, or a (possibly seeded) permutation of batch indices.
fn index_mapping(total: usize, options: &BackfillOptions) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..total).collect();
    if options.shuffle && total > 1 {
        let mut rng = match options.shuffle_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        rng.shuffle(&mut indices);
    }
    indices
}

/// Creation date when a reference creation date exists: blend the
/// reference offset (30%) with the position target (70%), then clamp
/// into the window and below `now - 1 day`.
fn blended_creation(
    parsed: NaiveDateTime,
    idx: i64,
    total: usize,
    window: &HistoricalWindow,
    tod: TimeParts,
) -> NaiveDateTime {
    let now = window.now;
    let min_date = window.min_date();
    let days_range = window.lookback_days;

    let parsed = if parsed > now {
        now - Duration::days(1)
    } else {
        parsed
    };

    let days_offset = if total > 1 {
        let linear = (idx as f64 / (total as f64 - 1.0)) * days_range as f64;
        let divisor = (days_range / 10).max(10);
        let variation = (idx * 17) % divisor;
        (linear + variation as f64) as i64
    } else {
        days_range / 2
    };

    let days_from_parsed = (parsed - min_date).num_days().clamp(0, days_range);
    let blended = ((0.3 * days_from_parsed as f64) + (0.7 * days_offset as f64)) as i64;
    let blended = blended.clamp(0, days_range);

    let mut date = min_date + Duration::days(blended);
    if date > now {
        date = now - Duration::days(1);
    }
    if date < min_date {
        date = min_date;
    }

    let mut date = at_time(date, tod);
    if date > now {
        date = at_time(now - Duration::days(1), tod);
    }
    date
}

/// Creation date with no reference signal: pure position target over
/// `[1, days_range]` days ago.
fn positional_creation(
    idx: i64,
    total: usize,
    days_range: i64,
    now: NaiveDateTime,
    tod: TimeParts,
) -> NaiveDateTime {
    let days_ago = if total > 1 {
        let linear = 1.0 + (idx as f64 / (total as f64 - 1.0)) * (days_range as f64 - 1.0);
        let divisor = (days_range / 20).max(10);
        let variation = (idx * 17) % divisor;
        (linear + variation as f64) as i64
    } else {
        days_range / 2
    };
    let days_ago = days_ago.clamp(1, days_range);

    let mut date = at_time(now - Duration::days(days_ago), tod);
    if date > now {
        date = at_time(now - Duration::days(1), tod);
    }
    date
}

/// Modification date derived from creation: a `[1, 180]`-day offset,
/// progressively narrowed until it fits before `now`.
fn derived_modification(
    created: NaiveDateTime,
    idx: i64,
    total: usize,
    now: NaiveDateTime,
    mod_tod: TimeParts,
) -> NaiveDateTime {
    let target_days = modification_days(idx, total);
    let modified = at_time(created + Duration::days(target_days), mod_tod);
    if modified <= now {
        return modified;
    }

    let max_days = (now - created).num_days();
    if max_days > 0 {
        // Recompute over the days actually available.
        let days = narrowed_modification_days(idx, total, max_days);
        let mut modified = created + Duration::days(days);
        if modified <= now {
            return at_time(modified, mod_tod);
        }
        let capped = TimeParts {
            hour: (created.hour() + 1).min(17),
            ..mod_tod
        };
        modified = at_time(modified, capped);
        if modified > now {
            modified = with_second_and_micro(now, mod_tod.second, mod_tod.micro);
        }
        modified
    } else if created.date() == now.date() {
        // Same-day record: modification within hours of creation.
        let hours_offset = 1 + (idx % 2);
        let mut modified = created
            + Duration::hours(hours_offset)
            + Duration::seconds(mod_tod.second as i64);
        modified = with_micro(modified, mod_tod.micro);
        if modified > now {
            modified = with_micro(
                created + Duration::seconds(mod_tod.second as i64),
                mod_tod.micro,
            );
            if modified > now {
                modified = created;
            }
        }
        modified
    } else {
        created
    }
}

fn modification_days(idx: i64, total: usize) -> i64 {
    let days = if total > 1 {
        let linear = 1.0 + (idx as f64 / (total as f64 - 1.0)) * 179.0;
        let variation = (idx * 13) % 7;
        (linear + variation as f64) as i64
    } else {
        30
    };
    days.clamp(1, 180)
}

fn narrowed_modification_days(idx: i64, total: usize, max_days: i64) -> i64 {
    let days = if total > 1 {
        let linear = 1.0 + (idx as f64 / (total as f64 - 1.0)) * (max_days as f64 - 1.0);
        let divisor = (max_days / 10).clamp(1, 7);
        let variation = (idx * 13) % divisor;
        (linear + variation as f64) as i64
    } else {
        (max_days / 2).max(1)
    };
    days.clamp(1, max_days)
}

/// Intra-day time synthesized from the record index: hour confined to
/// business hours, the rest varied by small index multiples so batches
/// don't share identical clock ticks.
#[derive(Debug, Clone, Copy)]
struct TimeParts {
    hour: u32,
    minute: u32,
    second: u32,
    micro: u32,
}

fn creation_time_of_day(idx: i64) -> TimeParts {
    TimeParts {
        hour: (8 + (idx * 7) % 10).clamp(8, 17) as u32,
        minute: ((idx * 11) % 60) as u32,
        second: ((idx * 19) % 60) as u32,
        micro: ((idx * 23) % 1_000_000) as u32,
    }
}

/// Modification time derived from the creation timestamp's own fields, so
/// the pair stays correlated.
fn modification_time_of_day(created: NaiveDateTime, idx: i64) -> TimeParts {
    TimeParts {
        hour: (8 + (created.hour() as i64 + idx * 7) % 10).clamp(8, 17) as u32,
        minute: ((created.minute() as i64 + idx * 11) % 60) as u32,
        second: ((created.second() as i64 + idx * 19) % 60) as u32,
        micro: ((idx * 29) % 1_000_000) as u32,
    }
}

fn at_time(date: NaiveDateTime, t: TimeParts) -> NaiveDateTime {
    date.date()
        .and_hms_micro_opt(t.hour, t.minute, t.second, t.micro)
        .unwrap_or(date)
}

fn with_micro(date: NaiveDateTime, micro: u32) -> NaiveDateTime {
    date.with_nanosecond(micro * 1000).unwrap_or(date)
}

fn with_second_and_micro(date: NaiveDateTime, second: u32, micro: u32) -> NaiveDateTime {
    let date = date.with_second(second).unwrap_or(date);
    with_micro(date, micro)
}

/// Move a weekend date to the following Monday.
pub fn skip_weekend(date: NaiveDateTime) -> NaiveDateTime {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Return `desired` (at second granularity) if unused, else probe
/// second-by-second for a free slot: forward up to one day, switching to
/// backward probing when the forward candidate would exceed `max_date`.
/// When the probe budget runs out the collision is accepted and logged
/// rather than failing the batch.
pub fn ensure_unique_datetime(
    desired: NaiveDateTime,
    used: &mut UsedTimestamps,
    min_date: Option<NaiveDateTime>,
    max_date: Option<NaiveDateTime>,
    column: &str,
) -> NaiveDateTime {
    let mut date = desired.with_nanosecond(0).unwrap_or(desired);
    if let Some(max) = max_date {
        if date > max {
            date = max;
        }
    }
    if let Some(min) = min_date {
        if date < min {
            date = min;
        }
    }

    if used.insert(date) {
        return date;
    }

    let original = date;
    let mut candidate = date;
    const MAX_ATTEMPTS: i64 = 86_400; // one day of seconds

    for attempt in 1..=MAX_ATTEMPTS {
        candidate = original + Duration::seconds(attempt);
        if let Some(max) = max_date {
            if candidate > max {
                candidate = original - Duration::seconds(attempt);
                if let Some(min) = min_date {
                    if candidate < min {
                        warn!(column, "Cannot find unique timestamp within bounds");
                        break;
                    }
                }
            }
        }
        if used.insert(candidate) {
            return candidate;
        }
    }

    warn!(column, "Unique timestamp probe exhausted, accepting collision");
    used.insert(candidate);
    candidate
}
