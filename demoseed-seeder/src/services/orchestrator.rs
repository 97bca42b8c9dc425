//! Seeding orchestration
//!
//! Drives one batch end to end: dedup → remote submission with bounded
//! retry → identifier extraction → temporal backfill → ownership backfill
//! → summary. One bad record never aborts the batch; datastore failures
//! do, because a half-applied bulk update is worse than a clean stop.

use crate::db;
use crate::models::{
    CandidateRecord, HistoricalWindow, RunSummary, SeedStatus, SeededRecord, TemporalAssignment,
};
use crate::services::date_backfill::{
    ensure_unique_datetime, plan_assignments, BackfillOptions, ReferenceDates, UsedTimestamps,
};
use crate::services::entity_adapter::EntityAdapter;
use crate::SeedContext;
use demoseed_common::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};

/// Sequences one entity kind's batch through the full pipeline.
pub struct SeedingOrchestrator<'a> {
    ctx: &'a SeedContext,
}

impl<'a> SeedingOrchestrator<'a> {
    pub fn new(ctx: &'a SeedContext) -> Self {
        SeedingOrchestrator { ctx }
    }

    pub async fn run(
        &self,
        adapter: &dyn EntityAdapter,
        candidates: Vec<CandidateRecord>,
    ) -> Result<RunSummary> {
        let unique = dedupe_candidates(candidates);
        let attempted = unique.len();
        info!(kind = adapter.kind(), records = attempted, "Seeding batch");

        let originals = reference_dates_by_name(&unique, adapter);
        let seeded = self.submit_all(adapter, unique).await;

        let succeeded = seeded.iter().filter(|r| r.succeeded()).count();
        let failed = attempted - succeeded;

        self.backfill_dates(adapter, &seeded, &originals).await?;
        self.backfill_owners(adapter, &seeded).await?;

        let summary = RunSummary {
            kind: adapter.kind().to_string(),
            attempted,
            succeeded,
            failed,
        };
        info!(
            kind = adapter.kind(),
            attempted, succeeded, failed, "Batch complete"
        );
        Ok(summary)
    }

    /// Submit every record; the batch never short-circuits on individual
    /// failures.
    async fn submit_all(
        &self,
        adapter: &dyn EntityAdapter,
        records: Vec<CandidateRecord>,
    ) -> Vec<SeededRecord> {
        let mut seeded = Vec::with_capacity(records.len());

        for record in records {
            let name = record.name().unwrap_or("<unnamed>").to_string();
            let fields = adapter.form_fields(&record);

            match self
                .ctx
                .app
                .submit_form(adapter.endpoint(), &fields, adapter.multipart())
                .await
            {
                Ok(response) if response.accepted() => {
                    let entity_id = adapter.id_rules().extract(&response.final_url, &response.body);
                    if entity_id.is_none() {
                        // Ambiguous success: the application took the
                        // record but we cannot address it for backfill.
                        warn!(
                            kind = adapter.kind(),
                            record = %name,
                            "Submission accepted but no identifier extracted; excluded from backfill"
                        );
                    }
                    seeded.push(SeededRecord {
                        original: record,
                        entity_id,
                        status: SeedStatus::Succeeded,
                    });
                }
                Ok(response) => {
                    warn!(
                        kind = adapter.kind(),
                        record = %name,
                        status = response.status,
                        "Submission rejected"
                    );
                    seeded.push(SeededRecord {
                        original: record,
                        entity_id: None,
                        status: SeedStatus::Failed,
                    });
                }
                Err(err) => {
                    error!(
                        kind = adapter.kind(),
                        record = %name,
                        error = %err,
                        "Submission failed after retries"
                    );
                    seeded.push(SeededRecord {
                        original: record,
                        entity_id: None,
                        status: SeedStatus::Failed,
                    });
                }
            }
        }

        seeded
    }

    async fn backfill_dates(
        &self,
        adapter: &dyn EntityAdapter,
        seeded: &[SeededRecord],
        originals: &HashMap<String, ReferenceDates>,
    ) -> Result<()> {
        let settings = &self.ctx.settings;
        let window = HistoricalWindow::new(
            chrono::Local::now().naive_local(),
            settings.lookback_days(),
        );
        let options = BackfillOptions {
            shuffle: settings.shuffle_dates,
            shuffle_seed: settings.shuffle_seed,
            business_days_only: settings.business_days_only,
        };

        let planned = plan_assignments(seeded, &window, originals, &options);
        if planned.is_empty() {
            return Ok(());
        }

        // The bulk update needs per-column distinctness at second
        // granularity; collisions shift rather than fail.
        let (created_column, modified_column) = adapter.date_columns();
        let mut used_created = UsedTimestamps::new();
        let mut used_modified = UsedTimestamps::new();
        let mut assignments = Vec::with_capacity(planned.len());
        for item in planned {
            let created_at = ensure_unique_datetime(
                item.created_at,
                &mut used_created,
                Some(window.min_date()),
                Some(window.now),
                created_column,
            );
            let modified_at = ensure_unique_datetime(
                item.modified_at,
                &mut used_modified,
                Some(created_at),
                Some(window.now),
                modified_column,
            );
            assignments.push(TemporalAssignment {
                entity_id: item.entity_id,
                created_at,
                modified_at,
            });
        }

        db::apply_temporal_assignments(&self.ctx.db, adapter, &assignments, settings.site_id)
            .await?;
        info!(
            kind = adapter.kind(),
            records = assignments.len(),
            "Backfilled timestamps"
        );
        Ok(())
    }

    async fn backfill_owners(
        &self,
        adapter: &dyn EntityAdapter,
        seeded: &[SeededRecord],
    ) -> Result<()> {
        let settings = &self.ctx.settings;
        let user_ids = db::fetch_available_user_ids(
            &self.ctx.db,
            &settings.user_table,
            &settings.user_id_column,
            settings.admin_user_id,
        )
        .await?;
        if user_ids.is_empty() {
            warn!("No application users available; skipping ownership backfill");
            return Ok(());
        }

        let assignments = owner_assignments(adapter, seeded, &user_ids);
        if assignments.is_empty() {
            return Ok(());
        }

        if let Some(owner_endpoint) = adapter.owner_endpoint() {
            let mut updated = 0usize;
            for (entity_id, owner_id) in &assignments {
                let fields = vec![
                    (adapter.id_column().to_string(), entity_id.to_string()),
                    (adapter.owner_field().to_string(), owner_id.to_string()),
                ];
                match self.ctx.app.submit_form(owner_endpoint, &fields, false).await {
                    Ok(response) if response.accepted() => updated += 1,
                    Ok(response) => warn!(
                        entity_id,
                        status = response.status,
                        "Owner update rejected"
                    ),
                    Err(err) => warn!(entity_id, error = %err, "Owner update failed"),
                }
            }
            info!(kind = adapter.kind(), updated, "Owners updated via API");
        } else {
            db::apply_owner_assignments(&self.ctx.db, adapter, &assignments, settings.site_id)
                .await?;
            info!(
                kind = adapter.kind(),
                records = assignments.len(),
                "Owners updated in datastore"
            );
        }
        Ok(())
    }
}

/// Fold candidates by case-insensitive trimmed name: first occurrence
/// wins, empty names are discarded, first-seen order is preserved.
pub fn dedupe_candidates(records: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| match record.name() {
            Some(name) => seen.insert(name.to_lowercase()),
            None => false,
        })
        .collect()
}

/// Reference dates carried by the batch itself (records loaded from a
/// prior run's file), keyed by name for the backfill engine.
pub fn reference_dates_by_name(
    records: &[CandidateRecord],
    adapter: &dyn EntityAdapter,
) -> HashMap<String, ReferenceDates> {
    let (created_field, modified_field) = adapter.reference_date_fields();
    let mut map = HashMap::new();
    for record in records {
        let Some(name) = record.name() else {
            continue;
        };
        let reference = ReferenceDates {
            created: record.get_str(created_field).map(str::to_string),
            modified: record.get_str(modified_field).map(str::to_string),
        };
        if reference.created.is_some() || reference.modified.is_some() {
            map.entry(name.to_string()).or_insert(reference);
        }
    }
    map
}

/// Owner per record: a generated reference resolves when the profile
/// names one, otherwise round-robin by position in the succeeded batch.
pub fn owner_assignments(
    adapter: &dyn EntityAdapter,
    seeded: &[SeededRecord],
    user_ids: &[i64],
) -> Vec<(i64, i64)> {
    let mut assignments = Vec::new();
    let eligible = seeded
        .iter()
        .filter(|record| record.succeeded() && record.entity_id.is_some());

    for (idx, record) in eligible.enumerate() {
        let Some(entity_id) = record.entity_id else {
            continue;
        };
        let round_robin = user_ids[idx % user_ids.len()];
        let owner_id = match adapter
            .owner_reference_field()
            .and_then(|field| record.original.get(field))
        {
            Some(reference) => match resolve_owner_reference(reference, user_ids) {
                Ok(id) => id,
                Err(err) => {
                    warn!(
                        record = record.original.name().unwrap_or_default(),
                        error = %err,
                        "Owner reference unresolved, falling back to round-robin"
                    );
                    round_robin
                }
            },
            None => round_robin,
        };
        assignments.push((entity_id, owner_id));
    }
    assignments
}

/// Map a generated owner reference to a real application user id.
pub fn resolve_owner_reference(reference: &Value, available: &[i64]) -> Result<i64> {
    let id = match reference {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::Resolution(format!("owner reference '{reference}' is not an id")))?;

    if available.contains(&id) {
        Ok(id)
    } else {
        Err(Error::Resolution(format!(
            "owner reference {id} does not match an application user"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::entity_adapter::ProfileAdapter;
    use demoseed_common::config::EntityProfile;
    use serde_json::json;

    fn record(value: serde_json::Value) -> CandidateRecord {
        match value {
            Value::Object(map) => CandidateRecord::new(map),
            _ => panic!("expected object"),
        }
    }

    fn test_adapter(owner_reference_field: Option<&str>) -> ProfileAdapter {
        let profile = EntityProfile {
            kind: "entities".into(),
            data_file: "entities.json".into(),
            endpoint: "/entities/add".into(),
            multipart: false,
            table: "entity".into(),
            id_column: "entity_id".into(),
            owner_column: "owner".into(),
            tenant_column: "site_id".into(),
            created_column: "date_created".into(),
            modified_column: "date_modified".into(),
            owner_endpoint: None,
            owner_field: "owner".into(),
            owner_reference_field: owner_reference_field.map(str::to_string),
            id_url_params: vec!["entityID".into()],
            id_content_patterns: vec![r"entityID[=:](\d+)".into()],
            created_reference_field: "createdDateTime".into(),
            modified_reference_field: "modifiedDateTime".into(),
            fields: vec![],
        };
        ProfileAdapter::from_profile(profile).unwrap()
    }

    fn seeded(name: &str, entity_id: Option<i64>, status: SeedStatus) -> SeededRecord {
        SeededRecord {
            original: record(json!({ "name": name })),
            entity_id,
            status,
        }
    }

    #[test]
    fn dedup_is_case_insensitive_and_keeps_first() {
        let records = vec![
            record(json!({ "name": "Acme Corp" })),
            record(json!({ "name": "ACME CORP" })),
            record(json!({ "name": "acme corp " })),
            record(json!({ "name": " Acme Corp" })),
            record(json!({ "name": "Acme CORP" })),
        ];

        let unique = dedupe_candidates(records);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].name(), Some("Acme Corp"));
    }

    #[test]
    fn dedup_discards_empty_names_and_preserves_order() {
        let records = vec![
            record(json!({ "name": "Beta" })),
            record(json!({ "name": "" })),
            record(json!({ "note": "no name at all" })),
            record(json!({ "name": "Alpha" })),
            record(json!({ "name": "beta" })),
        ];

        let unique = dedupe_candidates(records);
        let names: Vec<_> = unique.iter().filter_map(|r| r.name()).collect();
        assert_eq!(names, vec!["Beta", "Alpha"]);
    }

    #[test]
    fn reference_dates_are_collected_by_name() {
        let adapter = test_adapter(None);
        let records = vec![
            record(json!({
                "name": "Acme",
                "createdDateTime": "15-03-24 10:30 AM",
                "modifiedDateTime": "10-04-24 02:15 PM",
            })),
            record(json!({ "name": "Globex" })),
        ];

        let map = reference_dates_by_name(&records, &adapter);
        assert_eq!(map.len(), 1);
        let reference = &map["Acme"];
        assert_eq!(reference.created.as_deref(), Some("15-03-24 10:30 AM"));
        assert_eq!(reference.modified.as_deref(), Some("10-04-24 02:15 PM"));
    }

    #[test]
    fn owners_round_robin_over_the_succeeded_batch() {
        let adapter = test_adapter(None);
        let seeded = vec![
            seeded("A", Some(101), SeedStatus::Succeeded),
            seeded("B", None, SeedStatus::Failed),
            seeded("C", Some(102), SeedStatus::Succeeded),
            // Ambiguous success: submitted, but no id to address
            seeded("D", None, SeedStatus::Succeeded),
            seeded("E", Some(103), SeedStatus::Succeeded),
            seeded("F", Some(104), SeedStatus::Succeeded),
        ];
        let user_ids = vec![2, 3, 4];

        let assignments = owner_assignments(&adapter, &seeded, &user_ids);
        assert_eq!(
            assignments,
            vec![(101, 2), (102, 3), (103, 4), (104, 2)]
        );
    }

    #[test]
    fn owner_reference_resolves_when_it_matches_a_user() {
        let adapter = test_adapter(Some("ownerID"));
        let seeded = vec![SeededRecord {
            original: record(json!({ "name": "A", "ownerID": 3 })),
            entity_id: Some(101),
            status: SeedStatus::Succeeded,
        }];
        let user_ids = vec![2, 3, 4];

        let assignments = owner_assignments(&adapter, &seeded, &user_ids);
        assert_eq!(assignments, vec![(101, 3)]);
    }

    #[test]
    fn unresolvable_owner_reference_falls_back_to_round_robin() {
        let adapter = test_adapter(Some("ownerID"));
        let seeded = vec![SeededRecord {
            original: record(json!({ "name": "A", "ownerID": 99 })),
            entity_id: Some(101),
            status: SeedStatus::Succeeded,
        }];
        let user_ids = vec![2, 3, 4];

        let assignments = owner_assignments(&adapter, &seeded, &user_ids);
        assert_eq!(assignments, vec![(101, 2)]);
    }

    #[test]
    fn owner_reference_resolution_errors_are_typed() {
        let err = resolve_owner_reference(&json!("not-a-number"), &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));

        let err = resolve_owner_reference(&json!(7), &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));

        assert_eq!(resolve_owner_reference(&json!(2), &[1, 2]).unwrap(), 2);
        assert_eq!(resolve_owner_reference(&json!("2"), &[1, 2]).unwrap(), 2);
    }
}
