//! Record generation through the completion API
//!
//! Accumulates records in the entity's data file until the configured
//! target count is reached. Each batch is one completion call; batches
//! that fail extraction or hit rate limits retry with exponential
//! backoff, and a batch that exhausts its retries is logged and skipped
//! without aborting the run.

pub mod prompt;

use crate::models::CandidateRecord;
use crate::services::anthropic_client::{first_content_text, AnthropicClient, CompletionRequest};
use crate::services::response_extractor::extract_records;
use crate::utils::retry::retry_exponential;
use demoseed_common::config::{EntityProfile, Settings};
use demoseed_common::datafile::{self, RawRecord};
use demoseed_common::Result;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, info};

const GENERATE_ATTEMPTS: u32 = 3;
const GENERATE_MIN_DELAY: Duration = Duration::from_secs(4);
const GENERATE_MAX_DELAY: Duration = Duration::from_secs(10);

/// Top up one entity kind's record file to the configured target count.
/// Returns the full pool (existing + new) as candidates.
pub async fn generate_records(
    settings: &Settings,
    client: &AnthropicClient,
    profile: &EntityProfile,
    linked: Option<&[CandidateRecord]>,
) -> Result<Vec<CandidateRecord>> {
    let path = settings.data_dir.join(&profile.data_file);
    let existing = datafile::load_records(&path);

    let mut used_names: Vec<String> = Vec::new();
    let mut used_set: HashSet<String> = HashSet::new();
    for record in &existing {
        if let Some(name) = record.get("name").and_then(Value::as_str) {
            let lower = name.trim().to_lowercase();
            if !lower.is_empty() && used_set.insert(lower.clone()) {
                used_names.push(lower);
            }
        }
    }

    let needed = settings.target_count.saturating_sub(existing.len());
    if needed == 0 {
        info!(
            kind = %profile.kind,
            existing = existing.len(),
            "No new records needed"
        );
        return Ok(existing.into_iter().map(CandidateRecord::new).collect());
    }

    let mut new_records: Vec<RawRecord> = Vec::new();
    let batches = needed.div_ceil(settings.batch_size);

    for batch_num in 0..batches {
        let batch_size = settings
            .batch_size
            .min(needed.saturating_sub(new_records.len()));
        if batch_size == 0 {
            break;
        }

        let prompt_text = match linked {
            Some(linked) if !linked.is_empty() => prompt::entities_prompt_with_context(
                &settings.theme_subject,
                &profile.kind,
                batch_size,
                &used_names,
                linked,
            ),
            _ => prompt::entities_prompt(&settings.theme_subject, batch_size, &used_names),
        };

        let batch = retry_exponential(
            "record generation",
            GENERATE_ATTEMPTS,
            GENERATE_MIN_DELAY,
            GENERATE_MAX_DELAY,
            || {
                let request = CompletionRequest::new(&prompt_text, &settings.model);
                async move {
                    let response = client.complete(&request).await?;
                    let text = first_content_text(&response)?;
                    extract_records(text)
                }
            },
        )
        .await;

        match batch {
            Ok(records) => {
                for record in records {
                    let Some(name) = record.get("name").and_then(Value::as_str) else {
                        continue;
                    };
                    let name = name.trim();
                    if name.is_empty() {
                        continue;
                    }
                    let lower = name.to_lowercase();
                    if used_set.insert(lower.clone()) {
                        used_names.push(lower);
                        new_records.push(record);
                    }
                }
            }
            Err(err) => {
                error!(
                    kind = %profile.kind,
                    batch = batch_num + 1,
                    error = %err,
                    "Error generating batch"
                );
            }
        }
    }

    let mut all = existing;
    all.extend(new_records.iter().cloned());
    datafile::save_records(&path, &all)?;
    info!(
        kind = %profile.kind,
        new = new_records.len(),
        total = all.len(),
        "Generated records"
    );
    Ok(all.into_iter().map(CandidateRecord::new).collect())
}
