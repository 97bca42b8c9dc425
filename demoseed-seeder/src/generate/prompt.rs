//! Prompt construction for record generation
//!
//! Prompts carry an exclusion list of recently used names so consecutive
//! batches stay unique, and optionally a short context block of linked
//! records so generated data can reference entities that already exist.

use crate::models::CandidateRecord;
use serde_json::Value;

/// Most recent used names included in the exclusion clause
const MAX_EXCLUDED_NAMES: usize = 50;

/// Linked records included in the context block
const MAX_CONTEXT_ENTITIES: usize = 10;

/// Prompt for simple entities without relationships.
pub fn entities_prompt(theme: &str, batch_size: usize, used_names: &[String]) -> String {
    format!(
        "\nGenerate {batch_size} example entities for {theme}.\n\
         \n\
         Requirements:\n\
         - Each entity must have a unique name\n\
         - Include realistic details\n\
         - Return as JSON array\n\
         {excluded}\n\
         \n\
         Return format:\n\
         [\n  {{\n    \"name\": \"Entity Name\",\n    \"description\": \"Entity description\"\n  }}\n]\n",
        excluded = excluded_names_clause(used_names),
    )
}

/// Prompt for entities that should reference already-generated linked
/// records.
pub fn entities_prompt_with_context(
    theme: &str,
    entity_kind: &str,
    batch_size: usize,
    used_names: &[String],
    linked: &[CandidateRecord],
) -> String {
    let mut context_lines = Vec::new();
    for record in linked.iter().take(MAX_CONTEXT_ENTITIES) {
        let Some(name) = record.name() else {
            continue;
        };
        let mut line = format!("- {name}");
        if let Some(id) = record.get("id").and_then(Value::as_i64) {
            line.push_str(&format!(" (ID: {id})"));
        }
        context_lines.push(line);
    }

    let context = if context_lines.is_empty() {
        String::new()
    } else {
        format!(
            "\nContext from linked records (you may reference these in your generated data):\n{}\n",
            context_lines.join("\n"),
        )
    };

    format!(
        "\nGenerate {batch_size} {entity_kind} records for {theme}.\n\
         \n\
         Requirements:\n\
         - Each record must have a unique name\n\
         - Include realistic details appropriate for the context\n\
         - If context is provided, create relationships that make sense\n\
         - Return as JSON array\n\
         {excluded}{context}\n",
        excluded = excluded_names_clause(used_names),
    )
}

fn excluded_names_clause(used_names: &[String]) -> String {
    if used_names.is_empty() {
        return String::new();
    }
    let start = used_names.len().saturating_sub(MAX_EXCLUDED_NAMES);
    format!("\nExclude these names: {}", used_names[start..].join(", "))
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
    fn prompt_carries_batch_size_and_theme() {
        let prompt = entities_prompt("a law firm", 5, &[]);
        assert!(prompt.contains("Generate 5 example entities for a law firm"));
        assert!(prompt.contains("JSON array"));
        assert!(!prompt.contains("Exclude these names"));
    }

    #[test]
    fn exclusion_list_is_capped_at_fifty() {
        let used: Vec<String> = (0..80).map(|i| format!("name-{i}")).collect();
        let prompt = entities_prompt("a law firm", 5, &used);

        assert!(prompt.contains("Exclude these names"));
        // The oldest thirty names fell off the clause
        assert!(!prompt.contains("name-29,"));
        assert!(prompt.contains("name-30"));
        assert!(prompt.contains("name-79"));
    }

    #[test]
    fn context_block_is_capped_at_ten() {
        let linked: Vec<CandidateRecord> = (0..15)
            .map(|i| record(json!({ "name": format!("Company {i}"), "id": i })))
            .collect();
        let prompt =
            entities_prompt_with_context("a law firm", "contact", 5, &[], &linked);

        assert!(prompt.contains("Context from linked records"));
        assert!(prompt.contains("Company 0 (ID: 0)"));
        assert!(prompt.contains("Company 9"));
        assert!(!prompt.contains("Company 10"));
    }

    #[test]
    fn context_block_is_omitted_without_linked_records() {
        let prompt = entities_prompt_with_context("a law firm", "contact", 5, &[], &[]);
        assert!(!prompt.contains("Context from linked"));
    }
}
