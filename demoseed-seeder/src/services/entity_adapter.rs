//! Entity adapters
//!
//! Everything that varies per entity kind (the endpoint, the table and
//! column names, which record fields map to which form fields, how the
//! assigned id shows up in the response) sits behind a small trait so that
//! new kinds are configuration entries, not new conditional arms in the
//! orchestrator.

use crate::models::CandidateRecord;
use crate::services::entity_id::IdRules;
use crate::utils::dates::{format_app_date, format_phone_number, format_url};
use demoseed_common::config::{EntityProfile, FieldKind};
use demoseed_common::Result;
use serde_json::Value;

/// Per-entity-kind strategy the orchestrator drives a batch through
pub trait EntityAdapter: Send + Sync {
    fn kind(&self) -> &str;
    fn endpoint(&self) -> &str;
    fn multipart(&self) -> bool;
    fn table(&self) -> &str;
    fn id_column(&self) -> &str;
    fn tenant_column(&self) -> &str;
    fn owner_column(&self) -> &str;
    /// (created, modified) datastore columns
    fn date_columns(&self) -> (&str, &str);
    /// (created, modified) record fields carrying reference dates
    fn reference_date_fields(&self) -> (&str, &str);
    fn id_rules(&self) -> &IdRules;

    /// Endpoint for API-based owner updates, for the kinds the
    /// application supports updating directly.
    fn owner_endpoint(&self) -> Option<&str> {
        None
    }
    fn owner_field(&self) -> &str {
        "owner"
    }
    /// Record field carrying a generated owner reference
    fn owner_reference_field(&self) -> Option<&str> {
        None
    }

    /// Flat form payload for one record
    fn form_fields(&self, record: &CandidateRecord) -> Vec<(String, String)>;
}

/// Adapter driven entirely by an [`EntityProfile`] from configuration
pub struct ProfileAdapter {
    profile: EntityProfile,
    id_rules: IdRules,
}

impl ProfileAdapter {
    pub fn from_profile(profile: EntityProfile) -> Result<Self> {
        let id_rules = IdRules::compile(&profile.id_url_params, &profile.id_content_patterns)?;
        Ok(ProfileAdapter { profile, id_rules })
    }
}

impl EntityAdapter for ProfileAdapter {
    fn kind(&self) -> &str {
        &self.profile.kind
    }

    fn endpoint(&self) -> &str {
        &self.profile.endpoint
    }

    fn multipart(&self) -> bool {
        self.profile.multipart
    }

    fn table(&self) -> &str {
        &self.profile.table
    }

    fn id_column(&self) -> &str {
        &self.profile.id_column
    }

    fn tenant_column(&self) -> &str {
        &self.profile.tenant_column
    }

    fn owner_column(&self) -> &str {
        &self.profile.owner_column
    }

    fn date_columns(&self) -> (&str, &str) {
        (&self.profile.created_column, &self.profile.modified_column)
    }

    fn reference_date_fields(&self) -> (&str, &str) {
        (
            &self.profile.created_reference_field,
            &self.profile.modified_reference_field,
        )
    }

    fn id_rules(&self) -> &IdRules {
        &self.id_rules
    }

    fn owner_endpoint(&self) -> Option<&str> {
        self.profile.owner_endpoint.as_deref()
    }

    fn owner_field(&self) -> &str {
        &self.profile.owner_field
    }

    fn owner_reference_field(&self) -> Option<&str> {
        self.profile.owner_reference_field.as_deref()
    }

    fn form_fields(&self, record: &CandidateRecord) -> Vec<(String, String)> {
        let mut fields = Vec::with_capacity(self.profile.fields.len());
        for mapping in &self.profile.fields {
            let Some(value) = record.get(mapping.record_field()) else {
                continue;
            };
            let raw = match value {
                Value::String(s) => s.clone(),
                Value::Null => continue,
                other => other.to_string(),
            };
            let formatted = match mapping.kind {
                FieldKind::Text => raw,
                FieldKind::Phone => format_phone_number(&raw),
                FieldKind::Url => format_url(&raw),
                FieldKind::Date => format_app_date(&raw),
            };
            fields.push((mapping.form_field.clone(), formatted));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use demoseed_common::config::FieldMapping;
    use serde_json::json;

    fn mapping(form_field: &str, record_field: Option<&str>, kind: FieldKind) -> FieldMapping {
        FieldMapping {
            form_field: form_field.to_string(),
            record_field: record_field.map(str::to_string),
            kind,
        }
    }

    fn test_adapter() -> ProfileAdapter {
        let profile = EntityProfile {
            kind: "companies".into(),
            data_file: "companies.json".into(),
            endpoint: "/companies/add".into(),
            multipart: false,
            table: "company".into(),
            id_column: "company_id".into(),
            owner_column: "owner".into(),
            tenant_column: "site_id".into(),
            created_column: "date_created".into(),
            modified_column: "date_modified".into(),
            owner_endpoint: None,
            owner_field: "owner".into(),
            owner_reference_field: None,
            id_url_params: vec!["companyID".into()],
            id_content_patterns: vec![r"companyID[=:](\d+)".into()],
            created_reference_field: "createdDateTime".into(),
            modified_reference_field: "modifiedDateTime".into(),
            fields: vec![
                mapping("name", None, FieldKind::Text),
                mapping("phone", Some("phoneNumber"), FieldKind::Phone),
                mapping("website", None, FieldKind::Url),
                mapping("founded", Some("foundedDate"), FieldKind::Date),
                mapping("employees", Some("employeeCount"), FieldKind::Text),
                mapping("missing", Some("absentField"), FieldKind::Text),
            ],
        };
        ProfileAdapter::from_profile(profile).unwrap()
    }

    fn record(value: serde_json::Value) -> CandidateRecord {
        match value {
            Value::Object(map) => CandidateRecord::new(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn maps_and_formats_fields() {
        let adapter = test_adapter();
        let rec = record(json!({
            "name": "Acme Corp",
            "phoneNumber": "555.123.4567",
            "website": "acme.example",
            "foundedDate": "2020-01-15",
            "employeeCount": 250,
        }));

        let fields = adapter.form_fields(&rec);

        assert_eq!(
            fields,
            vec![
                ("name".to_string(), "Acme Corp".to_string()),
                ("phone".to_string(), "(555) 123-4567".to_string()),
                ("website".to_string(), "https://acme.example".to_string()),
                ("founded".to_string(), "01-15-20".to_string()),
                ("employees".to_string(), "250".to_string()),
            ]
        );
    }

    #[test]
    fn absent_and_null_fields_produce_nothing() {
        let adapter = test_adapter();
        let rec = record(json!({ "name": "Acme", "phoneNumber": null }));

        let fields = adapter.form_fields(&rec);
        assert_eq!(fields, vec![("name".to_string(), "Acme".to_string())]);
    }

    #[test]
    fn column_names_come_from_the_profile() {
        let adapter = test_adapter();
        assert_eq!(adapter.table(), "company");
        assert_eq!(adapter.date_columns(), ("date_created", "date_modified"));
        assert_eq!(adapter.tenant_column(), "site_id");
        assert!(adapter.owner_endpoint().is_none());
    }
}
