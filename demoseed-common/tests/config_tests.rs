//! Settings resolution tests
//!
//! Note: Uses serial_test to prevent ENV variable race conditions. Tests
//! that manipulate DEMOSEED_* variables are marked with #[serial] so they
//! run sequentially, not in parallel.

use demoseed_common::config::{FieldKind, Settings};
use serial_test::serial;
use std::env;
use std::io::Write;

fn clear_env() {
    for var in [
        "DEMOSEED_CONFIG",
        "DEMOSEED_LOG_LEVEL",
        "DEMOSEED_ANTHROPIC_API_KEY",
        "ANTHROPIC_API_KEY",
        "DEMOSEED_MODEL",
        "DEMOSEED_APP_BASE_URL",
        "DEMOSEED_ADMIN_EMAIL",
        "DEMOSEED_ADMIN_PASSWORD",
        "DEMOSEED_SITE_NAME",
        "DEMOSEED_DATABASE_URL",
        "DEMOSEED_THEME_SUBJECT",
        "DEMOSEED_DATA_DIR",
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_apply_without_config_file() {
    clear_env();

    let settings = Settings::load(None).unwrap();

    assert_eq!(settings.log_level, "info");
    assert_eq!(settings.site_id, 1);
    assert_eq!(settings.target_count, 50);
    assert_eq!(settings.batch_size, 5);
    assert_eq!(settings.lookback_months, 36);
    assert_eq!(settings.lookback_days(), 36 * 30);
    assert!(settings.entities.is_empty());
}

#[test]
#[serial]
fn toml_file_overrides_defaults() {
    clear_env();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
            app_base_url = "http://app.test:8080"
            site_id = 7
            lookback_months = 12

            [[entities]]
            kind = "companies"
            data_file = "companies.json"
            endpoint = "/companies/add"
            table = "company"
            id_column = "company_id"

            [[entities.fields]]
            form_field = "name"

            [[entities.fields]]
            form_field = "phone"
            record_field = "phoneNumber"
            kind = "phone"
        "#
    )
    .unwrap();

    let settings = Settings::load(Some(file.path())).unwrap();

    assert_eq!(settings.app_base_url, "http://app.test:8080");
    assert_eq!(settings.site_id, 7);
    assert_eq!(settings.lookback_days(), 360);
    // Untouched fields keep their defaults
    assert_eq!(settings.admin_email, "admin");

    let profile = &settings.entities[0];
    assert_eq!(profile.kind, "companies");
    assert_eq!(profile.owner_column, "owner");
    assert_eq!(profile.tenant_column, "site_id");
    assert_eq!(profile.created_column, "date_created");
    assert_eq!(profile.fields[0].record_field(), "name");
    assert_eq!(profile.fields[1].record_field(), "phoneNumber");
    assert_eq!(profile.fields[1].kind, FieldKind::Phone);
}

#[test]
#[serial]
fn env_variables_override_file_values() {
    clear_env();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"app_base_url = "http://from-file""#).unwrap();

    env::set_var("DEMOSEED_APP_BASE_URL", "http://from-env");
    env::set_var("ANTHROPIC_API_KEY", "sk-test");

    let settings = Settings::load(Some(file.path())).unwrap();
    clear_env();

    assert_eq!(settings.app_base_url, "http://from-env");
    assert_eq!(settings.anthropic_api_key, "sk-test");
}

#[test]
#[serial]
fn invalid_batch_size_is_rejected() {
    clear_env();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "batch_size = 0").unwrap();

    assert!(Settings::load(Some(file.path())).is_err());
}

#[test]
#[serial]
fn duplicate_entity_kinds_are_rejected() {
    clear_env();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
            [[entities]]
            kind = "companies"
            data_file = "a.json"
            endpoint = "/a"
            table = "a"
            id_column = "id"
            fields = []

            [[entities]]
            kind = "companies"
            data_file = "b.json"
            endpoint = "/b"
            table = "b"
            id_column = "id"
            fields = []
        "#
    )
    .unwrap();

    assert!(Settings::load(Some(file.path())).is_err());
}
