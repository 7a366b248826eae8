// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Cadence configuration system.

use cadence_config::diagnostic::ConfigError;
use cadence_config::model::CadenceConfig;
use cadence_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_cadence_config() {
    let toml = r#"
[service]
name = "cadence-eu"
log_level = "debug"

[storage]
database_path = "/tmp/cadence-test.db"
wal_mode = false

[queue]
enabled = true
tick_interval_secs = 30
pacing_ms = 250
max_attempts = 5
slot_horizon_days = 21
slot_buffer_secs = 120
publish_timeout_secs = 45
slot_conflict_retries = 2

[schedules]
enabled = false
tick_interval_secs = 15
pacing_ms = 10

[late]
api_key = "late-123"
base_url = "http://localhost:9999/api/v1"

[generation]
endpoint = "http://localhost:8500"
timeout_secs = 300
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "cadence-eu");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/cadence-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.queue.tick_interval_secs, 30);
    assert_eq!(config.queue.pacing_ms, 250);
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.queue.slot_horizon_days, 21);
    assert_eq!(config.queue.slot_buffer_secs, 120);
    assert_eq!(config.queue.publish_timeout_secs, 45);
    assert_eq!(config.queue.slot_conflict_retries, 2);
    assert!(!config.schedules.enabled);
    assert_eq!(config.schedules.tick_interval_secs, 15);
    assert_eq!(config.late.api_key.as_deref(), Some("late-123"));
    assert_eq!(config.late.base_url, "http://localhost:9999/api/v1");
    assert_eq!(config.generation.endpoint.as_deref(), Some("http://localhost:8500"));
    assert_eq!(config.generation.timeout_secs, 300);
}

/// An empty file yields the compiled defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.queue.tick_interval_secs, 60);
    assert_eq!(config.queue.pacing_ms, 1000);
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.queue.slot_horizon_days, 14);
    assert_eq!(config.queue.slot_buffer_secs, 60);
    assert_eq!(config.queue.publish_timeout_secs, 120);
    assert_eq!(config.queue.slot_conflict_retries, 5);
    assert_eq!(config.schedules.pacing_ms, 0);
    assert_eq!(config.late.base_url, "https://getlate.dev/api/v1");
    assert!(config.late.api_key.is_none());
    assert!(config.storage.wal_mode);
}

/// Unknown field in [queue] produces an UnknownKey diagnostic with a suggestion.
#[test]
fn unknown_queue_key_suggests_correction() {
    let toml = r#"
[queue]
max_atempts = 4
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "max_atempts");
            assert_eq!(suggestion.as_deref(), Some("max_attempts"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Unknown top-level section is rejected too.
#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[telegram]\nbot_token = \"x\"\n")
        .expect_err("unknown section should fail");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("telegram"),
        "error should mention the bad key, got: {err_str}"
    );
}

/// A wrong value type is reported with the key path.
#[test]
fn wrong_type_reports_invalid_type() {
    let toml = r#"
[queue]
max_attempts = "three"
"#;

    let errors = load_and_validate_str(toml).expect_err("string is not a u32");
    assert!(
        errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidType { key, .. } if key.contains("max_attempts")
        )),
        "got {errors:?}"
    );
}

/// Deserializable but semantically invalid values fail validation.
#[test]
fn zero_tick_interval_fails_validation() {
    let toml = r#"
[queue]
tick_interval_secs = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero interval is invalid");
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
    assert!(errors[0].to_string().contains("tick_interval_secs"));
}

/// Defaults serialize back to TOML that loads to the same values.
#[test]
fn default_config_survives_toml_round_trip() {
    let text = toml::to_string(&CadenceConfig::default()).expect("defaults serialize");
    let config = load_and_validate_str(&text).expect("serialized defaults are valid");
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.service.name, "cadence");
}
