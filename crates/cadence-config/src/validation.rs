// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero intervals, bounded horizons, and non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::CadenceConfig;

/// Largest slot search horizon accepted, in days.
pub const MAX_SLOT_HORIZON_DAYS: u32 = 60;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CadenceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.trim().to_ascii_lowercase().as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let queue = &config.queue;
    if queue.tick_interval_secs == 0 {
        fail("queue.tick_interval_secs must be greater than 0".to_string());
    }
    if queue.max_attempts < 1 {
        fail(format!(
            "queue.max_attempts must be at least 1, got {}",
            queue.max_attempts
        ));
    }
    if !(1..=MAX_SLOT_HORIZON_DAYS).contains(&queue.slot_horizon_days) {
        fail(format!(
            "queue.slot_horizon_days must be between 1 and {MAX_SLOT_HORIZON_DAYS}, got {}",
            queue.slot_horizon_days
        ));
    }
    if queue.publish_timeout_secs == 0 {
        fail("queue.publish_timeout_secs must be greater than 0".to_string());
    }

    if config.schedules.tick_interval_secs == 0 {
        fail("schedules.tick_interval_secs must be greater than 0".to_string());
    }

    if !looks_like_http_url(&config.late.base_url) {
        fail(format!(
            "late.base_url `{}` must be an http(s) URL",
            config.late.base_url
        ));
    }

    if let Some(endpoint) = config
        .generation
        .endpoint
        .as_deref()
        .filter(|endpoint| !looks_like_http_url(endpoint))
    {
        fail(format!(
            "generation.endpoint `{endpoint}` must be an http(s) URL"
        ));
    }
    if config.generation.timeout_secs == 0 {
        fail("generation.timeout_secs must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn looks_like_http_url(value: &str) -> bool {
    let value = value.trim();
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.len() > scheme.len() && value.starts_with(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = CadenceConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = CadenceConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("database_path"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = CadenceConfig::default();
        config.queue.tick_interval_secs = 0;
        config.queue.max_attempts = 0;
        config.queue.slot_horizon_days = 90;
        config.late.base_url = "getlate.dev".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn generation_endpoint_is_checked_only_when_set() {
        let mut config = CadenceConfig::default();
        config.generation.endpoint = Some("ftp://gen".to_string());
        assert!(validate_config(&config).is_err());
        config.generation.endpoint = Some("http://localhost:8500".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_log_level_fails() {
        let mut config = CadenceConfig::default();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }
}
