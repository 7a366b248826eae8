// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Cadence publish engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Cadence configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CadenceConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Publish queue processor and slot search settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Schedule processor settings.
    #[serde(default)]
    pub schedules: SchedulesConfig,

    /// Late.dev publishing API settings.
    #[serde(default)]
    pub late: LateConfig,

    /// Media generation backend settings.
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, included in log lines.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "cadence".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("cadence").join("cadence.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("cadence.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Publish queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Run the queue processor under `cadence serve`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between queue ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Delay between two publishes within a tick, in milliseconds.
    #[serde(default = "default_queue_pacing_ms")]
    pub pacing_ms: u64,

    /// Failed attempts before an item is given up on.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Days ahead the slot search looks, counting today.
    #[serde(default = "default_slot_horizon_days")]
    pub slot_horizon_days: u32,

    /// Minimum lead time for a newly assigned slot.
    #[serde(default = "default_slot_buffer_secs")]
    pub slot_buffer_secs: u64,

    /// Upper bound on a single gateway call.
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,

    /// How often `add_to_queue` re-searches after losing a slot race.
    #[serde(default = "default_slot_conflict_retries")]
    pub slot_conflict_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: default_tick_interval_secs(),
            pacing_ms: default_queue_pacing_ms(),
            max_attempts: default_max_attempts(),
            slot_horizon_days: default_slot_horizon_days(),
            slot_buffer_secs: default_slot_buffer_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            slot_conflict_retries: default_slot_conflict_retries(),
        }
    }
}

impl QueueConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_queue_pacing_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_slot_horizon_days() -> u32 {
    14
}

fn default_slot_buffer_secs() -> u64 {
    60
}

fn default_publish_timeout_secs() -> u64 {
    120
}

fn default_slot_conflict_retries() -> u32 {
    5
}

/// Schedule processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Delay between two schedule executions within a tick, in milliseconds.
    #[serde(default)]
    pub pacing_ms: u64,
}

impl Default for SchedulesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: default_tick_interval_secs(),
            pacing_ms: 0,
        }
    }
}

impl SchedulesConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Late.dev publishing API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LateConfig {
    /// API key. Falls back to the `LATE_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_late_base_url")]
    pub base_url: String,
}

impl Default for LateConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_late_base_url(),
        }
    }
}

fn default_late_base_url() -> String {
    "https://getlate.dev/api/v1".to_string()
}

/// Media generation backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Base URL of the generation service. Generation actions fail when unset.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Video generation can take several minutes.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_timeout_secs() -> u64 {
    600
}
