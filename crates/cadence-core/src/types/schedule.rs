// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-shot and recurring schedules, their actions, and prompt templates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{ContentType, PageRequest};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Single schedule waiting for its time.
    Pending,
    /// Recurring schedule waiting for its next run.
    Active,
    /// Claimed by the processor.
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Single,
    Recurring,
}

/// When a schedule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ScheduleTiming {
    Single {
        scheduled_for: DateTime<Utc>,
    },
    Recurring {
        /// Five-field cron expression evaluated in UTC.
        cron_expression: String,
        max_executions: Option<u32>,
        end_date: Option<DateTime<Utc>>,
        next_execution_at: Option<DateTime<Utc>>,
    },
}

impl ScheduleTiming {
    pub fn kind(&self) -> ScheduleKind {
        match self {
            Self::Single { .. } => ScheduleKind::Single,
            Self::Recurring { .. } => ScheduleKind::Recurring,
        }
    }

    /// The next instant this schedule is due, if any.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Single { scheduled_for } => Some(*scheduled_for),
            Self::Recurring {
                next_execution_at, ..
            } => *next_execution_at,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StyleCategory {
    #[default]
    Anime,
    Photorealistic,
    Artistic,
    Cinematic,
}

/// Prompt mutation knobs. Unset fields fall back to the defaults documented
/// on each accessor, so templates and schedules can overlay each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOptions {
    pub style_category: Option<StyleCategory>,
    pub add_quality: Option<bool>,
    pub add_style_modifier: Option<bool>,
    pub add_adjectives: Option<bool>,
    pub max_adjectives: Option<usize>,
    pub seed: Option<u64>,
}

impl MutationOptions {
    /// Fields set on `overrides` win over fields set on `self`.
    pub fn overlay(&self, overrides: &MutationOptions) -> MutationOptions {
        MutationOptions {
            style_category: overrides.style_category.or(self.style_category),
            add_quality: overrides.add_quality.or(self.add_quality),
            add_style_modifier: overrides.add_style_modifier.or(self.add_style_modifier),
            add_adjectives: overrides.add_adjectives.or(self.add_adjectives),
            max_adjectives: overrides.max_adjectives.or(self.max_adjectives),
            seed: overrides.seed.or(self.seed),
        }
    }

    /// Defaults to anime.
    pub fn style_category(&self) -> StyleCategory {
        self.style_category.unwrap_or_default()
    }

    pub fn add_quality(&self) -> bool {
        self.add_quality.unwrap_or(true)
    }

    pub fn add_style_modifier(&self) -> bool {
        self.add_style_modifier.unwrap_or(true)
    }

    pub fn add_adjectives(&self) -> bool {
        self.add_adjectives.unwrap_or(true)
    }

    /// Defaults to 3.
    pub fn max_adjectives(&self) -> usize {
        self.max_adjectives.unwrap_or(3)
    }
}

/// Parameters of a generate-image or generate-video action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSpec {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Source frame for image-to-video.
    #[serde(default)]
    pub input_image_url: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub auto_publish: bool,
    #[serde(default)]
    pub social_platforms: Vec<String>,
    #[serde(default)]
    pub mutation_enabled: bool,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub mutation_options: MutationOptions,
}

impl GenerationSpec {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn wants_auto_publish(&self) -> bool {
        self.auto_publish && !self.social_platforms.is_empty()
    }
}

/// What a schedule does when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ScheduleAction {
    GenerateImage(GenerationSpec),
    GenerateVideo(GenerationSpec),
    PublishPost { post_id: String },
}

impl ScheduleAction {
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::GenerateImage(_) => ActionType::GenerateImage,
            Self::GenerateVideo(_) => ActionType::GenerateVideo,
            Self::PublishPost { .. } => ActionType::PublishPost,
        }
    }

    pub fn generation_spec(&self) -> Option<&GenerationSpec> {
        match self {
            Self::GenerateImage(spec) | Self::GenerateVideo(spec) => Some(spec),
            Self::PublishPost { .. } => None,
        }
    }
}

/// Discriminant of [`ScheduleAction`], used for filtering and storage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    GenerateImage,
    GenerateVideo,
    PublishPost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub user_id: String,
    pub description: Option<String>,
    pub action: ScheduleAction,
    pub timing: ScheduleTiming,
    pub mutation_enabled: bool,
    pub status: ScheduleStatus,
    pub execution_count: u32,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn kind(&self) -> ScheduleKind {
        self.timing.kind()
    }
}

/// Input for a schedule that fires once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSingleSchedule {
    pub user_id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub action: ScheduleAction,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub mutation_enabled: bool,
}

/// Input for a cron-driven schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecurringSchedule {
    pub user_id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub action: ScheduleAction,
    pub cron_expression: String,
    #[serde(default)]
    pub max_executions: Option<u32>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mutation_enabled: bool,
}

/// A fully validated schedule ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSchedule {
    pub user_id: String,
    pub description: Option<String>,
    pub action: ScheduleAction,
    pub timing: ScheduleTiming,
    pub mutation_enabled: bool,
    pub status: ScheduleStatus,
}

/// Partial update of a schedule. Timing fields only apply to the matching kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    pub description: Option<String>,
    pub action: Option<ScheduleAction>,
    pub mutation_enabled: Option<bool>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub cron_expression: Option<String>,
    pub max_executions: Option<u32>,
    pub end_date: Option<DateTime<Utc>>,
}

impl ScheduleUpdate {
    pub fn touches_timing(&self) -> bool {
        self.scheduled_for.is_some()
            || self.cron_expression.is_some()
            || self.max_executions.is_some()
            || self.end_date.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleFilter {
    pub kind: Option<ScheduleKind>,
    pub status: Option<ScheduleStatus>,
    pub action_type: Option<ActionType>,
    pub page: PageRequest,
}

/// Per-user schedule counts for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStats {
    pub total: u64,
    pub single: u64,
    pub recurring: u64,
    pub by_status: BTreeMap<String, u64>,
    pub total_executions: u64,
}

impl ScheduleStats {
    pub fn count(&self, status: ScheduleStatus) -> u64 {
        self.by_status
            .get(&status.to_string())
            .copied()
            .unwrap_or(0)
    }
}

/// Outcome of running a schedule's action once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// State written back after an execution (or a recovered interruption).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub status: ScheduleStatus,
    pub executed_at: DateTime<Utc>,
    pub result: ExecutionResult,
    /// Recurring only; `None` clears the next run.
    pub next_execution_at: Option<DateTime<Utc>>,
}

/// Reusable base prompt with default mutation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub base_prompt: String,
    pub category: ContentType,
    pub nsfw: bool,
    pub style_category: StyleCategory,
    pub tags: Vec<String>,
    pub default_options: MutationOptions,
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPromptTemplate {
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    pub base_prompt: String,
    pub category: ContentType,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub style_category: StyleCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub default_options: MutationOptions,
}

/// Request handed to a media generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub user_id: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub model: Option<String>,
    pub input_image_url: Option<String>,
    pub parameters: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMedia {
    pub generation_id: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}
