// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch of schedule actions.
//!
//! Generation actions build the prompt (template expansion or mutation when
//! enabled), call the generation backend, store the result as a new post and
//! optionally publish it. Publish actions push an existing post through the
//! gateway. The returned JSON is stored as the schedule's `lastResult`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{info, warn};

use cadence_core::types::{
    ContentType, GeneratedMedia, GenerationRequest, GenerationSpec, MutationRecord, NewPost,
    Post, PostContent, PostStatus, PublishOutcome, Schedule, ScheduleAction,
};
use cadence_core::{
    CadenceError, Clock, GenerationBackend, PostStore, PublishGateway, TemplateStore,
};

use crate::mutation::{TemplateExpander, mutate_prompt};

pub struct ActionExecutor {
    posts: Arc<dyn PostStore>,
    generation: Arc<dyn GenerationBackend>,
    gateway: Arc<dyn PublishGateway>,
    templates: TemplateExpander,
    clock: Arc<dyn Clock>,
    publish_timeout: Duration,
}

impl ActionExecutor {
    pub fn new(
        posts: Arc<dyn PostStore>,
        generation: Arc<dyn GenerationBackend>,
        gateway: Arc<dyn PublishGateway>,
        templates: Arc<dyn TemplateStore>,
        clock: Arc<dyn Clock>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            posts,
            generation,
            gateway,
            templates: TemplateExpander::new(templates, clock.clone()),
            clock,
            publish_timeout,
        }
    }

    /// Runs the schedule's action once.
    pub async fn execute(&self, schedule: &Schedule) -> Result<Value, CadenceError> {
        match &schedule.action {
            ScheduleAction::GenerateImage(spec) => {
                self.generate(schedule, spec, ContentType::Image).await
            }
            ScheduleAction::GenerateVideo(spec) => {
                self.generate(schedule, spec, ContentType::Video).await
            }
            ScheduleAction::PublishPost { post_id } => {
                self.publish_existing(schedule, post_id).await
            }
        }
    }

    /// The prompt sent to the backend.
    ///
    /// With mutation on (schedule or action), a template expands and a plain
    /// prompt is mutated. With it off the prompt goes out as written; a blank
    /// prompt falls back to the template's base prompt verbatim.
    async fn prepare_prompt(
        &self,
        schedule: &Schedule,
        spec: &GenerationSpec,
    ) -> Result<(String, Option<MutationRecord>), CadenceError> {
        let mutation_on = schedule.mutation_enabled || spec.mutation_enabled;
        match &spec.template_id {
            Some(template_id) if mutation_on => {
                let mutated = self
                    .templates
                    .expand(template_id, &spec.mutation_options)
                    .await?;
                Ok((mutated.prompt, Some(mutated.record)))
            }
            _ if mutation_on => {
                let mutated = mutate_prompt(&spec.prompt, &spec.mutation_options);
                Ok((mutated.prompt, Some(mutated.record)))
            }
            Some(template_id) if spec.prompt.trim().is_empty() => {
                Ok((self.templates.base_prompt(template_id).await?, None))
            }
            _ => Ok((spec.prompt.clone(), None)),
        }
    }

    async fn generate(
        &self,
        schedule: &Schedule,
        spec: &GenerationSpec,
        content_type: ContentType,
    ) -> Result<Value, CadenceError> {
        let (prompt, mutation) = self.prepare_prompt(schedule, spec).await?;
        let request = GenerationRequest {
            user_id: schedule.user_id.clone(),
            prompt: prompt.clone(),
            negative_prompt: spec.negative_prompt.clone(),
            model: spec.model.clone(),
            input_image_url: spec.input_image_url.clone(),
            parameters: spec.parameters.clone(),
        };
        let media: GeneratedMedia = match content_type {
            ContentType::Image => self.generation.generate_image(&request).await?,
            ContentType::Video => self.generation.generate_video(&request).await?,
        };

        let mut content = PostContent {
            thumbnail_url: media.thumbnail_url.clone(),
            prompt,
            negative_prompt: spec.negative_prompt.clone(),
            model: spec.model.clone(),
            parameters: spec.parameters.clone(),
            ..Default::default()
        };
        let media_key = match content_type {
            ContentType::Image => {
                content.image_url = Some(media.url.clone());
                "imageUrl"
            }
            ContentType::Video => {
                content.video_url = Some(media.url.clone());
                "videoUrl"
            }
        };

        let post = self
            .posts
            .create_post(&NewPost {
                user_id: schedule.user_id.clone(),
                content_type,
                content,
                nsfw: spec.nsfw,
                social_platforms: spec.social_platforms.clone(),
                mutation: mutation.clone(),
            })
            .await?;
        info!(
            schedule_id = %schedule.id,
            post_id = %post.id,
            generation_id = %media.generation_id,
            "generated {content_type} post"
        );

        let mut result = json!({
            "postId": post.id,
            "generationId": media.generation_id,
            "mutationData": mutation,
        });
        result[media_key] = Value::String(media.url);

        if spec.wants_auto_publish() {
            // Auto-publish is best effort; the generated post stays either way.
            let outcome = match self.publish(&post).await {
                Ok(outcome) => outcome,
                Err(e) => PublishOutcome::failed(e.to_string()),
            };
            if !outcome.published {
                warn!(
                    schedule_id = %schedule.id,
                    post_id = %post.id,
                    reason = %outcome.failure_message(),
                    "auto-publish did not go out"
                );
            }
            result["publish"] = json!(outcome);
        }
        Ok(result)
    }

    async fn publish_existing(
        &self,
        schedule: &Schedule,
        post_id: &str,
    ) -> Result<Value, CadenceError> {
        let post = match self.posts.get_post(post_id).await? {
            Some(post) if post.user_id == schedule.user_id => post,
            _ => {
                return Err(CadenceError::Validation(format!(
                    "post not found: {post_id}"
                )));
            }
        };
        if post.status == PostStatus::Published {
            return Ok(json!({ "postId": post.id, "alreadyPublished": true }));
        }

        let outcome = self.publish(&post).await?;
        if !outcome.published {
            return Err(CadenceError::Publish {
                message: outcome.failure_message(),
                source: None,
            });
        }
        info!(schedule_id = %schedule.id, post_id = %post.id, "scheduled post published");
        Ok(json!({
            "postId": post.id,
            "platforms": outcome.platforms,
            "externalId": outcome.external_id,
        }))
    }

    /// Publishes within the timeout and marks the post published on success.
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, CadenceError> {
        let outcome = tokio::time::timeout(self.publish_timeout, self.gateway.publish(post))
            .await
            .map_err(|_| CadenceError::Timeout {
                duration: self.publish_timeout,
            })??;
        if outcome.published {
            self.posts
                .set_post_status(&post.id, PostStatus::Published, self.clock.now())
                .await?;
        }
        Ok(outcome)
    }
}
