// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`PublishGateway`] backed by the Late.dev posts API.
//!
//! Refusals are decided locally before any network call: no platforms on the
//! post, no publishing profile for the user, every platform filtered out as
//! NSFW-incompatible, or no connected account on the remaining platforms.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, info};

use cadence_config::model::LateConfig;
use cadence_core::types::{ContentType, Post, PublishOutcome};
use cadence_core::{AccountDirectory, CadenceError, PublishGateway};

/// Environment variable consulted when `late.api_key` is not configured.
pub const API_KEY_ENV: &str = "LATE_API_KEY";

/// Platforms that reject NSFW media.
const NSFW_BLOCKED_PLATFORMS: &[&str] = &["instagram"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaItem<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlatformTarget<'a> {
    platform: &'a str,
    account_id: &'a str,
    platform_specific_data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePost<'a> {
    content: &'a str,
    media_items: Vec<MediaItem<'a>>,
    platforms: Vec<PlatformTarget<'a>>,
}

/// Late.dev publishing client.
#[derive(Clone)]
pub struct LateGateway {
    client: reqwest::Client,
    base_url: String,
    accounts: Arc<dyn AccountDirectory>,
}

impl LateGateway {
    /// Builds the client from config, reading the key from `LATE_API_KEY`
    /// when the config leaves it unset.
    pub fn from_config(
        config: &LateConfig,
        accounts: Arc<dyn AccountDirectory>,
        timeout: Duration,
    ) -> Result<Self, CadenceError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                CadenceError::Config(format!(
                    "late.api_key is not set (config or {API_KEY_ENV})"
                ))
            })?;
        Self::new(&api_key, config.base_url.clone(), accounts, timeout)
    }

    pub fn new(
        api_key: &str,
        base_url: String,
        accounts: Arc<dyn AccountDirectory>,
        timeout: Duration,
    ) -> Result<Self, CadenceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                CadenceError::Config(format!("invalid Late API key header value: {e}"))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| CadenceError::Publish {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            accounts,
        })
    }

    fn posts_url(&self) -> String {
        format!("{}/posts", self.base_url)
    }
}

fn allowed_platforms(post: &Post) -> Vec<&str> {
    post.social_platforms
        .iter()
        .map(String::as_str)
        .filter(|platform| !(post.nsfw && NSFW_BLOCKED_PLATFORMS.contains(platform)))
        .collect()
}

fn media_items(post: &Post) -> Vec<MediaItem<'_>> {
    let kind = match post.content_type {
        ContentType::Image => "image",
        ContentType::Video => "video",
    };
    post.media_url()
        .map(|url| vec![MediaItem { url, kind }])
        .unwrap_or_default()
}

/// Late has returned the created post's id under each of these keys.
fn external_id(body: &serde_json::Value) -> Option<String> {
    ["id", "_id", "postId"]
        .iter()
        .find_map(|key| body.get(*key))
        .and_then(|value| match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

#[async_trait]
impl PublishGateway for LateGateway {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, CadenceError> {
        if post.social_platforms.is_empty() {
            return Ok(PublishOutcome::refused("no_platforms"));
        }

        let Some(profile) = self.accounts.publish_profile(&post.user_id).await? else {
            debug!(post_id = %post.id, user_id = %post.user_id, "no Late profile for user");
            return Ok(PublishOutcome::refused("no_profile"));
        };

        let allowed = allowed_platforms(post);
        if allowed.is_empty() {
            return Ok(PublishOutcome::refused("nsfw_filtered"));
        }

        let targets: Vec<PlatformTarget<'_>> = profile
            .connections
            .iter()
            .filter(|conn| allowed.contains(&conn.platform.as_str()))
            .map(|conn| PlatformTarget {
                platform: &conn.platform,
                account_id: &conn.account_id,
                platform_specific_data: serde_json::Map::new(),
            })
            .collect();
        if targets.is_empty() {
            return Ok(PublishOutcome::refused("no_connections"));
        }

        let body = CreatePost {
            content: &post.content.prompt,
            media_items: media_items(post),
            platforms: targets,
        };

        let response = self
            .client
            .post(self.posts_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| CadenceError::Publish {
                message: format!("Late request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| CadenceError::Publish {
            message: format!("failed to read Late response: {e}"),
            source: Some(Box::new(e)),
        })?;
        let json: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();

        if !status.is_success() {
            let message = json
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Late.dev API error: {}", status.as_u16()));
            return Err(CadenceError::Publish {
                message,
                source: None,
            });
        }

        let external_id = external_id(&json);
        let platforms: Vec<String> = allowed.iter().map(|p| p.to_string()).collect();
        info!(
            post_id = %post.id,
            external_id = external_id.as_deref().unwrap_or("-"),
            platforms = ?platforms,
            "published post to Late"
        );
        Ok(PublishOutcome::success(platforms, external_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use cadence_core::types::{PostContent, PostStatus, PublishProfile, SocialConnection};

    #[derive(Default)]
    struct Accounts(HashMap<String, PublishProfile>);

    #[async_trait]
    impl AccountDirectory for Accounts {
        async fn publish_profile(
            &self,
            user_id: &str,
        ) -> Result<Option<PublishProfile>, CadenceError> {
            Ok(self.0.get(user_id).cloned())
        }
    }

    fn accounts(connections: &[(&str, &str)]) -> Arc<dyn AccountDirectory> {
        let mut map = HashMap::new();
        map.insert(
            "u1".to_string(),
            PublishProfile {
                user_id: "u1".into(),
                profile_id: "prof-1".into(),
                connections: connections
                    .iter()
                    .map(|(platform, account)| SocialConnection {
                        platform: platform.to_string(),
                        account_id: account.to_string(),
                    })
                    .collect(),
            },
        );
        Arc::new(Accounts(map))
    }

    fn post(platforms: &[&str], nsfw: bool) -> Post {
        let now = Utc::now();
        Post {
            id: "p1".into(),
            user_id: "u1".into(),
            content_type: ContentType::Image,
            content: PostContent {
                image_url: Some("https://cdn.test/p1.png".into()),
                prompt: "harbor at dawn".into(),
                ..Default::default()
            },
            nsfw,
            status: PostStatus::Draft,
            social_platforms: platforms.iter().map(|p| p.to_string()).collect(),
            mutation: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn gateway(base_url: String, accounts: Arc<dyn AccountDirectory>) -> LateGateway {
        LateGateway::new("test-key", base_url, accounts, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn refusals_happen_before_any_request() {
        let server = MockServer::start().await;
        let gw = gateway(server.uri(), accounts(&[("twitter", "acc-tw")]));

        let outcome = gw.publish(&post(&[], false)).await.unwrap();
        assert_eq!(outcome.reason.as_deref(), Some("no_platforms"));

        let outcome = gw.publish(&post(&["instagram"], true)).await.unwrap();
        assert_eq!(outcome.reason.as_deref(), Some("nsfw_filtered"));

        let outcome = gw.publish(&post(&["tiktok"], false)).await.unwrap();
        assert_eq!(outcome.reason.as_deref(), Some("no_connections"));

        let gw = gateway(server.uri(), Arc::new(Accounts::default()));
        let outcome = gw.publish(&post(&["twitter"], false)).await.unwrap();
        assert_eq!(outcome.reason.as_deref(), Some("no_profile"));

        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn publishes_to_connected_platforms() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "content": "harbor at dawn",
                "mediaItems": [{"url": "https://cdn.test/p1.png", "type": "image"}],
                "platforms": [{
                    "platform": "twitter",
                    "accountId": "acc-tw",
                    "platformSpecificData": {}
                }]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"_id": "late-9"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gw = gateway(server.uri(), accounts(&[("twitter", "acc-tw")]));
        let outcome = gw.publish(&post(&["twitter", "instagram"], true)).await.unwrap();
        assert!(outcome.published);
        assert_eq!(outcome.platforms, vec!["twitter".to_string()]);
        assert_eq!(outcome.external_id.as_deref(), Some("late-9"));
    }

    #[tokio::test]
    async fn api_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({"message": "media too large"})),
            )
            .mount(&server)
            .await;

        let gw = gateway(server.uri(), accounts(&[("twitter", "acc-tw")]));
        let err = gw.publish(&post(&["twitter"], false)).await.unwrap_err();
        assert!(matches!(
            err,
            CadenceError::Publish { ref message, .. } if message == "media too large"
        ));
    }

    #[tokio::test]
    async fn status_is_reported_without_an_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let gw = gateway(server.uri(), accounts(&[("twitter", "acc-tw")]));
        let err = gw.publish(&post(&["twitter"], false)).await.unwrap_err();
        assert_eq!(err.to_string(), "publish error: Late.dev API error: 503");
    }

    #[test]
    fn external_id_checks_known_keys() {
        assert_eq!(external_id(&serde_json::json!({"id": "a"})).as_deref(), Some("a"));
        assert_eq!(external_id(&serde_json::json!({"postId": 7})).as_deref(), Some("7"));
        assert_eq!(external_id(&serde_json::json!({"other": "x"})), None);
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let config = LateConfig {
            api_key: Some("  ".into()),
            ..Default::default()
        };
        let result = LateGateway::from_config(&config, accounts(&[]), Duration::from_secs(1));
        assert!(matches!(result, Err(CadenceError::Config(_))));
    }
}
