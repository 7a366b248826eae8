// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`GenerationBackend`] that forwards requests to an HTTP generation service.
//!
//! The service receives the [`GenerationRequest`] as JSON on `/images` or
//! `/videos` and answers with a [`GeneratedMedia`] body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use cadence_config::model::GenerationConfig;
use cadence_core::types::{GeneratedMedia, GenerationRequest};
use cadence_core::{CadenceError, GenerationBackend};

fn generation_error(message: String, source: Option<reqwest::Error>) -> CadenceError {
    CadenceError::Generation {
        message,
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    }
}

pub struct HttpGeneration {
    client: reqwest::Client,
    /// `None` when no endpoint is configured; every call then fails.
    endpoint: Option<String>,
}

impl HttpGeneration {
    pub fn from_config(config: &GenerationConfig) -> Result<Self, CadenceError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                    CadenceError::Config(format!("invalid generation API key header value: {e}"))
                })?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| generation_error(format!("failed to build HTTP client: {e}"), Some(e)))?;

        Ok(Self {
            client,
            endpoint: config
                .endpoint
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    async fn call(
        &self,
        route: &str,
        request: &GenerationRequest,
    ) -> Result<GeneratedMedia, CadenceError> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Err(generation_error(
                "no generation endpoint configured".to_string(),
                None,
            ));
        };

        debug!(route, user_id = %request.user_id, "requesting generation");
        let response = self
            .client
            .post(format!("{endpoint}/{route}"))
            .json(request)
            .send()
            .await
            .map_err(|e| generation_error(format!("generation request failed: {e}"), Some(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(generation_error(
                format!("generation service returned {}: {body}", status.as_u16()),
                None,
            ));
        }

        response
            .json::<GeneratedMedia>()
            .await
            .map_err(|e| generation_error(format!("invalid generation response: {e}"), Some(e)))
    }
}

#[async_trait]
impl GenerationBackend for HttpGeneration {
    async fn generate_image(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedMedia, CadenceError> {
        self.call("images", request).await
    }

    async fn generate_video(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedMedia, CadenceError> {
        self.call("videos", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            user_id: "u1".into(),
            prompt: "neon alley, moody".into(),
            negative_prompt: None,
            model: Some("sdxl".into()),
            input_image_url: None,
            parameters: BTreeMap::new(),
        }
    }

    fn backend(endpoint: Option<String>) -> HttpGeneration {
        HttpGeneration::from_config(&GenerationConfig {
            endpoint,
            api_key: Some("gen-key".into()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn image_request_posts_json_and_parses_media() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images"))
            .and(header("authorization", "Bearer gen-key"))
            .and(body_partial_json(serde_json::json!({
                "prompt": "neon alley, moody",
                "userId": "u1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "generationId": "g-1",
                "url": "https://cdn.test/g-1.png"
            })))
            .mount(&server)
            .await;

        let media = backend(Some(server.uri())).generate_image(&request()).await.unwrap();
        assert_eq!(media.generation_id, "g-1");
        assert_eq!(media.thumbnail_url, None);
    }

    #[tokio::test]
    async fn video_errors_carry_the_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(500).set_body_string("gpu busy"))
            .mount(&server)
            .await;

        let err = backend(Some(server.uri())).generate_video(&request()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "generation error: generation service returned 500: gpu busy"
        );
    }

    #[tokio::test]
    async fn missing_endpoint_fails_every_call() {
        let err = backend(None).generate_image(&request()).await.unwrap_err();
        assert!(matches!(err, CadenceError::Generation { .. }));
    }
}
