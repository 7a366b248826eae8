// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock media generation backend.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use cadence_core::types::{GeneratedMedia, GenerationRequest};
use cadence_core::{CadenceError, GenerationBackend};

/// Returns canned media URLs, or scripted failures, and records requests.
#[derive(Default)]
pub struct MockGeneration {
    failures: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next generation call fail with `message`.
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.failures.lock().await.push_back(message.into());
    }

    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    async fn respond(
        &self,
        request: &GenerationRequest,
        extension: &str,
    ) -> Result<GeneratedMedia, CadenceError> {
        let mut requests = self.requests.lock().await;
        requests.push(request.clone());
        if let Some(message) = self.failures.lock().await.pop_front() {
            return Err(CadenceError::Generation {
                message,
                source: None,
            });
        }
        let n = requests.len();
        Ok(GeneratedMedia {
            generation_id: format!("gen-{n}"),
            url: format!("https://media.test/{n}.{extension}"),
            thumbnail_url: (extension == "mp4").then(|| format!("https://media.test/{n}.jpg")),
        })
    }
}

#[async_trait]
impl GenerationBackend for MockGeneration {
    async fn generate_image(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedMedia, CadenceError> {
        self.respond(request, "png").await
    }

    async fn generate_video(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedMedia, CadenceError> {
        self.respond(request, "mp4").await
    }
}
