// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media generation backend.

use async_trait::async_trait;

use crate::error::CadenceError;
use crate::types::{GeneratedMedia, GenerationRequest};

/// Produces images and videos from prompts. Calls may take minutes.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate_image(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedMedia, CadenceError>;

    async fn generate_video(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedMedia, CadenceError>;
}
