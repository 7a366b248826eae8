// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Posts and the social publishing boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CadenceError;
use crate::types::{NewPost, Post, PostStatus, PublishOutcome, PublishProfile};

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get_post(&self, post_id: &str) -> Result<Option<Post>, CadenceError>;

    /// Sets the status, stamping `publishedAt` when it becomes `published`.
    async fn set_post_status(
        &self,
        post_id: &str,
        status: PostStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError>;

    async fn create_post(&self, post: &NewPost) -> Result<Post, CadenceError>;
}

/// Publishes a post to its social platforms.
///
/// `Ok` with `published == false` is a refusal (no platforms, no accounts).
/// `Err` is a transport or API failure. Callers treat both as failed attempts.
#[async_trait]
pub trait PublishGateway: Send + Sync {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, CadenceError>;
}

/// Lookup of a user's publishing profile and connected accounts.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn publish_profile(&self, user_id: &str)
    -> Result<Option<PublishProfile>, CadenceError>;
}
