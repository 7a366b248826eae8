// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock publish gateway for deterministic testing.
//!
//! Outcomes are popped from a FIFO script. When the script is empty, every
//! publish succeeds on the post's own platforms.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use cadence_core::types::{Post, PublishOutcome};
use cadence_core::{CadenceError, PublishGateway};

enum Scripted {
    Outcome(PublishOutcome),
    Error(String),
    Stall(Duration),
}

#[derive(Default)]
pub struct MockGateway {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Post>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next call.
    pub async fn push_outcome(&self, outcome: PublishOutcome) {
        self.script.lock().await.push_back(Scripted::Outcome(outcome));
    }

    /// Queue a transport error for the next call.
    pub async fn push_error(&self, message: impl Into<String>) {
        self.script
            .lock()
            .await
            .push_back(Scripted::Error(message.into()));
    }

    /// Make the next call sleep for `delay` before succeeding.
    pub async fn push_stall(&self, delay: Duration) {
        self.script.lock().await.push_back(Scripted::Stall(delay));
    }

    /// Posts handed to `publish`, in call order.
    pub async fn calls(&self) -> Vec<Post> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

fn success(post: &Post) -> PublishOutcome {
    PublishOutcome::success(
        post.social_platforms.clone(),
        Some(format!("late-{}", post.id)),
    )
}

#[async_trait]
impl PublishGateway for MockGateway {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, CadenceError> {
        self.calls.lock().await.push(post.clone());
        let next = self.script.lock().await.pop_front();
        match next {
            None => Ok(success(post)),
            Some(Scripted::Outcome(outcome)) => Ok(outcome),
            Some(Scripted::Error(message)) => Err(CadenceError::Publish {
                message,
                source: None,
            }),
            Some(Scripted::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(success(post))
            }
        }
    }
}
