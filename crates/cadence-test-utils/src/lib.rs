// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Cadence integration tests.
//!
//! Provides mock collaborators and a test harness for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`ManualClock`] - Clock that only moves when told to
//! - [`MockGateway`] - Publish gateway with scripted outcomes and call capture
//! - [`MockGeneration`] - Generation backend returning canned media
//! - [`TestHarness`] - Every service wired over a temp SQLite database

pub mod clock;
pub mod harness;
pub mod mock_gateway;
pub mod mock_generation;

pub use clock::ManualClock;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_gateway::MockGateway;
pub use mock_generation::MockGeneration;
