// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without a browser sidecar or database.
//!
//! # Components
//!
//! - [`MockTransport`] / [`MockTransportFactory`] - scriptable transport that counts constructions
//! - [`InMemoryStore`] - contact, conversation, and message repositories over maps
//! - [`MockMediaFetcher`] - canned media payloads
//! - [`TestHarness`] - the full session + dispatch stack wired over the mocks

pub mod harness;
pub mod memory_store;
pub mod mock_media;
pub mod mock_transport;

pub use harness::{TestHarness, wait_for_state};
pub use memory_store::InMemoryStore;
pub use mock_media::MockMediaFetcher;
pub use mock_transport::{MOCK_ADDRESS, MockBehavior, MockTransport, MockTransportFactory, SentMessage};
