// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions at the seams of the dispatch core.
//!
//! Traits use `#[async_trait]` for dynamic dispatch compatibility; the core
//! only ever holds them as `Arc<dyn ...>`.

pub mod media;
pub mod repository;
pub mod transport;

pub use media::MediaFetcher;
pub use repository::{ContactRepository, ConversationRepository, MessageRepository};
pub use transport::{Transport, TransportEvent, TransportFactory};
