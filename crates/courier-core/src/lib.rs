// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier messaging channel.
//!
//! This crate provides the error taxonomy, domain types, address
//! normalization, and the trait seams (transport, repositories, media)
//! shared by the session supervisor and the dispatch pipeline.

pub mod address;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{CourierError, OpaqueFailure};
pub use types::{
    Contact, ContactDefaults, Conversation, Direction, InboundMessage, MediaPayload, Message,
    MessageKind, MessagePatch, MessageStatus, NewMessage, SendRequest, SessionId, SessionState,
    SessionStatus, UserId,
};

pub use traits::{
    ContactRepository, ConversationRepository, MediaFetcher, MessageRepository, Transport,
    TransportEvent, TransportFactory,
};
