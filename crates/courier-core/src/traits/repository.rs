// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Narrow persistence interfaces consumed by the dispatch pipeline.
//!
//! The relational store owning contacts, conversations, and messages lives
//! outside the core; these are the only operations the core relies on.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{
    Contact, ContactDefaults, Conversation, Message, MessagePatch, NewMessage, UserId,
};

/// Contact lookup and creation.
#[async_trait]
pub trait ContactRepository: Send + Sync + 'static {
    /// Returns the contact for `(user_id, phone_number)`, creating it with
    /// `defaults` if none exists. Concurrent callers converge on one row.
    async fn find_or_create(
        &self,
        user_id: &UserId,
        phone_number: &str,
        defaults: ContactDefaults,
    ) -> Result<Contact, CourierError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Contact>, CourierError>;
}

/// Conversation lookup and creation.
#[async_trait]
pub trait ConversationRepository: Send + Sync + 'static {
    /// Returns the conversation for `(user_id, contact_id)`, creating it if needed.
    async fn find_or_create(
        &self,
        user_id: &UserId,
        contact_id: &str,
    ) -> Result<Conversation, CourierError>;
}

/// Message persistence.
#[async_trait]
pub trait MessageRepository: Send + Sync + 'static {
    async fn create(&self, fields: NewMessage) -> Result<Message, CourierError>;

    /// Applies `patch` and returns the updated row, or `NotFound`.
    async fn update(&self, id: &str, patch: MessagePatch) -> Result<Message, CourierError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Message>, CourierError>;

    async fn find_by_external_id(&self, external_id: &str)
    -> Result<Option<Message>, CourierError>;
}
