// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the repository traits.

use async_trait::async_trait;
use courier_core::{
    Contact, ContactDefaults, ContactRepository, Conversation, ConversationRepository,
    CourierError, Message, MessagePatch, MessageRepository, NewMessage, UserId,
};

use crate::database::Database;
use crate::queries::{contacts, conversations, messages};

/// SQLite-backed repositories.
///
/// One store serves all three repository traits; share it behind an `Arc`.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Checkpoints the WAL; used on shutdown while the store is still shared.
    pub async fn checkpoint(&self) -> Result<(), CourierError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl ContactRepository for SqliteStore {
    async fn find_or_create(
        &self,
        user_id: &UserId,
        phone_number: &str,
        defaults: ContactDefaults,
    ) -> Result<Contact, CourierError> {
        contacts::find_or_create(&self.db, user_id.as_str(), phone_number, defaults.name).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Contact>, CourierError> {
        contacts::find_by_id(&self.db, id).await
    }
}

#[async_trait]
impl ConversationRepository for SqliteStore {
    async fn find_or_create(
        &self,
        user_id: &UserId,
        contact_id: &str,
    ) -> Result<Conversation, CourierError> {
        conversations::find_or_create(&self.db, user_id.as_str(), contact_id).await
    }
}

#[async_trait]
impl MessageRepository for SqliteStore {
    async fn create(&self, fields: NewMessage) -> Result<Message, CourierError> {
        messages::insert_message(&self.db, fields).await
    }

    async fn update(&self, id: &str, patch: MessagePatch) -> Result<Message, CourierError> {
        messages::update_message(&self.db, id, patch)
            .await?
            .ok_or_else(|| CourierError::not_found("message", id))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Message>, CourierError> {
        messages::get_message(&self.db, id).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Message>, CourierError> {
        messages::get_message_by_external_id(&self.db, external_id).await
    }
}
