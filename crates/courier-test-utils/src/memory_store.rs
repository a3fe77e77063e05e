// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory repositories for deterministic testing.
//!
//! `InMemoryStore` implements the contact, conversation, and message
//! repositories over plain maps, with helpers for seeding contacts and
//! inspecting persisted messages.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use courier_core::{
    Contact, ContactDefaults, ContactRepository, Conversation, ConversationRepository,
    CourierError, Message, MessagePatch, MessageRepository, MessageStatus, NewMessage, UserId,
};

#[derive(Default)]
struct Tables {
    contacts: Vec<Contact>,
    conversations: Vec<Conversation>,
    messages: HashMap<String, Message>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a contact and returns it.
    pub fn insert_contact(&self, user_id: &str, phone_number: &str, name: Option<&str>) -> Contact {
        let contact = Contact {
            id: new_id(),
            user_id: user_id.to_string(),
            phone_number: phone_number.to_string(),
            name: name.map(String::from),
            created_at: Utc::now(),
        };
        self.tables().contacts.push(contact.clone());
        contact
    }

    pub fn messages(&self) -> Vec<Message> {
        self.tables().messages.values().cloned().collect()
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.tables().messages.get(id).cloned()
    }

    pub fn count_with_status(&self, status: MessageStatus) -> usize {
        self.tables()
            .messages
            .values()
            .filter(|m| m.status == status)
            .count()
    }

    pub fn contact_count(&self) -> usize {
        self.tables().contacts.len()
    }
}

#[async_trait]
impl ContactRepository for InMemoryStore {
    async fn find_or_create(
        &self,
        user_id: &UserId,
        phone_number: &str,
        defaults: ContactDefaults,
    ) -> Result<Contact, CourierError> {
        let mut tables = self.tables();
        if let Some(existing) = tables
            .contacts
            .iter()
            .find(|c| c.user_id == user_id.as_str() && c.phone_number == phone_number)
        {
            return Ok(existing.clone());
        }
        let contact = Contact {
            id: new_id(),
            user_id: user_id.to_string(),
            phone_number: phone_number.to_string(),
            name: defaults.name,
            created_at: Utc::now(),
        };
        tables.contacts.push(contact.clone());
        Ok(contact)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Contact>, CourierError> {
        Ok(self.tables().contacts.iter().find(|c| c.id == id).cloned())
    }
}

#[async_trait]
impl ConversationRepository for InMemoryStore {
    async fn find_or_create(
        &self,
        user_id: &UserId,
        contact_id: &str,
    ) -> Result<Conversation, CourierError> {
        let mut tables = self.tables();
        if let Some(existing) = tables
            .conversations
            .iter()
            .find(|c| c.user_id == user_id.as_str() && c.contact_id == contact_id)
        {
            return Ok(existing.clone());
        }
        let conversation = Conversation {
            id: new_id(),
            user_id: user_id.to_string(),
            contact_id: contact_id.to_string(),
            last_message_at: None,
            created_at: Utc::now(),
        };
        tables.conversations.push(conversation.clone());
        Ok(conversation)
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(&self, fields: NewMessage) -> Result<Message, CourierError> {
        let now = Utc::now();
        let message = Message {
            id: new_id(),
            user_id: fields.user_id,
            contact_id: fields.contact_id,
            conversation_id: fields.conversation_id,
            direction: fields.direction,
            kind: fields.kind,
            content: fields.content,
            media_url: fields.media_url,
            status: fields.status,
            external_id: None,
            created_at: now,
            delivered_at: None,
            read_at: None,
        };
        let mut tables = self.tables();
        if let Some(conversation) = tables
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
        {
            conversation.last_message_at = Some(now);
        }
        tables.messages.insert(message.id.clone(), message.clone());
        Ok(message)
    }

    async fn update(&self, id: &str, patch: MessagePatch) -> Result<Message, CourierError> {
        let mut tables = self.tables();
        let message = tables
            .messages
            .get_mut(id)
            .ok_or_else(|| CourierError::not_found("message", id))?;
        if let Some(status) = patch.status {
            message.status = status;
        }
        if let Some(external_id) = patch.external_id {
            message.external_id = Some(external_id);
        }
        if let Some(at) = patch.delivered_at {
            message.delivered_at = Some(at);
        }
        if let Some(at) = patch.read_at {
            message.read_at = Some(at);
        }
        Ok(message.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Message>, CourierError> {
        Ok(self.tables().messages.get(id).cloned())
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Message>, CourierError> {
        Ok(self
            .tables()
            .messages
            .values()
            .find(|m| m.external_id.as_deref() == Some(external_id))
            .cloned())
    }
}
