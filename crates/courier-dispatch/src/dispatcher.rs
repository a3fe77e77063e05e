// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound dispatch pipeline.
//!
//! Validation and recipient resolution happen before any message row
//! exists. Once the `PENDING` row is written, every failure path reconciles
//! it to `FAILED` before the error is returned. The pipeline never retries;
//! schedulers that want a retry create a new send.

use std::sync::Arc;

use courier_config::DispatchConfig;
use courier_core::address::{chat_id, require_address};
use courier_core::{
    Contact, ContactDefaults, ContactRepository, ConversationRepository, CourierError, Direction,
    MediaFetcher, Message, MessageKind, MessageRepository, MessageStatus, NewMessage, SendRequest,
    SessionState, UserId,
};
use courier_resilience::TimeoutGuard;
use courier_session::{Session, SessionRegistry};
use tracing::{error, info, warn};

use crate::reconciler::StatusReconciler;

/// The repositories the pipeline reads and writes.
#[derive(Clone)]
pub struct Repositories {
    pub contacts: Arc<dyn ContactRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

/// Message body after validation.
struct Body {
    content: Option<String>,
    media_url: Option<String>,
}

/// Routes outbound messages through the user's connected session.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Pipeline>,
}

struct Pipeline {
    registry: Arc<SessionRegistry>,
    repos: Repositories,
    media: Arc<dyn MediaFetcher>,
    reconciler: Arc<StatusReconciler>,
    config: DispatchConfig,
    guard: TimeoutGuard,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        repos: Repositories,
        media: Arc<dyn MediaFetcher>,
        reconciler: Arc<StatusReconciler>,
        config: DispatchConfig,
    ) -> Self {
        let guard = TimeoutGuard::new(config.operation_timeout());
        Self {
            inner: Arc::new(Pipeline {
                registry,
                repos,
                media,
                reconciler,
                config,
                guard,
            }),
        }
    }

    /// Sends one message for `user_id`.
    ///
    /// Returns the persisted message in `SENT` state, or an error after the
    /// row (if one was created) has been marked `FAILED`. Once the row exists
    /// the rest of the pipeline runs on its own task, so a caller that stops
    /// waiting does not leave the row `PENDING`.
    pub async fn send(&self, user_id: &UserId, request: SendRequest) -> Result<Message, CourierError> {
        let pipeline = &self.inner;
        if user_id.as_str().trim().is_empty() {
            return Err(CourierError::Validation("user id is required".into()));
        }
        let body = pipeline.validate_body(&request)?;
        let contact = pipeline.resolve_contact(user_id, &request).await?;
        let conversation = pipeline
            .repos
            .conversations
            .find_or_create(user_id, &contact.id)
            .await?;

        let kind = if body.media_url.is_some() {
            MessageKind::Document
        } else {
            MessageKind::Text
        };
        let message = pipeline
            .repos
            .messages
            .create(NewMessage {
                user_id: user_id.to_string(),
                contact_id: contact.id.clone(),
                conversation_id: conversation.id.clone(),
                direction: Direction::Outgoing,
                kind,
                content: body.content.clone(),
                media_url: body.media_url.clone(),
                status: MessageStatus::Pending,
            })
            .await?;

        let message_id = message.id.clone();
        let task = tokio::spawn({
            let pipeline = pipeline.clone();
            let user_id = user_id.clone();
            async move {
                pipeline
                    .complete(&user_id, &request, &contact, body, message)
                    .await
            }
        });

        match task.await {
            Ok(result) => result,
            Err(join_err) => {
                error!(message_id = %message_id, error = %join_err, "dispatch task aborted");
                if let Err(mark_err) = pipeline.reconciler.mark_failed(&message_id).await {
                    error!(
                        message_id = %message_id,
                        error = %mark_err,
                        "could not mark message failed"
                    );
                }
                Err(CourierError::Internal(format!(
                    "dispatch of message {message_id} aborted: {join_err}"
                )))
            }
        }
    }
}

impl Pipeline {
    /// Delivers an already persisted message and reconciles its status.
    async fn complete(
        &self,
        user_id: &UserId,
        request: &SendRequest,
        contact: &Contact,
        body: Body,
        message: Message,
    ) -> Result<Message, CourierError> {
        match self.deliver(user_id, request, contact, body).await {
            Ok(external_id) => {
                info!(message_id = %message.id, external_id = %external_id, "message sent");
                match self.reconciler.mark_sent(&message.id, &external_id).await {
                    Ok(Some(sent)) => Ok(sent),
                    Ok(None) => self
                        .repos
                        .messages
                        .find_by_id(&message.id)
                        .await?
                        .ok_or_else(|| CourierError::not_found("message", message.id.as_str())),
                    Err(err) => {
                        error!(
                            message_id = %message.id,
                            external_id = %external_id,
                            error = %err,
                            "message was sent but its status could not be recorded"
                        );
                        Err(err)
                    }
                }
            }
            Err(err) => {
                warn!(message_id = %message.id, error = %err, "send failed");
                if let Err(mark_err) = self.reconciler.mark_failed(&message.id).await {
                    error!(
                        message_id = %message.id,
                        error = %mark_err,
                        "could not mark message failed"
                    );
                }
                Err(err)
            }
        }
    }

    fn validate_body(&self, request: &SendRequest) -> Result<Body, CourierError> {
        let content = request.content.clone().filter(|c| !c.is_empty());
        let media_url = request.media_url.clone().filter(|u| !u.trim().is_empty());
        if content.is_none() && media_url.is_none() {
            return Err(CourierError::Validation(
                "message content or media url is required".into(),
            ));
        }
        if let Some(text) = &content {
            let len = text.chars().count();
            if len > self.config.max_content_length {
                return Err(CourierError::Validation(format!(
                    "message content is {len} characters, exceeding the {} character limit",
                    self.config.max_content_length
                )));
            }
        }
        Ok(Body { content, media_url })
    }

    async fn resolve_contact(
        &self,
        user_id: &UserId,
        request: &SendRequest,
    ) -> Result<Contact, CourierError> {
        if let Some(contact_id) = &request.contact_id {
            return match self.repos.contacts.find_by_id(contact_id).await? {
                Some(contact) if contact.user_id == user_id.as_str() => Ok(contact),
                _ => Err(CourierError::not_found("contact", contact_id.as_str())),
            };
        }
        let raw = request.address.as_deref().ok_or_else(|| {
            CourierError::Validation("either a contact id or an address is required".into())
        })?;
        let address = require_address(raw, self.config.min_address_digits)?;
        self.repos
            .contacts
            .find_or_create(user_id, &address, ContactDefaults::default())
            .await
    }

    /// Steps that run after the row exists: session selection, live state
    /// check, registration check, and the guarded send.
    async fn deliver(
        &self,
        user_id: &UserId,
        request: &SendRequest,
        contact: &Contact,
        body: Body,
    ) -> Result<String, CourierError> {
        let session = self.select_session(user_id)?;
        let transport = session.transport().clone();

        let state = self
            .guard
            .run(transport.connection_state(), "connection state check")
            .await
            .map_err(as_external)?
            .map_err(|f| CourierError::external(format!("connection state check failed: {f}"), f))?;
        if state.as_deref() != Some(self.config.connected_state.as_str()) {
            return Err(CourierError::Validation(format!(
                "session {} is not connected: transport reports {}",
                session.id(),
                state.as_deref().unwrap_or("no state")
            )));
        }

        let raw = request
            .address
            .as_deref()
            .unwrap_or(contact.phone_number.as_str());
        let address = require_address(raw, self.config.min_address_digits)?;
        let chat = chat_id(&address);

        let registered = self
            .guard
            .run(transport.is_registered(&chat), "registration check")
            .await
            .map_err(as_external)?
            .map_err(|f| CourierError::external(format!("registration check failed: {f}"), f))?;
        if !registered {
            return Err(CourierError::Validation(format!(
                "{address} is not a registered account"
            )));
        }

        let sent = match body.media_url {
            Some(url) => {
                let media = self
                    .guard
                    .run(self.media.fetch(&url), "media fetch")
                    .await
                    .map_err(as_external)?
                    .map_err(|f| CourierError::external(format!("media fetch failed: {f}"), f))?;
                let caption = body.content;
                self.guard
                    .run_detached(
                        async move { transport.send_media(&chat, media, caption.as_deref()).await },
                        "send",
                    )
                    .await
            }
            None => {
                let text = body.content.unwrap_or_default();
                self.guard
                    .run_detached(async move { transport.send_text(&chat, &text).await }, "send")
                    .await
            }
        };
        sent.map_err(as_external)?
            .map_err(|f| CourierError::external(format!("send failed: {f}"), f))
    }

    /// Picks a `READY` session, else an `AUTHENTICATED` one.
    fn select_session(&self, user_id: &UserId) -> Result<Arc<Session>, CourierError> {
        let sessions = self.registry.list_by_user(user_id);
        let ready = sessions.iter().find(|s| s.state() == SessionState::Ready);
        let usable = ready.or_else(|| sessions.iter().find(|s| s.state().can_send()));
        if let Some(session) = usable {
            return Ok(session.clone());
        }

        let observed = if sessions.is_empty() {
            "no sessions".to_string()
        } else {
            sessions
                .iter()
                .map(|s| format!("{}={}", s.id(), s.state()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        Err(CourierError::Validation(format!(
            "not connected: no READY or AUTHENTICATED session (observed: {observed})"
        )))
    }
}

/// Deadline misses surface as external-service failures at this boundary.
fn as_external(err: CourierError) -> CourierError {
    match err {
        CourierError::Timeout { .. } => CourierError::ExternalService {
            message: err.to_string(),
            source: Some(Box::new(err)),
        },
        other => other,
    }
}
