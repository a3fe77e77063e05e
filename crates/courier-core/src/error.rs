// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier messaging channel.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// The primary error type used across all Courier crates.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Caller input or a precondition was rejected (bad address, oversized
    /// content, no connected session). Never retried internally.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced session, contact, or message does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The external transport failed or timed out.
    #[error("external service error: {message}")]
    ExternalService {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An awaited external operation exceeded its deadline.
    #[error("timed out after {duration:?}: {message}")]
    Timeout { message: String, duration: Duration },

    /// A concurrent bring-up for the same session did not settle in time.
    #[error("initialization of session {session_id} still in progress after {waited:?}")]
    InitInProgress { session_id: String, waited: Duration },

    /// Storage backend errors (connection, query failure, row decoding).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Shorthand for a [`CourierError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Wraps an arbitrary cause as an [`CourierError::ExternalService`].
    pub fn external(message: impl Into<String>, cause: OpaqueFailure) -> Self {
        Self::ExternalService {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Whether a calling scheduler may reasonably retry with a new attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalService { .. } | Self::Timeout { .. } | Self::InitInProgress { .. }
        )
    }

    /// Whether this is a caller-facing validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// An untyped failure reported by the external transport.
///
/// The automation client may fail with a structured error, a bare string,
/// or an arbitrary object. `OpaqueFailure` keeps a best-effort message for
/// callers and the original value for logs; it never assumes a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueFailure {
    message: String,
    original: Value,
}

impl OpaqueFailure {
    /// A failure with a known message and no structured payload.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            original: Value::String(message.clone()),
            message,
        }
    }

    /// Captures a Rust error, keeping its display text.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(err.to_string())
    }

    /// Extracts a message from an arbitrary JSON value.
    ///
    /// Strings are used verbatim. Objects yield their `message` field, then
    /// their `error` field (string or nested object), then their JSON text.
    /// Everything else uses its JSON text.
    pub fn from_value(original: Value) -> Self {
        let message = describe(&original);
        Self { message, original }
    }

    /// The best-effort human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The original value as reported by the transport.
    pub fn original(&self) -> &Value {
        &self.original
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "unknown error".to_string(),
        Value::Object(map) => {
            if let Some(Value::String(msg)) = map.get("message") {
                return msg.clone();
            }
            match map.get("error") {
                Some(Value::String(msg)) => msg.clone(),
                Some(nested @ Value::Object(_)) => describe(nested),
                _ => value.to_string(),
            }
        }
        other => other.to_string(),
    }
}

impl fmt::Display for OpaqueFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for OpaqueFailure {}

impl From<&str> for OpaqueFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for OpaqueFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<Value> for OpaqueFailure {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}
