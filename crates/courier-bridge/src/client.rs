// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the sidecar API.
//!
//! Every failure is surfaced as an [`OpaqueFailure`]: non-2xx bodies are
//! kept as JSON when they parse, else as raw text.

use std::time::Duration;

use courier_config::BridgeConfig;
use courier_core::{CourierError, MediaPayload, OpaqueFailure, SessionId};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::protocol::{
    EventsPage, RegisteredRequest, RegisteredResponse, SendMediaRequest, SendTextRequest,
    SentResponse, StateResponse,
};

/// Client for one sidecar instance, shared by every session it hosts.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BridgeClient {
    pub fn new(config: &BridgeConfig) -> Result<Self, CourierError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(key).map_err(|e| {
                    CourierError::Config(format!("invalid bridge API key header value: {e}"))
                })?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| CourierError::ExternalService {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            CourierError::Config(format!("invalid bridge base URL `{}`: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CourierError::Config(format!(
                "bridge base URL `{}` cannot carry a path",
                config.base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    /// `{base}/sessions/{id}[/{suffix}]` with each segment percent-encoded.
    fn url(&self, session_id: &SessionId, suffix: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("sessions").push(session_id.as_str());
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        url
    }

    async fn request<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response, OpaqueFailure> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| OpaqueFailure::new(format!("bridge request failed: {e}")))?;

        let status = response.status();
        debug!(%method, %url, status = %status, "bridge response received");
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(failure_from_body(status, &text))
    }

    async fn json<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<R, OpaqueFailure> {
        self.request(method, url, body)
            .await?
            .json::<R>()
            .await
            .map_err(|e| OpaqueFailure::new(format!("failed to parse bridge response: {e}")))
    }

    pub async fn start(&self, session_id: &SessionId) -> Result<(), OpaqueFailure> {
        self.request::<()>(Method::POST, self.url(session_id, Some("start")), None)
            .await
            .map(drop)
    }

    pub async fn state(&self, session_id: &SessionId) -> Result<Option<String>, OpaqueFailure> {
        let response: StateResponse = self
            .json::<(), _>(Method::GET, self.url(session_id, Some("state")), None)
            .await?;
        Ok(response.state)
    }

    pub async fn is_registered(
        &self,
        session_id: &SessionId,
        address: &str,
    ) -> Result<bool, OpaqueFailure> {
        let response: RegisteredResponse = self
            .json(
                Method::POST,
                self.url(session_id, Some("registered")),
                Some(&RegisteredRequest { address }),
            )
            .await?;
        Ok(response.registered)
    }

    pub async fn send_text(
        &self,
        session_id: &SessionId,
        to: &str,
        text: &str,
    ) -> Result<String, OpaqueFailure> {
        let response: SentResponse = self
            .json(
                Method::POST,
                self.url(session_id, Some("messages")),
                Some(&SendTextRequest { to, text }),
            )
            .await?;
        Ok(response.id)
    }

    pub async fn send_media(
        &self,
        session_id: &SessionId,
        to: &str,
        media: &MediaPayload,
        caption: Option<&str>,
    ) -> Result<String, OpaqueFailure> {
        let response: SentResponse = self
            .json(
                Method::POST,
                self.url(session_id, Some("media")),
                Some(&SendMediaRequest { to, media, caption }),
            )
            .await?;
        Ok(response.id)
    }

    pub async fn logout(&self, session_id: &SessionId) -> Result<(), OpaqueFailure> {
        self.request::<()>(Method::POST, self.url(session_id, Some("logout")), None)
            .await
            .map(drop)
    }

    pub async fn delete(&self, session_id: &SessionId) -> Result<(), OpaqueFailure> {
        self.request::<()>(Method::DELETE, self.url(session_id, None), None)
            .await
            .map(drop)
    }

    /// Fetches events after `cursor`.
    pub async fn events(
        &self,
        session_id: &SessionId,
        cursor: u64,
    ) -> Result<EventsPage, OpaqueFailure> {
        let mut url = self.url(session_id, Some("events"));
        url.query_pairs_mut()
            .append_pair("after", &cursor.to_string());
        self.json::<(), _>(Method::GET, url, None).await
    }
}

fn failure_from_body(status: reqwest::StatusCode, text: &str) -> OpaqueFailure {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        return OpaqueFailure::from_value(value);
    }
    if text.trim().is_empty() {
        OpaqueFailure::new(format!("bridge returned {status}"))
    } else {
        OpaqueFailure::new(text.trim())
    }
}
