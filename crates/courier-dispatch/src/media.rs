// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP media fetcher for outbound attachments.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use courier_core::{CourierError, MediaFetcher, MediaPayload, OpaqueFailure};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Downloads media over HTTP(S) and base64-encodes it.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CourierError::ExternalService {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<MediaPayload, OpaqueFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| OpaqueFailure::from_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OpaqueFailure::new(format!(
                "media download returned HTTP {status}"
            )));
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OpaqueFailure::from_error(&e))?;
        debug!(url, mime_type = %mime_type, size = bytes.len(), "media downloaded");

        Ok(MediaPayload {
            mime_type,
            data: BASE64.encode(&bytes),
            filename: filename_from_url(url),
        })
    }
}

/// Last non-empty path segment of `url`.
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .rev()
        .find(|s| !s.is_empty())
        .map(String::from)
}
