// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media retrieval for outbound attachments.

use async_trait::async_trait;

use crate::error::OpaqueFailure;
use crate::types::MediaPayload;

/// Downloads a media URL into a transport-ready payload.
#[async_trait]
pub trait MediaFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<MediaPayload, OpaqueFailure>;
}
