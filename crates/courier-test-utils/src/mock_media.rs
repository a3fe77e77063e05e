// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock media fetcher returning a canned payload.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use courier_core::{MediaFetcher, MediaPayload, OpaqueFailure};

pub struct MockMediaFetcher {
    outcome: Result<MediaPayload, OpaqueFailure>,
    requested: Mutex<Vec<String>>,
}

impl MockMediaFetcher {
    /// Returns a small PDF payload for every URL.
    pub fn ok() -> Self {
        Self {
            outcome: Ok(MediaPayload {
                mime_type: "application/pdf".to_string(),
                data: "JVBERi0xLjQ=".to_string(),
                filename: Some("file.pdf".to_string()),
            }),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Fails every fetch with `failure`.
    pub fn failing(failure: impl Into<OpaqueFailure>) -> Self {
        Self {
            outcome: Err(failure.into()),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// URLs requested so far.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockMediaFetcher {
    fn default() -> Self {
        Self::ok()
    }
}

#[async_trait]
impl MediaFetcher for MockMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<MediaPayload, OpaqueFailure> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        self.outcome.clone()
    }
}
