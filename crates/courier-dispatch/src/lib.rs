// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound dispatch for the Courier messaging channel.
//!
//! - [`Dispatcher`]: validates, persists, and sends a message through the
//!   user's connected session
//! - [`StatusReconciler`]: single writer of message status, enforcing the
//!   monotonic status chain
//! - [`ReceiptListener`]: applies transport delivery/read receipts
//! - [`HttpMediaFetcher`]: downloads attachments for media sends

pub mod dispatcher;
pub mod media;
pub mod receipts;
pub mod reconciler;

pub use dispatcher::{Dispatcher, Repositories};
pub use media::HttpMediaFetcher;
pub use receipts::ReceiptListener;
pub use reconciler::StatusReconciler;
