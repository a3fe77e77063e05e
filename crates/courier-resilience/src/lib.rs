// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for calls into the external transport.
//!
//! The transport offers no cooperative cancellation, so a deadline here only
//! stops *waiting*. An abandoned send may still complete at the transport
//! (at-least-once delivery from the recipient's point of view).

pub mod timeout;

pub use timeout::{TimeoutGuard, with_timeout, with_timeout_detached};
