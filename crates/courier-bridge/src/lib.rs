// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport backed by an out-of-process automation sidecar.
//!
//! The sidecar hosts the browser client and exposes it over HTTP. Commands
//! are plain requests; lifecycle and traffic events are long-polled by a
//! task owned by each [`BridgeTransport`].

pub mod client;
pub mod protocol;
pub mod transport;

pub use client::BridgeClient;
pub use protocol::{EventsPage, WireEvent};
pub use transport::{BridgeTransport, BridgeTransportFactory};
