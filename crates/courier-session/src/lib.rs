// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle management for the Courier messaging channel.
//!
//! - [`SessionRegistry`]: injectable table of sessions with an atomic
//!   bring-up claim and bounded waiting for concurrent callers
//! - [`Session`]: per-session state machine owning one transport
//! - [`SessionSupervisor`]: bring-up, destroy, restart, and the event pump
//!   that turns transport callbacks into bus events

pub mod registry;
pub mod state;
pub mod supervisor;

pub use registry::SessionRegistry;
pub use state::{Session, SessionSnapshot, Signal, next_state};
pub use supervisor::SessionSupervisor;
