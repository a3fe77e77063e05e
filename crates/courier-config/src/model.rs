// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier messaging channel.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use courier_core::{SessionId, UserId};
use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Session bring-up and supervision.
    #[serde(default)]
    pub session: SessionConfig,

    /// Outbound dispatch limits and budgets.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Automation sidecar connection.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Internal event bus.
    #[serde(default)]
    pub bus: BusConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "courier".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Session bring-up configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Budget for the transport handshake in milliseconds.
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,

    /// How many intervals a concurrent bring-up waits for the winner.
    #[serde(default = "default_init_wait_attempts")]
    pub init_wait_attempts: u32,

    /// Length of one wait interval in milliseconds.
    #[serde(default = "default_init_wait_interval_ms")]
    pub init_wait_interval_ms: u64,

    /// Capacity of each session's transport event queue.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Sessions brought up by `courier serve` at startup.
    #[serde(default)]
    pub autostart: Vec<AutostartSession>,
}

impl SessionConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    /// Total time a losing bring-up waits before `InitInProgress`.
    pub fn init_wait_budget(&self) -> Duration {
        Duration::from_millis(self.init_wait_interval_ms)
            .saturating_mul(self.init_wait_attempts)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            init_timeout_ms: default_init_timeout_ms(),
            init_wait_attempts: default_init_wait_attempts(),
            init_wait_interval_ms: default_init_wait_interval_ms(),
            event_buffer: default_event_buffer(),
            autostart: Vec::new(),
        }
    }
}

fn default_init_timeout_ms() -> u64 {
    120_000
}

fn default_init_wait_attempts() -> u32 {
    30
}

fn default_init_wait_interval_ms() -> u64 {
    1_000
}

fn default_event_buffer() -> usize {
    256
}

/// A session to bring up on `serve`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AutostartSession {
    pub user_id: UserId,
    pub session_id: SessionId,
}

/// Outbound dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Budget for each external call (registration check, media fetch, send).
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Maximum message content length in characters.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Minimum digits a normalized address must have.
    #[serde(default = "default_min_address_digits")]
    pub min_address_digits: usize,

    /// Transport state string that means "connected".
    #[serde(default = "default_connected_state")]
    pub connected_state: String,
}

impl DispatchConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: default_operation_timeout_ms(),
            max_content_length: default_max_content_length(),
            min_address_digits: default_min_address_digits(),
            connected_state: default_connected_state(),
        }
    }
}

fn default_operation_timeout_ms() -> u64 {
    30_000
}

fn default_max_content_length() -> usize {
    4096
}

fn default_min_address_digits() -> usize {
    10
}

fn default_connected_state() -> String {
    "CONNECTED".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "courier.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Automation sidecar configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Base URL of the sidecar HTTP API.
    #[serde(default = "default_bridge_url")]
    pub base_url: String,

    /// API key sent as `x-api-key`. `None` sends no key.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request HTTP timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Delay between event polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_bridge_url(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3100".to_string()
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

/// Event bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Broadcast ring size; subscribers further behind than this lag.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_capacity() -> usize {
    1024
}
