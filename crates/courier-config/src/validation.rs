// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: non-zero budgets, coherent address bounds, URL schemes.

use std::collections::HashSet;

use courier_core::address::MAX_ADDRESS_DIGITS;

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or every collected error
/// (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.session.init_timeout_ms == 0 {
        fail("session.init_timeout_ms must be greater than 0".to_string());
    }
    if config.session.init_wait_attempts == 0 || config.session.init_wait_interval_ms == 0 {
        fail(
            "session.init_wait_attempts and session.init_wait_interval_ms must be greater than 0"
                .to_string(),
        );
    }
    if config.session.event_buffer == 0 {
        fail("session.event_buffer must be greater than 0".to_string());
    }

    let mut seen = HashSet::new();
    for entry in &config.session.autostart {
        if !seen.insert(&entry.session_id) {
            fail(format!(
                "duplicate session id `{}` in [[session.autostart]]",
                entry.session_id
            ));
        }
    }

    if config.dispatch.operation_timeout_ms == 0 {
        fail("dispatch.operation_timeout_ms must be greater than 0".to_string());
    }
    if config.dispatch.max_content_length == 0 {
        fail("dispatch.max_content_length must be greater than 0".to_string());
    }
    if config.dispatch.min_address_digits == 0
        || config.dispatch.min_address_digits > MAX_ADDRESS_DIGITS
    {
        fail(format!(
            "dispatch.min_address_digits must be between 1 and {MAX_ADDRESS_DIGITS}, got {}",
            config.dispatch.min_address_digits
        ));
    }
    if config.dispatch.connected_state.trim().is_empty() {
        fail("dispatch.connected_state must not be empty".to_string());
    }

    let url = config.bridge.base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        fail(format!(
            "bridge.base_url `{url}` must start with http:// or https://"
        ));
    }
    if config.bridge.request_timeout_ms == 0 || config.bridge.poll_interval_ms == 0 {
        fail(
            "bridge.request_timeout_ms and bridge.poll_interval_ms must be greater than 0"
                .to_string(),
        );
    }

    if config.bus.capacity == 0 {
        fail("bus.capacity must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
