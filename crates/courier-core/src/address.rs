// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Address normalization for user-supplied phone numbers and chat ids.
//!
//! Input arrives as `+1 (555) 123-4567`, `0044 20 7946 0958`,
//! `15551234567@c.us`, and everything in between. The canonical form is the
//! trailing run of at most [`MAX_ADDRESS_DIGITS`] digits with any domain
//! suffix removed.

use crate::error::CourierError;

/// Upper bound on retained digits; longer input keeps its last digits.
pub const MAX_ADDRESS_DIGITS: usize = 20;

/// Suffix the transport expects on individual chat addresses.
pub const CHAT_SUFFIX: &str = "@c.us";

/// Normalizes a raw address, keeping at most [`MAX_ADDRESS_DIGITS`] digits.
///
/// Never fails: garbage input yields an empty or short string, which
/// callers must check (see [`require_address`]). Idempotent.
pub fn normalize(raw: &str) -> String {
    normalize_with_limit(raw, MAX_ADDRESS_DIGITS)
}

/// Like [`normalize`], with an explicit digit cap.
pub fn normalize_with_limit(raw: &str, max_digits: usize) -> String {
    let local = raw.split('@').next().unwrap_or_default();
    let digits: Vec<char> = local.chars().filter(char::is_ascii_digit).collect();
    let start = digits.len().saturating_sub(max_digits);
    digits[start..].iter().collect()
}

/// Normalizes `raw` and rejects results shorter than `min_digits`.
///
/// The error names both the raw and normalized values so callers can see
/// what was stripped.
pub fn require_address(raw: &str, min_digits: usize) -> Result<String, CourierError> {
    let normalized = normalize(raw);
    if normalized.len() < min_digits {
        return Err(CourierError::Validation(format!(
            "invalid phone number: `{raw}` normalizes to `{normalized}` \
             ({} digits, at least {min_digits} required)",
            normalized.len()
        )));
    }
    Ok(normalized)
}

/// Builds the transport chat id for a normalized address.
pub fn chat_id(normalized: &str) -> String {
    format!("{normalized}{CHAT_SUFFIX}")
}
