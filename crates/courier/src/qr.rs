// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of pairing QR payloads.

use courier_core::SessionId;
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;
use tracing::warn;

/// Renders `payload` as half-block characters, light modules on dark.
pub fn render(payload: &str) -> Result<String, qrcode::types::QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Prints the QR for `session_id` to stderr so stdout stays machine-readable.
pub fn print(session_id: &SessionId, payload: &str) {
    match render(payload) {
        Ok(art) => eprintln!("\nScan to link session {session_id}:\n{art}\n"),
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "could not render QR code");
            eprintln!("Pairing payload for session {session_id}: {payload}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_multiline_block() {
        let art = render("2@Zm9vYmFy,abc,def").unwrap();
        assert!(art.lines().count() > 10);
        assert!(art.chars().any(|c| c == '█' || c == '▀' || c == '▄'));
    }
}
