// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier status`: bring a session up once and report where it settled.

use courier_config::CourierConfig;
use courier_core::{CourierError, SessionId, SessionState, UserId};
use tracing::warn;

use crate::app::{App, wait_for_state};
use crate::qr;

pub async fn run_status(
    config: CourierConfig,
    user: &str,
    session: &str,
) -> Result<(), CourierError> {
    let app = App::build(&config).await?;
    let session_id = SessionId::from(session);

    let outcome = async {
        let session = app
            .supervisor
            .bring_up(&UserId::from(user), &session_id)
            .await?;
        if let Err(e) = wait_for_state(&session, config.session.init_timeout(), |s| {
            s != SessionState::Initializing
        })
        .await
        {
            warn!(session_id = %session_id, error = %e, "session did not settle");
        }
        Ok::<_, CourierError>(session.status())
    }
    .await;

    app.shutdown().await?;
    let status = outcome?;
    if let Some(payload) = &status.qr_payload {
        qr::print(&session_id, payload);
    }
    let json = serde_json::to_string_pretty(&status)
        .map_err(|e| CourierError::Internal(format!("failed to encode status: {e}")))?;
    println!("{json}");
    Ok(())
}
