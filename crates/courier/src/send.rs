// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier send`: one message through a freshly brought-up session.

use clap::Args;
use courier_config::CourierConfig;
use courier_core::{CourierError, SendRequest, SessionId, SessionState, UserId};
use tracing::info;

use crate::app::{App, wait_for_state};

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Owner of the session and the message.
    #[arg(long)]
    pub user: String,

    /// Session to send through.
    #[arg(long)]
    pub session: String,

    /// Recipient address in any common format.
    #[arg(long, conflicts_with = "contact", required_unless_present = "contact")]
    pub to: Option<String>,

    /// Id of an existing contact.
    #[arg(long)]
    pub contact: Option<String>,

    /// Message text (used as the caption with --media).
    #[arg(long)]
    pub text: Option<String>,

    /// URL of a document to attach.
    #[arg(long)]
    pub media: Option<String>,
}

impl SendArgs {
    fn request(&self) -> SendRequest {
        SendRequest {
            contact_id: self.contact.clone(),
            address: self.to.clone(),
            content: self.text.clone(),
            media_url: self.media.clone(),
        }
    }
}

/// Brings the session up, waits for `READY`, sends, and releases the
/// session without logging out. Prints the stored message as JSON.
pub async fn run_send(config: CourierConfig, args: SendArgs) -> Result<(), CourierError> {
    let app = App::build(&config).await?;
    let user_id = UserId::from(args.user.as_str());
    let session_id = SessionId::from(args.session.as_str());
    let _qr = app.print_qr_codes(&session_id);

    let outcome = async {
        let session = app.supervisor.bring_up(&user_id, &session_id).await?;
        let state = wait_for_state(&session, config.session.init_timeout(), |s| {
            matches!(s, SessionState::Ready | SessionState::Disconnected)
        })
        .await?;
        if state != SessionState::Ready {
            return Err(CourierError::ExternalService {
                message: format!("session {session_id} disconnected before becoming ready"),
                source: None,
            });
        }
        info!(session_id = %session_id, "session ready, sending");
        app.dispatcher.send(&user_id, args.request()).await
    }
    .await;

    app.shutdown().await?;
    let message = outcome?;
    let json = serde_json::to_string_pretty(&message)
        .map_err(|e| CourierError::Internal(format!("failed to encode message: {e}")))?;
    println!("{json}");
    Ok(())
}
