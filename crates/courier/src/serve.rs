// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Opens storage, brings up the configured autostart sessions, applies
//! delivery receipts, and logs inbound traffic until a shutdown signal
//! arrives. Sessions are released without logging out so the next start
//! restores them without a new scan.

use courier_config::CourierConfig;
use courier_core::CourierError;
use courier_dispatch::ReceiptListener;
use futures::future::join_all;
use tracing::{error, info};

use crate::app::App;
use crate::shutdown;

pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    info!(name = %config.service.name, "starting courier serve");

    let app = App::build(&config).await?;
    let receipts = ReceiptListener::spawn(&app.bus, app.reconciler.clone());
    let _inbound = app.bus.on_inbound_message(|message| {
        info!(
            session_id = %message.session_id,
            from = %message.from,
            external_id = %message.external_id,
            has_media = message.has_media,
            "inbound message"
        );
    });

    let _qr_printers: Vec<_> = config
        .session
        .autostart
        .iter()
        .map(|entry| app.print_qr_codes(&entry.session_id))
        .collect();

    let bring_ups = config.session.autostart.iter().map(|entry| {
        let supervisor = app.supervisor.clone();
        async move {
            match supervisor.bring_up(&entry.user_id, &entry.session_id).await {
                Ok(session) => info!(
                    session_id = %entry.session_id,
                    state = %session.state(),
                    "autostart session up"
                ),
                Err(e) => error!(
                    session_id = %entry.session_id,
                    error = %e,
                    "autostart session failed"
                ),
            }
        }
    });
    join_all(bring_ups).await;

    let cancel = shutdown::install_signal_handler();
    info!("courier serve ready");
    cancel.cancelled().await;

    app.shutdown().await?;
    receipts.stop().await;
    info!("courier serve shutdown complete");
    Ok(())
}
