// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use sb_core::Envelope;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::realtime::{ConnectionState, RealtimeClient, SendOutcome};

pub(crate) struct SendArgs<'a> {
    pub identity: &'a str,
    pub token: &'a str,
    pub code: &'a str,
    pub user: &'a str,
    pub message: &'a str,
    pub admin: &'a str,
    pub wait: Duration,
}

/// Sends one chat message, falling back to the offline queue.
///
/// Older messages queued for the same code are flushed first so the
/// conversation stays in order.
pub(crate) async fn run(config: &ClientConfig, args: SendArgs<'_>) -> Result<()> {
    let client = RealtimeClient::from_config(config)?;
    let mut states = client.state_changes();
    client.connect(args.identity, args.token)?;

    let connected = tokio::time::timeout(
        args.wait,
        states.wait_for(ConnectionState::is_connected),
    )
    .await
    .is_ok_and(|r| r.is_ok());

    if connected {
        let report = client.sync_now().await;
        if report.sent > 0 {
            println!("Delivered {} queued message(s)", report.sent);
        }
    } else {
        tracing::info!(state = %client.state(), "not connected, message will be queued");
    }

    let envelope = Envelope::chat(args.code, args.user, args.message, args.admin);
    let outcome = client.send(args.code, envelope).await;
    client.disconnect();

    match outcome? {
        SendOutcome::Sent => println!("Sent message for code {}", args.code),
        SendOutcome::Queued(pending) => println!(
            "Queued message {} for code {} ({} waiting)",
            pending.id,
            args.code,
            client.pending_count()
        ),
    }
    Ok(())
}
