// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use sb_core::{Event, EventKind};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::realtime::{ConnectionState, RealtimeClient};

/// Streams notices and state changes until Ctrl-C or terminal failure.
pub(crate) async fn run(config: &ClientConfig, identity: &str, token: &str) -> Result<()> {
    let client = RealtimeClient::from_config(config)?;
    let mut notices = client.notices();
    let mut states = client.state_changes();

    client.subscribe(EventKind::UserTyping, |event| {
        if let Event::UserTyping(typing) = event {
            tracing::debug!(user = %typing.user_id, typing = typing.is_typing, "user typing");
        }
        Ok(())
    });

    client.connect(identity, token)?;
    println!(
        "Watching {} ({} queued message(s)), Ctrl-C to stop",
        identity,
        client.pending_count()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            notice = notices.recv() => match notice {
                Ok(notice) => println!("{notice}"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notices dropped");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *states.borrow_and_update();
                println!("-- {state}");
                if let ConnectionState::Failed { attempts } = state {
                    // Flush the terminal notice raised with the transition
                    loop {
                        match notices.try_recv() {
                            Ok(notice) => println!("{notice}"),
                            Err(TryRecvError::Lagged(_)) => continue,
                            Err(_) => break,
                        }
                    }
                    break Err(Error::ConnectionFailed { attempts });
                }
            }
        }
    };

    client.disconnect();
    let pending = client.pending_count();
    if pending > 0 {
        println!("{pending} message(s) still queued");
    }
    result
}
