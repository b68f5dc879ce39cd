// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! switchboard - real-time operator client with offline delivery.
//!
//! This crate keeps a single WebSocket connection to the notification
//! server, routes inbound events to typed listeners, and guarantees that
//! outbound messages survive disconnects by persisting them until they are
//! delivered.
//!
//! # Main Components
//!
//! - [`RealtimeClient`] - facade tying the pieces together
//! - [`realtime::ConnectionManager`] - connection state machine with linear backoff
//! - [`realtime::Dispatcher`] - per-event-kind listener registry
//! - [`realtime::DurableQueue`] - persisted per-conversation outbound queue
//! - [`realtime::SyncLoop`] - periodic drain of the queue while connected
//! - [`ClientConfig`] - TOML configuration
//!
//! ```rust,ignore
//! use switchboard::{ClientConfig, RealtimeClient};
//! use sb_core::{Envelope, EventKind};
//!
//! let config = ClientConfig::load_or_default(None)?;
//! let client = RealtimeClient::from_config(&config)?;
//! client.subscribe(EventKind::CodeVerified, |event| {
//!     println!("{event:?}");
//!     Ok(())
//! });
//! client.connect("gh", token)?;
//! client.send("42", Envelope::chat("42", "7", "Thanks!", "1")).await?;
//! ```

mod cli;
mod commands;

pub mod config;
pub mod error;
pub mod realtime;

pub use cli::{Cli, Command};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use realtime::RealtimeClient;

use std::time::Duration;

/// Runs a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Watch { identity, token } => {
            commands::watch::run(&config, &identity, &token).await
        }
        Command::Pending { json } => commands::pending::run(&config, json),
        Command::Send {
            identity,
            token,
            code,
            user,
            message,
            admin,
            wait,
        } => {
            let args = commands::send::SendArgs {
                identity: &identity,
                token: &token,
                code: &code,
                user: &user,
                message: &message,
                admin: &admin,
                wait: Duration::from_secs(wait),
            };
            commands::send::run(&config, args).await
        }
    }
}
