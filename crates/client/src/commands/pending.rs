// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt::Write as _;
use std::sync::Arc;

use sb_core::{FileStore, PendingMessage};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::realtime::DurableQueue;

pub(crate) fn run(config: &ClientConfig, json: bool) -> Result<()> {
    let store = FileStore::open(&config.queue_dir())?;
    let queue = DurableQueue::open(Arc::new(store));
    let pending = queue.pending();

    if json {
        let out = serde_json::to_string_pretty(&pending).map_err(sb_core::Error::from)?;
        println!("{out}");
    } else {
        print!("{}", format_pending(&pending));
    }
    Ok(())
}

/// Renders the queue grouped by conversation key, oldest first.
pub(crate) fn format_pending(pending: &[PendingMessage]) -> String {
    if pending.is_empty() {
        return "No pending messages\n".to_string();
    }

    let mut out = String::new();
    let mut current: Option<&str> = None;
    for message in pending {
        if current != Some(message.conversation_key.as_str()) {
            let count = pending
                .iter()
                .filter(|m| m.conversation_key == message.conversation_key)
                .count();
            let _ = writeln!(out, "{} ({})", message.conversation_key, count);
            current = Some(message.conversation_key.as_str());
        }
        let _ = writeln!(
            out,
            "  {}  {}  attempt {}  {}",
            message.id,
            message.payload.kind(),
            message.attempt,
            message.enqueued_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    out
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
