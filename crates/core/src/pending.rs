// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound messages awaiting delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

/// An outbound envelope that could not be delivered yet.
///
/// The id is assigned once at enqueue time and never changes, so repeated
/// delivery confirmations for the same message are harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMessage {
    pub id: String,
    pub conversation_key: String,
    pub payload: Envelope,
    pub enqueued_at: DateTime<Utc>,
    /// Number of failed delivery attempts so far.
    #[serde(default)]
    pub attempt: u32,
}

impl PendingMessage {
    /// Creates a pending message with a fresh id and no attempts.
    pub fn new(conversation_key: impl Into<String>, payload: Envelope) -> Self {
        PendingMessage {
            id: format!("pending-{}", uuid::Uuid::new_v4().simple()),
            conversation_key: conversation_key.into(),
            payload,
            enqueued_at: Utc::now(),
            attempt: 0,
        }
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
