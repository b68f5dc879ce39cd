// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue for outbound messages that could not be sent.
//!
//! Messages are grouped by conversation key and kept in FIFO order within a
//! key. Storage is the only copy: every operation reads it afresh, and every
//! mutation is a read-modify-write done under [`Storage::lock`]. Several
//! queues, in this process or others, can therefore share one store without
//! overwriting each other's messages. Unreadable records are skipped with a
//! warning.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use sb_core::{Envelope, PendingMessage, Storage};

/// Storage key prefix for queue records.
const KEY_PREFIX: &str = "pending/";

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] sb_core::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("conversation key must not be empty")]
    EmptyKey,
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Persistent, per-conversation FIFO of [`PendingMessage`]s.
pub struct DurableQueue {
    storage: Arc<dyn Storage>,
    // Serializes this handle's own mutations; the store lock covers other handles
    writer: Mutex<()>,
}

impl DurableQueue {
    /// Opens the queue over `storage`, which may already hold records.
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let queue = DurableQueue {
            storage,
            writer: Mutex::new(()),
        };
        let total = queue.len();
        if total > 0 {
            tracing::info!(messages = total, "restored queued messages");
        }
        queue
    }

    /// Runs `mutate` while holding both this handle's and the store's lock.
    fn exclusive<T>(&self, mutate: impl FnOnce() -> QueueResult<T>) -> QueueResult<T> {
        let _local = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _store = self.storage.lock()?;
        mutate()
    }

    /// Appends `payload` to the conversation's queue and persists it.
    pub fn enqueue(&self, conversation_key: &str, payload: Envelope) -> QueueResult<PendingMessage> {
        if conversation_key.is_empty() {
            return Err(QueueError::EmptyKey);
        }
        let message = PendingMessage::new(conversation_key, payload);

        self.exclusive(|| {
            let mut list = self.load(conversation_key)?;
            list.push(message.clone());
            self.persist(conversation_key, &list)
        })?;

        tracing::debug!(id = %message.id, key = conversation_key, "queued message");
        Ok(message)
    }

    /// Messages waiting for `conversation_key`, oldest first.
    pub fn peek_due(&self, conversation_key: &str) -> Vec<PendingMessage> {
        self.load(conversation_key).unwrap_or_else(|e| {
            tracing::warn!(key = conversation_key, error = %e, "cannot read queued messages");
            Vec::new()
        })
    }

    /// Removes the message with `id`. Removing an unknown id is a no-op.
    ///
    /// Returns whether a message was removed.
    pub fn remove(&self, id: &str) -> QueueResult<bool> {
        self.exclusive(|| {
            let Some((key, mut list, pos)) = self.find(id)? else {
                return Ok(false);
            };
            list.remove(pos);
            self.persist(&key, &list)?;
            Ok(true)
        })
    }

    /// Records a failed delivery attempt for `id`.
    ///
    /// Returns the new attempt count, or `None` if the id is unknown.
    pub fn mark_failed(&self, id: &str) -> QueueResult<Option<u32>> {
        self.exclusive(|| {
            let Some((key, mut list, pos)) = self.find(id)? else {
                return Ok(None);
            };
            list[pos].attempt = list[pos].attempt.saturating_add(1);
            let attempt = list[pos].attempt;
            self.persist(&key, &list)?;
            Ok(Some(attempt))
        })
    }

    /// Conversation keys with at least one waiting message.
    pub fn keys(&self) -> Vec<String> {
        self.snapshot().into_keys().collect()
    }

    /// Every waiting message, grouped by key, each group oldest first.
    pub fn pending(&self) -> Vec<PendingMessage> {
        self.snapshot().into_values().flatten().collect()
    }

    /// Total number of waiting messages.
    pub fn len(&self) -> usize {
        self.snapshot().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads one conversation's record. A corrupt record reads as empty.
    fn load(&self, conversation_key: &str) -> QueueResult<Vec<PendingMessage>> {
        let storage_key = format!("{KEY_PREFIX}{conversation_key}");
        let Some(raw) = self.storage.get(&storage_key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(list) => Ok(list),
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "skipping corrupt queue record");
                Ok(Vec::new())
            }
        }
    }

    /// Reads every non-empty record, keyed by conversation.
    fn load_all(&self) -> QueueResult<BTreeMap<String, Vec<PendingMessage>>> {
        let mut entries = BTreeMap::new();
        for storage_key in self.storage.keys(KEY_PREFIX)? {
            let Some(conversation_key) = storage_key.strip_prefix(KEY_PREFIX) else {
                continue;
            };
            let list = self.load(conversation_key)?;
            if !list.is_empty() {
                entries.insert(conversation_key.to_string(), list);
            }
        }
        Ok(entries)
    }

    fn snapshot(&self) -> BTreeMap<String, Vec<PendingMessage>> {
        self.load_all().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cannot list queued messages");
            BTreeMap::new()
        })
    }

    /// Locates `id`, returning its key, that key's list and its position.
    fn find(&self, id: &str) -> QueueResult<Option<(String, Vec<PendingMessage>, usize)>> {
        Ok(self.load_all()?.into_iter().find_map(|(key, list)| {
            let pos = list.iter().position(|m| m.id == id)?;
            Some((key, list, pos))
        }))
    }

    fn persist(&self, conversation_key: &str, list: &[PendingMessage]) -> QueueResult<()> {
        let storage_key = format!("{KEY_PREFIX}{conversation_key}");
        if list.is_empty() {
            self.storage.delete(&storage_key)?;
        } else {
            let json = serde_json::to_string(list)?;
            self.storage.put(&storage_key, &json)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for DurableQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
