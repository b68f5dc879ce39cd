// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! High-level real-time client.
//!
//! Wires the connection manager, dispatcher, durable queue and sync loop
//! together behind one explicitly constructed handle:
//! - `connect` / `disconnect` also start and stop the sync loop
//! - dropping the client disconnects it
//! - `send` goes straight to the socket when connected and falls back to
//!   the durable queue otherwise

use std::sync::Arc;

use sb_core::{Envelope, Event, EventKind, FileStore, Notice, PendingMessage, Storage};
use tokio::sync::{broadcast, watch};

use super::connection::{ConnectionError, ConnectionManager, ConnectionState};
use super::dispatcher::{Listener, ListenerError, Subscription};
use super::queue::DurableQueue;
use super::sync_loop::{DrainReport, SyncLoop};
use super::transport::{Connector, WebSocketConnector};
use crate::config::ClientConfig;
use crate::error::Result;

/// What happened to a message passed to [`RealtimeClient::send`].
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Written to the socket.
    Sent,
    /// Persisted for the sync loop to deliver later.
    Queued(PendingMessage),
}

/// Real-time client for one operator session.
pub struct RealtimeClient<C: Connector = WebSocketConnector> {
    manager: ConnectionManager<C>,
    queue: Arc<DurableQueue>,
    sync: SyncLoop,
}

impl RealtimeClient<WebSocketConnector> {
    /// Creates a WebSocket client whose queue lives in the configured directory.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let store = FileStore::open(&config.queue_dir())?;
        Self::new(WebSocketConnector, config, Arc::new(store))
    }
}

impl<C: Connector> RealtimeClient<C> {
    pub fn new(connector: C, config: &ClientConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        config.validate()?;
        let manager = ConnectionManager::with_connector(
            connector,
            config.endpoint()?,
            config.connection_config(),
        );
        let queue = Arc::new(DurableQueue::open(storage));
        let sync = SyncLoop::new(
            Arc::clone(&queue),
            manager.state_changes(),
            config.sync_config(),
        );
        Ok(RealtimeClient {
            manager,
            queue,
            sync,
        })
    }

    /// Connects (see [`ConnectionManager::connect`]) and starts the sync loop.
    pub fn connect(&self, identity: &str, token: &str) -> Result<ConnectionState> {
        let state = self.manager.connect(identity, token)?;
        if !self.sync.is_running() {
            self.sync.start(self.manager.clone())?;
        }
        Ok(state)
    }

    /// Disconnects and stops the sync loop. Queued messages stay persisted.
    pub fn disconnect(&self) {
        self.sync.stop();
        self.manager.disconnect();
    }

    /// Sends `envelope` in the conversation `conversation_key`.
    ///
    /// If the socket is down, or the write fails, the message is queued
    /// durably and delivered by the sync loop once connected. While older
    /// messages of the same conversation are still queued, new ones queue
    /// behind them.
    pub async fn send(&self, conversation_key: &str, envelope: Envelope) -> Result<SendOutcome> {
        let behind_queue = !self.queue.peek_due(conversation_key).is_empty();
        if self.manager.state().is_connected() && !behind_queue {
            match self.manager.send(&envelope).await {
                Ok(()) => return Ok(SendOutcome::Sent),
                Err(ConnectionError::Encode(e)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(key = conversation_key, error = %e, "send failed, queuing");
                }
            }
        }
        let pending = self.queue.enqueue(conversation_key, envelope)?;
        Ok(SendOutcome::Queued(pending))
    }

    /// Registers `listener` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&Event) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.manager.dispatcher().subscribe(kind, listener)
    }

    pub fn subscribe_listener(&self, kind: EventKind, listener: Listener) -> Subscription {
        self.manager.dispatcher().subscribe_listener(kind, listener)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.manager.dispatcher().unsubscribe(subscription)
    }

    pub fn unsubscribe_listener(&self, kind: &EventKind, listener: &Listener) -> bool {
        self.manager.dispatcher().unsubscribe_listener(kind, listener)
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.manager.state_changes()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.manager.notices()
    }

    /// Number of messages waiting in the durable queue.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Snapshot of the durable queue.
    pub fn pending(&self) -> Vec<PendingMessage> {
        self.queue.pending()
    }

    /// Drains the queue now instead of waiting for the next tick.
    pub async fn sync_now(&self) -> DrainReport {
        self.sync.tick(&self.manager).await
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.is_running()
    }

    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }
}

impl<C: Connector> Drop for RealtimeClient<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<C: Connector> std::fmt::Debug for RealtimeClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("manager", &self.manager)
            .field("queue", &self.queue)
            .field("sync", &self.sync)
            .finish()
    }
}
