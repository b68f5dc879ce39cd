// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection manager owning the single socket to the notification server.
//!
//! Provides:
//! - A connection state machine published through a `watch` channel
//! - Automatic reconnection with linear backoff and a terminal failed state
//! - Decoding of inbound frames and routing to the [`Dispatcher`]
//! - Direct (unbuffered) outbound sends
//!
//! Each `connect()` starts a session task tagged with an epoch. `disconnect()`
//! bumps the epoch and cancels the session, so a stale task can never publish
//! a state change after the caller has moved on.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sb_core::{Envelope, Notice};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use super::dispatcher::Dispatcher;
use super::transport::{Connector, Transport, TransportError, WebSocketConnector};
use crate::config::Endpoint;

/// Queued outbound frames per session before `send` waits for capacity.
const OUTBOUND_CAPACITY: usize = 64;

/// Capacity of the notice broadcast channel.
const NOTICE_CAPACITY: usize = 64;

/// Notice published when reconnection is exhausted.
pub const CONNECTION_LOST_NOTICE: &str = "Connection lost. Please refresh the page.";

/// Lifecycle state of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting before reconnect attempt `attempt` (1-based).
    Reconnecting { attempt: u32 },
    /// Reconnection gave up; only an explicit `connect()` leaves this state.
    Failed { attempts: u32 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Whether a session is alive (connected or working on it).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Reconnecting { .. }
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting { attempt } => {
                write!(f, "reconnecting (attempt {attempt})")
            }
            ConnectionState::Failed { attempts } => {
                write!(f, "failed after {attempts} reconnect attempts")
            }
        }
    }
}

/// Reconnect policy and identity of the local operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Delay before reconnect attempt `n` is `reconnect_interval * n`.
    pub reconnect_interval: Duration,
    /// Attempts after which the manager gives up and enters `Failed`.
    pub max_reconnect_attempts: u32,
    /// Sender name of this operator's own chat messages.
    pub operator_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            reconnect_interval: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            operator_name: "admin".to_string(),
        }
    }
}

/// Error type for connection manager operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("not connected")]
    NotConnected,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("cannot encode envelope: {0}")]
    Encode(sb_core::Error),

    #[error("no async runtime available to run the connection")]
    NoRuntime,
}

/// An outbound frame handed to the session task.
struct Outbound {
    frame: String,
    reply: oneshot::Sender<Result<(), TransportError>>,
}

#[derive(Default)]
struct Session {
    epoch: u64,
    cancel: Option<CancellationToken>,
    outbound: Option<mpsc::Sender<Outbound>>,
    attempt: u32,
}

struct Inner<C> {
    connector: C,
    endpoint: Endpoint,
    config: ConnectionConfig,
    dispatcher: Dispatcher,
    state: watch::Sender<ConnectionState>,
    notices: broadcast::Sender<Notice>,
    session: Mutex<Session>,
}

/// Why a live session ended.
enum Closed {
    Cancelled,
    Lost(String),
}

/// Manages one logical connection to the notification server.
///
/// Cloning yields another handle to the same connection. The background
/// session keeps the connection alive until [`disconnect`](Self::disconnect)
/// is called, even after every handle is dropped. [`RealtimeClient`] calls it
/// on drop.
///
/// [`RealtimeClient`]: super::RealtimeClient
pub struct ConnectionManager<C: Connector = WebSocketConnector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        ConnectionManager {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConnectionManager<WebSocketConnector> {
    /// Creates a manager using real WebSocket connections.
    pub fn new(endpoint: Endpoint, config: ConnectionConfig) -> Self {
        Self::with_connector(WebSocketConnector, endpoint, config)
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager whose transports come from `connector`.
    pub fn with_connector(connector: C, endpoint: Endpoint, config: ConnectionConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        ConnectionManager {
            inner: Arc::new(Inner {
                connector,
                endpoint,
                config,
                dispatcher: Dispatcher::new(),
                state,
                notices,
                session: Mutex::new(Session::default()),
            }),
        }
    }

    /// Opens the connection for `identity`, authenticated by `token`.
    ///
    /// A no-op returning the current state while a session is already
    /// connecting, connected or waiting to reconnect. From `Disconnected` or
    /// `Failed` the attempt counter is reset and a new session starts in the
    /// background. Must be called from within a Tokio runtime.
    pub fn connect(&self, identity: &str, token: &str) -> Result<ConnectionState, ConnectionError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ConnectionError::NoRuntime)?;

        let mut session = self.inner.session();
        let current = *self.inner.state.borrow();
        if current.is_active() {
            tracing::debug!(state = %current, "connect ignored, session already active");
            return Ok(current);
        }

        session.epoch += 1;
        session.attempt = 0;
        session.outbound = None;
        let cancel = CancellationToken::new();
        session.cancel = Some(cancel.clone());
        let epoch = session.epoch;
        self.inner.set_state(ConnectionState::Connecting);
        drop(session);

        let url = self.inner.endpoint.url(identity, token);
        tracing::info!(identity, "connecting");
        runtime.spawn(run_session(Arc::clone(&self.inner), epoch, url, cancel));
        Ok(ConnectionState::Connecting)
    }

    /// Closes the connection and cancels any pending reconnect.
    ///
    /// No automatic attempts follow until `connect()` is called again.
    pub fn disconnect(&self) {
        let mut session = self.inner.session();
        session.epoch += 1;
        session.outbound = None;
        if let Some(cancel) = session.cancel.take() {
            cancel.cancel();
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Writes `envelope` to the socket.
    ///
    /// Fails with [`ConnectionError::NotConnected`] unless the state is
    /// `Connected`. Nothing is buffered here; callers wanting durability go
    /// through the offline queue.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), ConnectionError> {
        let frame = envelope.to_json().map_err(ConnectionError::Encode)?;

        let outbound = {
            let session = self.inner.session();
            if !self.inner.state.borrow().is_connected() {
                return Err(ConnectionError::NotConnected);
            }
            session.outbound.clone().ok_or(ConnectionError::NotConnected)?
        };

        let (reply, result) = oneshot::channel();
        outbound
            .send(Outbound { frame, reply })
            .await
            .map_err(|_| ConnectionError::NotConnected)?;

        match result.await {
            Ok(sent) => sent.map_err(ConnectionError::Transport),
            // Session ended before the frame was written
            Err(_) => Err(ConnectionError::NotConnected),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Receiver for operator notices raised by inbound events and failures.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// Current reconnect attempt (0 while connected or idle).
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.session().attempt
    }

    /// The dispatcher inbound events are routed to.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }
}

impl<C: Connector> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Inner<C> {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes `next`. Callers hold the session lock.
    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::info!(from = %previous, to = %next, "connection state changed");
        }
    }

    /// Moves to `next` if `epoch` is still current.
    fn transition(&self, epoch: u64, next: ConnectionState) -> bool {
        let session = self.session();
        if session.epoch != epoch {
            return false;
        }
        self.set_state(next);
        true
    }

    fn on_connected(&self, epoch: u64, outbound: mpsc::Sender<Outbound>) -> bool {
        let mut session = self.session();
        if session.epoch != epoch {
            return false;
        }
        session.outbound = Some(outbound);
        session.attempt = 0;
        self.set_state(ConnectionState::Connected);
        true
    }

    /// Counts a failed or lost connection and decides what happens next.
    ///
    /// Returns the delay before the next attempt, or `None` when the session
    /// must end (stale epoch or attempts exhausted).
    fn begin_reconnect(&self, epoch: u64) -> Option<Duration> {
        let mut session = self.session();
        if session.epoch != epoch {
            return None;
        }
        session.outbound = None;
        session.attempt = session.attempt.saturating_add(1);
        let attempt = session.attempt;
        let max = self.config.max_reconnect_attempts;

        if attempt > max {
            session.attempt = max;
            session.cancel = None;
            self.set_state(ConnectionState::Failed { attempts: max });
            tracing::error!(attempts = max, "reconnection failed, giving up");
            // No subscribers is fine
            let _ = self.notices.send(Notice::error(CONNECTION_LOST_NOTICE));
            return None;
        }

        let delay = self.config.reconnect_interval.saturating_mul(attempt);
        self.set_state(ConnectionState::Reconnecting { attempt });
        tracing::info!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );
        Some(delay)
    }

    /// Pumps outbound frames and inbound events until the session ends.
    async fn drive(
        &self,
        transport: &mut C::Transport,
        mut outbound: mpsc::Receiver<Outbound>,
        cancel: &CancellationToken,
    ) -> Closed {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Closed::Cancelled,
                Some(out) = outbound.recv() => {
                    let result = transport.send(out.frame).await;
                    let failure = result.as_ref().err().map(ToString::to_string);
                    // The sender may have given up waiting
                    let _ = out.reply.send(result);
                    if let Some(reason) = failure {
                        return Closed::Lost(reason);
                    }
                }
                frame = transport.recv() => match frame {
                    Ok(Some(text)) => self.handle_frame(&text),
                    Ok(None) => return Closed::Lost("closed by peer".to_string()),
                    Err(e) => return Closed::Lost(e.to_string()),
                },
            }
        }
    }

    /// Decodes one inbound frame and routes it.
    ///
    /// Malformed frames are dropped; they never end the session.
    fn handle_frame(&self, text: &str) {
        let envelope = match Envelope::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                return;
            }
        };
        tracing::debug!(kind = envelope.kind(), "received event");

        if let Some(event) = self.dispatcher.dispatch(&envelope) {
            if let Some(notice) = event.notice(&self.config.operator_name) {
                let _ = self.notices.send(notice);
            }
        }
    }
}

/// Connect, serve, and reconnect until cancelled, superseded, or failed.
async fn run_session<C: Connector>(
    inner: Arc<Inner<C>>,
    epoch: u64,
    url: String,
    cancel: CancellationToken,
) {
    loop {
        let mut transport = inner.connector.transport();
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = transport.connect(&url) => result,
        };

        match connected {
            Ok(()) => {
                let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
                if !inner.on_connected(epoch, tx) {
                    let _ = transport.disconnect().await;
                    return;
                }
                let closed = inner.drive(&mut transport, rx, &cancel).await;
                let _ = transport.disconnect().await;
                match closed {
                    Closed::Cancelled => return,
                    Closed::Lost(reason) => tracing::warn!(%reason, "connection lost"),
                }
            }
            Err(e) => tracing::warn!(error = %e, "connection attempt failed"),
        }

        let Some(delay) = inner.begin_reconnect(epoch) else {
            return;
        };
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        if !inner.transition(epoch, ConnectionState::Connecting) {
            return;
        }
    }
}
