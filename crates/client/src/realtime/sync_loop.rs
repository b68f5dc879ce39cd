// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic drain of the durable queue.
//!
//! Every tick, if the connection is up, each conversation's pending messages
//! are offered to a [`Delivery`] in FIFO order. A message is removed only
//! after it was delivered. The first failure for a conversation stops that
//! conversation for the tick so later messages never overtake it.
//!
//! Drains of one [`SyncLoop`] never overlap: timer ticks and
//! [`SyncLoop::tick`] take turns. Loops in separate processes sharing a queue
//! directory are not coordinated, so a message may then be sent twice;
//! delivery is at-least-once.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sb_core::PendingMessage;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::connection::{ConnectionError, ConnectionManager, ConnectionState};
use super::queue::DurableQueue;
use super::transport::Connector;

/// Timer settings for the sync loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Time between drain attempts.
    pub interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            interval: Duration::from_secs(5),
        }
    }
}

/// Why a single delivery failed.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The connection is down; nothing else will get through this tick.
    #[error("not connected")]
    NotConnected,

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

impl From<ConnectionError> for SendError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::NotConnected => SendError::NotConnected,
            other => SendError::Rejected(other.to_string()),
        }
    }
}

/// Error type for sync loop control.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no async runtime available to run the sync loop")]
    NoRuntime,
}

/// Future returned by [`Delivery::deliver`].
pub type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SendError>> + Send + 'a>>;

/// Sends one pending message.
pub trait Delivery: Send + Sync + 'static {
    fn deliver<'a>(&'a self, message: &'a PendingMessage) -> DeliveryFuture<'a>;
}

impl<C: Connector> Delivery for ConnectionManager<C> {
    fn deliver<'a>(&'a self, message: &'a PendingMessage) -> DeliveryFuture<'a> {
        Box::pin(async move { self.send(&message.payload).await.map_err(SendError::from) })
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub failed: usize,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Fixed-interval timer draining a [`DurableQueue`].
pub struct SyncLoop {
    queue: Arc<DurableQueue>,
    state: watch::Receiver<ConnectionState>,
    config: SyncConfig,
    running: Mutex<Option<Running>>,
    draining: Arc<AsyncMutex<()>>,
}

impl SyncLoop {
    pub fn new(
        queue: Arc<DurableQueue>,
        state: watch::Receiver<ConnectionState>,
        config: SyncConfig,
    ) -> Self {
        SyncLoop {
            queue,
            state,
            config,
            running: Mutex::new(None),
            draining: Arc::new(AsyncMutex::new(())),
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the timer, replacing a loop that is already running.
    ///
    /// The first tick fires one interval from now.
    pub fn start<D: Delivery>(&self, delivery: D) -> Result<(), SyncError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;

        let mut running = self.running();
        if let Some(previous) = running.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run(
            Arc::clone(&self.queue),
            self.state.clone(),
            delivery,
            self.config.interval,
            Arc::clone(&self.draining),
            cancel.clone(),
        ));
        *running = Some(Running { cancel, handle });
        tracing::debug!(interval = ?self.config.interval, "sync loop started");
        Ok(())
    }

    /// Stops the timer. Returns `false` if it was not running.
    ///
    /// A drain already in progress finishes its current send.
    pub fn stop(&self) -> bool {
        match self.running().take() {
            Some(running) => {
                running.cancel.cancel();
                tracing::debug!("sync loop stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Runs one drain pass now, after any pass already in progress.
    pub async fn tick<D: Delivery + ?Sized>(&self, delivery: &D) -> DrainReport {
        let _turn = self.draining.lock().await;
        drain(&self.queue, &self.state, delivery).await
    }
}

impl Drop for SyncLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SyncLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLoop")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn run<D: Delivery>(
    queue: Arc<DurableQueue>,
    state: watch::Receiver<ConnectionState>,
    delivery: D,
    period: Duration,
    draining: Arc<AsyncMutex<()>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let _turn = draining.lock().await;
        drain(&queue, &state, &delivery).await;
    }
}

/// Offers every pending message to `delivery`, per conversation in FIFO order.
pub async fn drain<D: Delivery + ?Sized>(
    queue: &DurableQueue,
    state: &watch::Receiver<ConnectionState>,
    delivery: &D,
) -> DrainReport {
    let mut report = DrainReport::default();
    let connected = state.borrow().is_connected();
    if !connected || queue.is_empty() {
        return report;
    }

    'keys: for key in queue.keys() {
        for message in queue.peek_due(&key) {
            match delivery.deliver(&message).await {
                Ok(()) => {
                    report.sent += 1;
                    if let Err(e) = queue.remove(&message.id) {
                        // Stays queued and will be delivered again
                        tracing::error!(id = %message.id, error = %e, "cannot remove delivered message");
                        break 'keys;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    if let Err(err) = queue.mark_failed(&message.id) {
                        tracing::error!(id = %message.id, error = %err, "cannot record failed attempt");
                    }
                    tracing::debug!(id = %message.id, key = %key, error = %e, "delivery failed");
                    if matches!(e, SendError::NotConnected) {
                        break 'keys;
                    }
                    continue 'keys;
                }
            }
        }
    }

    if report.sent > 0 {
        tracing::info!(sent = report.sent, failed = report.failed, "drained offline queue");
    } else {
        tracing::debug!(failed = report.failed, "nothing drained");
    }
    report
}
