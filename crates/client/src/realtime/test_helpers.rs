// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for realtime module tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sb_core::{Envelope, PendingMessage, Storage};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::connection::ConnectionState;
use super::sync_loop::{Delivery, DeliveryFuture, SendError};
use super::transport::{Connector, Transport, TransportError, TransportFuture};
use crate::config::Endpoint;

/// Endpoint used by all mock-backed tests.
pub fn test_endpoint() -> Endpoint {
    Endpoint::new("ws://mock.test", "/ws/admin/{identity}").unwrap()
}

pub fn code_verified(code_id: i64, status: &str) -> Envelope {
    Envelope::new(
        "CODE_VERIFIED",
        json!({ "code_id": code_id, "status": status }),
    )
    .unwrap()
}

pub fn chat_text(text: &str) -> Envelope {
    Envelope::new("CHAT_MESSAGE", json!({ "text": text })).unwrap()
}

/// Waits until the watched state satisfies `pred`, failing after `secs`.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<ConnectionState>,
    secs: u64,
    pred: impl FnMut(&ConnectionState) -> bool,
) -> ConnectionState {
    let state = tokio::time::timeout(Duration::from_secs(secs), rx.wait_for(pred))
        .await
        .expect("timed out waiting for connection state")
        .expect("state channel closed");
    *state
}

#[derive(Default)]
struct HubState {
    connect_fail: bool,
    send_fail: bool,
    attempts: Vec<(String, Instant)>,
    sent: Vec<String>,
    /// Feed of the live connection; `None` items close it from the peer side.
    inbox: Option<mpsc::UnboundedSender<Option<String>>>,
    closed: usize,
}

/// The "server side" shared by every transport a [`MockConnector`] creates.
#[derive(Clone, Default)]
pub struct MockHub {
    state: Arc<Mutex<HubState>>,
}

impl MockHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector { hub: self.clone() }
    }

    pub fn set_connect_fail(&self, fail: bool) {
        self.state.lock().unwrap().connect_fail = fail;
    }

    pub fn set_send_fail(&self, fail: bool) {
        self.state.lock().unwrap().send_fail = fail;
    }

    /// Times at which connect was attempted.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.state
            .lock()
            .unwrap()
            .attempts
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn attempt_urls(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .attempts
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().attempts.len()
    }

    /// Frames written by clients.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent()
            .iter()
            .map(|f| Envelope::from_json(f).unwrap())
            .collect()
    }

    /// Pushes a raw frame to the live connection. Returns `false` if none.
    pub fn push_frame(&self, frame: &str) -> bool {
        let state = self.state.lock().unwrap();
        match &state.inbox {
            Some(tx) => tx.send(Some(frame.to_string())).is_ok(),
            None => false,
        }
    }

    pub fn push_envelope(&self, envelope: &Envelope) -> bool {
        self.push_frame(&envelope.to_json().unwrap())
    }

    /// Closes the live connection from the server side.
    pub fn drop_peer(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.inbox.take() {
            Some(tx) => tx.send(None).is_ok(),
            None => false,
        }
    }

    /// Number of transports the client closed.
    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }
}

/// Connector handing out [`MockTransport`]s bound to one hub.
pub struct MockConnector {
    hub: MockHub,
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn transport(&self) -> MockTransport {
        MockTransport {
            hub: self.hub.clone(),
            inbox: None,
            connected: false,
        }
    }
}

/// Mock transport for testing without real sockets.
pub struct MockTransport {
    hub: MockHub,
    inbox: Option<mpsc::UnboundedReceiver<Option<String>>>,
    connected: bool,
}

impl Transport for MockTransport {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()> {
        let url = url.to_string();
        Box::pin(async move {
            let mut state = self.hub.state.lock().unwrap();
            state.attempts.push((url, Instant::now()));
            if state.connect_fail {
                return Err(TransportError::ConnectionFailed("mock failure".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            state.inbox = Some(tx);
            drop(state);
            self.inbox = Some(rx);
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if self.connected {
                self.connected = false;
                self.inbox = None;
                self.hub.state.lock().unwrap().closed += 1;
            }
            Ok(())
        })
    }

    fn send(&mut self, frame: String) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            let mut state = self.hub.state.lock().unwrap();
            if state.send_fail {
                return Err(TransportError::SendFailed("mock send failure".into()));
            }
            state.sent.push(frame);
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<String>> {
        Box::pin(async move {
            let Some(inbox) = self.inbox.as_mut() else {
                return Err(TransportError::ConnectionClosed);
            };
            match inbox.recv().await {
                Some(Some(frame)) => Ok(Some(frame)),
                Some(None) | None => {
                    self.connected = false;
                    Ok(None)
                }
            }
        })
    }
}

/// Delivery double recording what it was offered.
#[derive(Clone, Default)]
pub struct RecordingDelivery {
    delivered: Arc<Mutex<Vec<PendingMessage>>>,
    /// Scripted failures, consumed one per delivery before succeeding.
    failures: Arc<Mutex<VecDeque<SendError>>>,
    /// Message bodies that are always rejected.
    rejected: Arc<Mutex<HashSet<String>>>,
    /// Time each delivery takes.
    delay: Arc<Mutex<Duration>>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: SendError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Always reject messages whose `text` equals `text`.
    pub fn reject_text(&self, text: &str) {
        self.rejected.lock().unwrap().insert(text.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn delivered(&self) -> Vec<PendingMessage> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_texts(&self) -> Vec<String> {
        self.delivered()
            .iter()
            .map(|m| m.payload.data()["text"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl Delivery for RecordingDelivery {
    fn deliver<'a>(&'a self, message: &'a PendingMessage) -> DeliveryFuture<'a> {
        Box::pin(async move {
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = self.failures.lock().unwrap().pop_front() {
                return Err(error);
            }
            let text = message.payload.data()["text"].as_str().unwrap_or_default();
            if self.rejected.lock().unwrap().contains(text) {
                return Err(SendError::Rejected(format!("rejected {text}")));
            }
            self.delivered.lock().unwrap().push(message.clone());
            Ok(())
        })
    }
}

/// Storage whose writes can be switched to fail.
#[derive(Default)]
pub struct FailingStore {
    inner: sb_core::MemoryStore,
    fail_writes: Mutex<bool>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    fn check(&self) -> sb_core::Result<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(sb_core::Error::Storage("disk full".into()));
        }
        Ok(())
    }
}

impl Storage for FailingStore {
    fn get(&self, key: &str) -> sb_core::Result<Option<String>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> sb_core::Result<()> {
        self.check()?;
        self.inner.put(key, value)
    }

    fn delete(&self, key: &str) -> sb_core::Result<()> {
        self.check()?;
        self.inner.delete(key)
    }

    fn keys(&self, prefix: &str) -> sb_core::Result<Vec<String>> {
        self.inner.keys(prefix)
    }

    fn lock(&self) -> sb_core::Result<sb_core::StoreLock<'_>> {
        self.inner.lock()
    }
}
