// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Real-time connection and delivery.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │    Client    │────►│  Connection  │────►│  Transport   │◄───► server
//! │(RealtimeCli.)│     │   Manager    │◄────│   (trait)    │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!     │      ▲                │
//!     │      │                ▼
//!     │      │         ┌──────────────┐
//!     │      └─────────│  Dispatcher  │  (listeners per event kind)
//!     ▼                └──────────────┘
//! ┌──────────────┐     ┌──────────────┐
//! │ DurableQueue │◄────│   SyncLoop   │  (drains while connected)
//! └──────────────┘     └──────────────┘
//! ```
//!
//! # Features
//!
//! - Single managed connection with linear-backoff reconnection
//! - Typed event dispatch with per-listener failure isolation
//! - Outbound messages persisted while offline, drained periodically
//! - Injectable transport and storage for testing

mod client;
mod connection;
mod dispatcher;
mod queue;
mod sync_loop;
mod transport;

pub use client::{RealtimeClient, SendOutcome};
pub use connection::{
    ConnectionConfig, ConnectionError, ConnectionManager, ConnectionState, CONNECTION_LOST_NOTICE,
};
pub use dispatcher::{Dispatcher, Listener, ListenerError, Subscription};
pub use queue::{DurableQueue, QueueError, QueueResult};
pub use sync_loop::{
    drain, Delivery, DeliveryFuture, DrainReport, SendError, SyncConfig, SyncError, SyncLoop,
};
pub use transport::{
    Connector, Transport, TransportError, TransportFuture, TransportResult, WebSocketConnector,
    WebSocketTransport,
};

#[cfg(test)]
mod test_helpers;



#[cfg(test)]
mod dispatcher_tests;



#[cfg(test)]
mod transport_tests;
