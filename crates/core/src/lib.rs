// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! sb-core: Shared library for the switchboard real-time client
//!
//! This crate provides the wire envelope codec, typed inbound events, the
//! pending outbound message model, and the key-value storage abstraction
//! used by the durable queue.

pub mod envelope;
pub mod error;
pub mod event;
pub mod pending;
pub mod storage;

pub use envelope::Envelope;
pub use error::{Error, Result};
pub use event::{Event, EventKind, Notice, NoticeLevel, RecordId};
pub use pending::PendingMessage;
pub use storage::{FileStore, MemoryStore, Storage, StoreLock};
