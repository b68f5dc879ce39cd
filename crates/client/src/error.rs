// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the switchboard client.

use thiserror::Error;

use crate::realtime::{ConnectionError, QueueError, SyncError};

/// All possible errors that can occur in the switchboard library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Core(#[from] sb_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection failed after {attempts} reconnect attempts")]
    ConnectionFailed { attempts: u32 },
}

/// A specialized Result type for switchboard operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
