// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for sb-core operations.

use thiserror::Error;

/// All possible errors that can occur in sb-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {kind} payload: {reason}")]
    Decode { kind: String, reason: String },

    #[error("invalid storage key: '{0}'\n  hint: keys must be non-empty")]
    InvalidKey(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// A specialized Result type for sb-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
