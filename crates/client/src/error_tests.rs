// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::realtime::{ConnectionError, QueueError, TransportError};

#[test]
fn test_connection_failed_message() {
    let err = Error::ConnectionFailed { attempts: 5 };
    assert_eq!(
        err.to_string(),
        "connection failed after 5 reconnect attempts"
    );
}

#[test]
fn test_layer_errors_are_transparent() {
    let err: Error = ConnectionError::NotConnected.into();
    assert_eq!(err.to_string(), "not connected");

    let err: Error = ConnectionError::from(TransportError::ConnectionClosed).into();
    assert_eq!(err.to_string(), "transport error: connection closed");

    let err: Error = QueueError::EmptyKey.into();
    assert_eq!(err.to_string(), "conversation key must not be empty");
}

#[test]
fn test_config_parse_error_converts() {
    let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
    let err: Error = toml_err.into();
    assert!(err.to_string().starts_with("invalid config file"));
}
