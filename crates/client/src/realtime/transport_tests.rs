// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the transport module.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::test_helpers::MockHub;
use super::transport::{Connector, Transport, TransportError, WebSocketConnector};

#[tokio::test]
async fn test_websocket_send_without_connection_fails() {
    let mut transport = WebSocketConnector.transport();
    let result = transport.send("{}".to_string()).await;
    assert!(matches!(result, Err(TransportError::ConnectionClosed)));
}

#[tokio::test]
async fn test_websocket_recv_without_connection_fails() {
    let mut transport = WebSocketConnector.transport();
    let result = transport.recv().await;
    assert!(matches!(result, Err(TransportError::ConnectionClosed)));
}

#[tokio::test]
async fn test_websocket_disconnect_when_closed_is_noop() {
    let mut transport = WebSocketConnector.transport();
    transport.disconnect().await.unwrap();
    transport.disconnect().await.unwrap();
    let result = transport.send("{}".to_string()).await;
    assert!(matches!(result, Err(TransportError::ConnectionClosed)));
}

#[tokio::test]
async fn test_websocket_connect_refused() {
    // Bind then drop a listener to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut transport = WebSocketConnector.transport();
    let result = transport.connect(&format!("ws://127.0.0.1:{port}/ws")).await;
    assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    let result = transport.recv().await;
    assert!(matches!(result, Err(TransportError::ConnectionClosed)));
}

#[tokio::test]
async fn test_mock_transport_round_trip() {
    let hub = MockHub::new();
    let mut transport = hub.connector().transport();

    transport.connect("ws://mock.test/x").await.unwrap();

    transport.send("out".to_string()).await.unwrap();
    assert_eq!(hub.sent(), vec!["out"]);

    assert!(hub.push_frame("in"));
    assert_eq!(transport.recv().await.unwrap(), Some("in".to_string()));

    assert!(hub.drop_peer());
    assert_eq!(transport.recv().await.unwrap(), None);
    let result = transport.send("late".to_string()).await;
    assert!(matches!(result, Err(TransportError::ConnectionClosed)));
    assert_eq!(hub.sent(), vec!["out"]);
}

#[tokio::test]
async fn test_mock_transport_connect_failure() {
    let hub = MockHub::new();
    hub.set_connect_fail(true);
    let mut transport = hub.connector().transport();

    let result = transport.connect("ws://mock.test/x").await;
    assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    assert_eq!(hub.connect_count(), 1);
    assert!(!hub.push_frame("nobody listening"));
}
