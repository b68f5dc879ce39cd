// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the event dispatcher.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use sb_core::{Envelope, Event, EventKind, RecordId};
use serde_json::json;

use super::dispatcher::{Dispatcher, Listener, ListenerError};
use super::test_helpers::code_verified;

type Log = Arc<Mutex<Vec<String>>>;

fn recorder(log: &Log, name: &str) -> impl Fn(&Event) -> Result<(), ListenerError> + Send + Sync {
    let log = Arc::clone(log);
    let name = name.to_string();
    move |event| {
        log.lock().unwrap().push(format!("{name}:{}", event.kind()));
        Ok(())
    }
}

#[test]
fn test_dispatch_invokes_listeners_in_registration_order() {
    let dispatcher = Dispatcher::new();
    let seen: Arc<Mutex<Vec<(usize, Event)>>> = Arc::default();

    for i in 0..2 {
        let seen = Arc::clone(&seen);
        dispatcher.subscribe(EventKind::CodeVerified, move |event| {
            seen.lock().unwrap().push((i, event.clone()));
            Ok(())
        });
    }

    let event = dispatcher.dispatch(&code_verified(42, "won")).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, 0);
    assert_eq!(seen[1].0, 1);
    for (_, got) in seen.iter() {
        assert_eq!(got, &event);
        match got {
            Event::CodeVerified(v) => {
                assert_eq!(v.code_id, RecordId::Num(42));
                assert_eq!(v.status, "won");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[test]
fn test_dispatch_without_listeners_is_noop() {
    let dispatcher = Dispatcher::new();
    let env = Envelope::new("SOMETHING_NEW", json!({"x": 1})).unwrap();

    let event = dispatcher.dispatch(&env).unwrap();
    assert_eq!(event.kind(), EventKind::Other("SOMETHING_NEW".into()));
    assert_eq!(dispatcher.dispatch_event(&event), 0);
}

#[test]
fn test_dispatch_only_reaches_matching_kind() {
    let dispatcher = Dispatcher::new();
    let log: Log = Arc::default();
    dispatcher.subscribe(EventKind::ChatMessage, recorder(&log, "chat"));
    dispatcher.subscribe(EventKind::CodeVerified, recorder(&log, "verified"));

    dispatcher.dispatch(&code_verified(1, "lost"));

    assert_eq!(*log.lock().unwrap(), vec!["verified:CODE_VERIFIED"]);
}

#[test]
fn test_other_kind_listeners_receive_raw_data() {
    let dispatcher = Dispatcher::new();
    let data: Arc<Mutex<Option<serde_json::Value>>> = Arc::default();
    let sink = Arc::clone(&data);
    dispatcher.subscribe(EventKind::from("STATS_UPDATED"), move |event| {
        if let Event::Other { data, .. } = event {
            *sink.lock().unwrap() = Some(data.clone());
        }
        Ok(())
    });

    let env = Envelope::new("STATS_UPDATED", json!({"total": 7})).unwrap();
    dispatcher.dispatch(&env);

    assert_eq!(*data.lock().unwrap(), Some(json!({"total": 7})));
}

#[test]
fn test_failing_listener_does_not_stop_others() {
    let dispatcher = Dispatcher::new();
    let log: Log = Arc::default();
    dispatcher.subscribe(EventKind::CodeVerified, recorder(&log, "first"));
    dispatcher.subscribe(EventKind::CodeVerified, |_| Err("boom".into()));
    dispatcher.subscribe(EventKind::CodeVerified, recorder(&log, "third"));

    let event = Event::decode(&code_verified(5, "won")).unwrap();
    let ok = dispatcher.dispatch_event(&event);

    assert_eq!(ok, 2);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["first:CODE_VERIFIED", "third:CODE_VERIFIED"]
    );
}

#[test]
fn test_panicking_listener_is_isolated() {
    let dispatcher = Dispatcher::new();
    let log: Log = Arc::default();
    dispatcher.subscribe(EventKind::CodeVerified, |_| panic!("listener bug"));
    dispatcher.subscribe(EventKind::CodeVerified, recorder(&log, "after"));

    dispatcher.dispatch(&code_verified(5, "won"));
    // The registry is still usable after the panic
    dispatcher.dispatch(&code_verified(6, "won"));

    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(dispatcher.listener_count(&EventKind::CodeVerified), 2);
}

#[test]
fn test_invalid_payload_reaches_no_listener() {
    let dispatcher = Dispatcher::new();
    let log: Log = Arc::default();
    dispatcher.subscribe(EventKind::CodeVerified, recorder(&log, "verified"));

    // code_id and status are required
    let env = Envelope::new("CODE_VERIFIED", json!({"status": 3})).unwrap();
    assert!(dispatcher.dispatch(&env).is_none());
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_unsubscribe_by_handle() {
    let dispatcher = Dispatcher::new();
    let log: Log = Arc::default();
    let first = dispatcher.subscribe(EventKind::CodeVerified, recorder(&log, "first"));
    dispatcher.subscribe(EventKind::CodeVerified, recorder(&log, "second"));

    assert!(dispatcher.unsubscribe(&first));
    assert!(!dispatcher.unsubscribe(&first));
    assert_eq!(first.kind(), &EventKind::CodeVerified);

    dispatcher.dispatch(&code_verified(1, "won"));
    assert_eq!(*log.lock().unwrap(), vec!["second:CODE_VERIFIED"]);
}

#[test]
fn test_unsubscribe_listener_removes_first_match_only() {
    let dispatcher = Dispatcher::new();
    let count = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&count);
    let listener: Listener = Arc::new(move |_| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    dispatcher.subscribe_listener(EventKind::CodeVerified, Arc::clone(&listener));
    dispatcher.subscribe_listener(EventKind::CodeVerified, Arc::clone(&listener));

    assert!(dispatcher.unsubscribe_listener(&EventKind::CodeVerified, &listener));
    dispatcher.dispatch(&code_verified(1, "won"));
    assert_eq!(*count.lock().unwrap(), 1);

    assert!(dispatcher.unsubscribe_listener(&EventKind::CodeVerified, &listener));
    assert!(!dispatcher.unsubscribe_listener(&EventKind::CodeVerified, &listener));
    assert_eq!(dispatcher.listener_count(&EventKind::CodeVerified), 0);
}

#[test]
fn test_unsubscribe_during_dispatch_keeps_snapshot() {
    let dispatcher = Dispatcher::new();
    let log: Log = Arc::default();

    let handle: Arc<Mutex<Option<super::dispatcher::Subscription>>> = Arc::default();
    let d = dispatcher.clone();
    let h = Arc::clone(&handle);
    dispatcher.subscribe(EventKind::CodeVerified, move |_| {
        if let Some(sub) = h.lock().unwrap().as_ref() {
            d.unsubscribe(sub);
        }
        Ok(())
    });
    let second = dispatcher.subscribe(EventKind::CodeVerified, recorder(&log, "second"));
    *handle.lock().unwrap() = Some(second);

    // First listener removes the second mid-dispatch; it still runs this time
    dispatcher.dispatch(&code_verified(1, "won"));
    assert_eq!(log.lock().unwrap().len(), 1);

    dispatcher.dispatch(&code_verified(2, "won"));
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_subscribe_during_dispatch_applies_next_time() {
    let dispatcher = Dispatcher::new();
    let log: Log = Arc::default();
    let d = dispatcher.clone();
    let l = Arc::clone(&log);
    let added = Arc::new(Mutex::new(false));
    dispatcher.subscribe(EventKind::CodeVerified, move |_| {
        let mut added = added.lock().unwrap();
        if !*added {
            *added = true;
            d.subscribe(EventKind::CodeVerified, recorder(&l, "late"));
        }
        Ok(())
    });

    dispatcher.dispatch(&code_verified(1, "won"));
    assert!(log.lock().unwrap().is_empty());

    dispatcher.dispatch(&code_verified(2, "won"));
    assert_eq!(*log.lock().unwrap(), vec!["late:CODE_VERIFIED"]);
}
