//! Integration tests for the route engine public API
//!
//! These tests validate the full routing lifecycle across the crate
//! boundary, including:
//! - Reference-counted acquire/release lifecycle
//! - Snapshot delivery (initial snapshot, change broadcasts)
//! - Request/verification flow and error propagation
//! - The wire shape of events handed to the transport layer

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use audio_router::config::RouterConfig;
use audio_router::device::{DeviceKind, FilterProfile, BUILTIN_RECEIVER_ID, BUILTIN_SPEAKER_ID};
use audio_router::engine::backend::{sco_output, RouteHost, StubRouteHost};
use audio_router::engine::RouteEngine;
use audio_router::error::RouteError;
use audio_router::RouteEvent;

fn test_engine(host: &StubRouteHost) -> RouteEngine {
    let mut config = RouterConfig::default();
    config.routing.verify_delay_ms = 40;
    RouteEngine::new(Arc::new(host.clone()) as Arc<dyn RouteHost>, config)
}

fn wait_until(timeout: Duration, pred: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    pred()
}

/// Test that the engine can be created and torn down without panicking
#[test]
fn test_engine_creation() {
    let host = StubRouteHost::new();
    let engine = test_engine(&host);
    assert!(!engine.is_active());
    drop(engine);
}

/// Full lifecycle: acquire → enumerate → subscribe → plug → request → release
#[test]
fn test_full_routing_lifecycle() {
    let host = StubRouteHost::new();
    let engine = test_engine(&host);

    engine.acquire().expect("acquire should succeed");
    assert!(engine.is_active());

    let devices = engine
        .list_available_devices(FilterProfile::Communication)
        .expect("enumeration should succeed");
    assert_eq!(devices[0].id, BUILTIN_SPEAKER_ID);
    assert_eq!(devices[1].id, BUILTIN_RECEIVER_ID);

    let (_handle, mut events) = engine.subscribe().expect("subscribe should succeed");
    let initial = events.try_recv().expect("initial snapshot must be delivered");
    match initial {
        RouteEvent::Snapshot { state } => {
            assert_eq!(
                state.selected_device.map(|device| device.id),
                Some(BUILTIN_RECEIVER_ID.to_string())
            );
        }
        other => panic!("expected snapshot, got {:?}", other),
    }

    host.connect(sco_output("bt-1"));
    assert!(wait_until(Duration::from_secs(2), || {
        engine
            .current_snapshot()
            .is_ok_and(|snapshot| snapshot
                .selected_device
                .is_some_and(|device| device.id == "bt-1"))
    }));

    engine
        .request_device("bt-1")
        .expect("requesting a connected device should succeed");

    engine.release().expect("release should succeed");
    assert!(!engine.is_active());
}

/// Operations are gated on the lifecycle guard
#[test]
fn test_request_requires_acquire() {
    let host = StubRouteHost::new();
    let engine = test_engine(&host);

    let result = engine.request_device(BUILTIN_SPEAKER_ID);
    assert_eq!(result, Err(RouteError::NotInitialized));

    engine.acquire().unwrap();
    assert!(engine.request_device(BUILTIN_SPEAKER_ID).is_ok());
    engine.release().unwrap();
}

/// Unknown ids are rejected without disturbing route state
#[test]
fn test_invalid_device_rejection() {
    let host = StubRouteHost::new();
    let engine = test_engine(&host);
    engine.acquire().unwrap();

    let before = engine.current_snapshot().unwrap();
    let result = engine.request_device("ghost-device");
    assert!(matches!(result, Err(RouteError::InvalidDevice { .. })));
    assert_eq!(engine.current_snapshot().unwrap(), before);
}

/// The async stream adapter yields the initial snapshot first
#[test]
fn test_route_events_stream_adapter() {
    use futures::StreamExt;

    let host = StubRouteHost::with_outputs(vec![sco_output("bt-1")]);
    let engine = test_engine(&host);
    engine.acquire().unwrap();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build test runtime");

    rt.block_on(async {
        let mut stream = engine.route_events_stream().await.unwrap();
        let first = stream.next().await.expect("stream must yield initial state");
        match first {
            RouteEvent::Snapshot { state } => {
                assert!(state
                    .available_devices
                    .iter()
                    .any(|device| device.id == "bt-1"));
                assert_eq!(
                    state.selected_device.map(|device| device.kind),
                    Some(DeviceKind::Bluetooth)
                );
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    });
}

/// Events serialize to the stable wire shape consumed by the transport
#[test]
fn test_wire_contract_stability() {
    let host = StubRouteHost::with_outputs(vec![sco_output("bt-1")]);
    let engine = test_engine(&host);
    engine.acquire().unwrap();

    let snapshot = engine.current_snapshot().unwrap();
    let json = serde_json::to_value(&snapshot).unwrap();

    let ids: Vec<&str> = json["availableDevices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|device| device["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids[0], "builtin_speaker");
    assert_eq!(ids[1], "builtin_receiver");
    assert_eq!(json["selectedDevice"]["kind"], "bluetooth");
}

/// Two engines over independent hosts do not share state
#[test]
fn test_engine_instances_are_isolated() {
    let host_a = StubRouteHost::new();
    let host_b = StubRouteHost::with_outputs(vec![sco_output("bt-1")]);
    let engine_a = test_engine(&host_a);
    let engine_b = test_engine(&host_b);

    engine_a.acquire().unwrap();
    engine_b.acquire().unwrap();

    let devices_a = engine_a
        .list_available_devices(FilterProfile::Communication)
        .unwrap();
    let devices_b = engine_b
        .list_available_devices(FilterProfile::Communication)
        .unwrap();
    assert!(!devices_a.iter().any(|device| device.id == "bt-1"));
    assert!(devices_b.iter().any(|device| device.id == "bt-1"));
}
