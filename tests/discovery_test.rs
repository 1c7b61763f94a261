//! Discovery session tests against a fake radio.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use common::{device, drain, expect_event, FakeRadio};
use doorlock_remote::bluetooth::{DeviceRegistry, DiscoverySession, Permission, StaticPermissions};
use doorlock_remote::events::EventSink;
use doorlock_remote::{LockError, StatusEvent};

struct Rig {
    session: DiscoverySession,
    registry: Arc<DeviceRegistry>,
    radio: Arc<FakeRadio>,
    events: mpsc::UnboundedReceiver<StatusEvent>,
}

fn rig_with(permissions: StaticPermissions, scan_timeout: Duration) -> Rig {
    let (sink, events) = EventSink::channel();
    let radio = FakeRadio::new();
    let registry = Arc::new(DeviceRegistry::new());
    let session = DiscoverySession::new(
        radio.clone(),
        Arc::new(permissions),
        registry.clone(),
        sink,
        scan_timeout,
    );
    Rig {
        session,
        registry,
        radio,
        events,
    }
}

fn rig() -> Rig {
    rig_with(StaticPermissions::allow_all(), Duration::from_secs(5))
}

async fn wait_found(rig: &mut Rig, id: &str) {
    let id = id.to_string();
    expect_event(&mut rig.events, |e| {
        matches!(e, StatusEvent::DeviceFound(d) if d.id().as_str() == id)
    })
    .await;
}

#[tokio::test]
async fn test_duplicates_are_reported_once() {
    let mut rig = rig();
    rig.session.start().await.unwrap();
    assert!(rig.session.is_active());

    rig.radio.found(device("AA:BB", "Lock1"));
    rig.radio.found(device("CC:DD", "Lock2"));
    rig.radio.found(device("AA:BB", "Lock1"));
    rig.radio.found(device("EE:FF", "Lock3"));
    wait_found(&mut rig, "EE:FF").await;

    let ids: Vec<String> = rig
        .registry
        .list()
        .iter()
        .map(|d| d.id().as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["AA:BB", "CC:DD", "EE:FF"]);

    let found = drain(&mut rig.events)
        .into_iter()
        .filter(|e| matches!(e, StatusEvent::DeviceFound(_)))
        .count();
    // AA:BB, CC:DD, and EE:FF were already consumed above; no duplicate follows.
    assert_eq!(found, 0);
}

#[tokio::test]
async fn test_restart_resets_registry() {
    let mut rig = rig();
    rig.session.start().await.unwrap();
    rig.radio.found(device("AA:BB", "Lock1"));
    rig.radio.found(device("CC:DD", "Lock2"));
    wait_found(&mut rig, "CC:DD").await;
    assert_eq!(rig.registry.len(), 2);

    rig.session.stop().await;
    assert!(!rig.session.is_active());
    // Results survive a stop until the next scan begins.
    assert_eq!(rig.registry.len(), 2);

    rig.session.start().await.unwrap();
    assert!(rig.registry.is_empty());

    rig.radio.found(device("EE:FF", "Lock3"));
    wait_found(&mut rig, "EE:FF").await;
    assert_eq!(rig.registry.list(), vec![device("EE:FF", "Lock3")]);
}

#[tokio::test]
async fn test_start_replaces_running_scan() {
    let mut rig = rig();
    rig.session.start().await.unwrap();
    rig.radio.found(device("AA:BB", "Lock1"));
    wait_found(&mut rig, "AA:BB").await;

    rig.session.start().await.unwrap();
    assert!(rig.session.is_active());
    assert!(rig.registry.is_empty());
    assert_eq!(rig.radio.start_calls.load(Ordering::SeqCst), 2);

    // The same device is new again in the fresh scan.
    rig.radio.found(device("AA:BB", "Lock1"));
    wait_found(&mut rig, "AA:BB").await;
    assert_eq!(rig.registry.len(), 1);
}

#[tokio::test]
async fn test_scan_without_permission_changes_nothing() {
    let mut rig = rig_with(
        StaticPermissions {
            scan: false,
            connect: true,
        },
        Duration::from_secs(5),
    );
    rig.registry.add(device("AA:BB", "Lock1"));

    let err = rig.session.start().await.unwrap_err();
    assert_eq!(err, LockError::PermissionDenied(Permission::Scan));
    assert!(!rig.session.is_active());
    assert_eq!(rig.registry.len(), 1);
    assert_eq!(rig.radio.start_calls.load(Ordering::SeqCst), 0);
    assert!(drain(&mut rig.events).is_empty());
}

#[tokio::test]
async fn test_scan_with_radio_off() {
    let mut rig = rig();
    rig.radio.disabled.store(true, Ordering::SeqCst);

    let err = rig.session.start().await.unwrap_err();
    assert_eq!(err, LockError::RadioDisabled);
    assert!(!rig.session.is_active());
    assert_eq!(rig.radio.start_calls.load(Ordering::SeqCst), 0);
    assert!(drain(&mut rig.events).is_empty());
}

#[tokio::test]
async fn test_scan_window_elapses() {
    let mut rig = rig_with(StaticPermissions::allow_all(), Duration::from_millis(50));
    rig.session.start().await.unwrap();

    expect_event(&mut rig.events, |e| matches!(e, StatusEvent::ScanStopped)).await;
    assert!(!rig.session.is_active());
    assert_eq!(rig.radio.stop_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_radio_finishing_ends_scan() {
    let mut rig = rig();
    rig.session.start().await.unwrap();
    rig.radio.found(device("AA:BB", "Lock1"));
    rig.radio.finish();

    expect_event(&mut rig.events, |e| matches!(e, StatusEvent::ScanStopped)).await;
    assert!(!rig.session.is_active());
    assert_eq!(rig.registry.len(), 1);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let rig = rig();
    rig.session.stop().await;
    rig.session.stop().await;
    assert!(!rig.session.is_active());

    rig.session.start().await.unwrap();
    rig.session.stop().await;
    rig.session.stop().await;
    assert!(!rig.session.is_active());
}

#[tokio::test]
async fn test_on_device_found_deduplicates() {
    let mut rig = rig();
    assert!(rig.session.on_device_found(device("AA:BB", "Lock1")));
    assert!(!rig.session.on_device_found(device("AA:BB", "Lock1")));
    assert_eq!(
        drain(&mut rig.events),
        vec![StatusEvent::DeviceFound(device("AA:BB", "Lock1"))]
    );
}
