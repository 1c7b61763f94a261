//! In-memory doubles for the radio and the two connectors.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use doorlock_remote::bluetooth::{
    BondState, Device, DeviceId, DiscoveryEvent, ProfileConnector, ProfileLink, ProfileState,
    Radio, SerialStream, SocketConnector, StaticPermissions, SPP_UUID,
};
use doorlock_remote::{ControllerOptions, LockController, Platform, StatusEvent};

pub fn device(id: &str, name: &str) -> Device {
    Device::new(DeviceId::new(id), Some(name.to_string()), BondState::Unbonded)
}

pub fn bonded(id: &str, name: &str) -> Device {
    Device::new(DeviceId::new(id), Some(name.to_string()), BondState::Bonded)
}

/// Next event, or panic after a second.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<StatusEvent>) -> StatusEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for status event")
        .expect("status channel closed")
}

/// Skip events until one matches.
pub async fn expect_event<F>(rx: &mut mpsc::UnboundedReceiver<StatusEvent>, matches: F) -> StatusEvent
where
    F: Fn(&StatusEvent) -> bool,
{
    loop {
        let event = next_event(rx).await;
        if matches(&event) {
            return event;
        }
    }
}

/// Drain whatever is queued right now.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<StatusEvent>) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[derive(Default)]
pub struct FakeRadio {
    pub disabled: AtomicBool,
    pub fail_bonded: AtomicBool,
    pub bonded: Mutex<Vec<Device>>,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    discovery_tx: Mutex<Option<mpsc::UnboundedSender<DiscoveryEvent>>>,
}

impl FakeRadio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Push a found-device event into the running discovery.
    pub fn found(&self, device: Device) {
        if let Some(tx) = self.discovery_tx.lock().as_ref() {
            let _ = tx.send(DiscoveryEvent::Found(device));
        }
    }

    /// Report the inquiry as complete.
    pub fn finish(&self) {
        if let Some(tx) = self.discovery_tx.lock().take() {
            let _ = tx.send(DiscoveryEvent::Finished);
        }
    }
}

#[async_trait]
impl Radio for FakeRadio {
    async fn is_enabled(&self) -> Result<bool> {
        Ok(!self.disabled.load(Ordering::SeqCst))
    }

    async fn bonded_devices(&self) -> Result<Vec<Device>> {
        if self.fail_bonded.load(Ordering::SeqCst) {
            return Err(anyhow!("adapter went away"));
        }
        Ok(self.bonded.lock().clone())
    }

    async fn start_discovery(&self, events: mpsc::UnboundedSender<DiscoveryEvent>) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        *self.discovery_tx.lock() = Some(events);
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.finish();
        Ok(())
    }
}

/// What happened on the fake sockets.
#[derive(Default)]
pub struct SocketLog {
    pub allocated: Mutex<Vec<DeviceId>>,
    pub connected: Mutex<Vec<DeviceId>>,
    pub closed: Mutex<Vec<DeviceId>>,
    pub written: Mutex<Vec<Vec<u8>>>,
    pub services: Mutex<Vec<Uuid>>,
}

impl SocketLog {
    pub fn closes(&self) -> usize {
        self.closed.lock().len()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.written.lock().clone()
    }
}

#[derive(Default)]
pub struct FakeSockets {
    pub log: Arc<SocketLog>,
    pub fail_connect: AtomicBool,
    pub fail_write: Arc<AtomicBool>,
    pub connect_delay: Mutex<Option<Duration>>,
}

impl FakeSockets {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl SocketConnector for FakeSockets {
    fn allocate(&self, device: &Device, service: Uuid) -> Result<Box<dyn SerialStream>> {
        self.log.allocated.lock().push(device.id().clone());
        self.log.services.lock().push(service);
        Ok(Box::new(FakeStream {
            id: device.id().clone(),
            log: self.log.clone(),
            fail_connect: self.fail_connect.load(Ordering::SeqCst),
            fail_write: self.fail_write.clone(),
            delay: *self.connect_delay.lock(),
        }))
    }
}

struct FakeStream {
    id: DeviceId,
    log: Arc<SocketLog>,
    fail_connect: bool,
    fail_write: Arc<AtomicBool>,
    delay: Option<Duration>,
}

#[async_trait]
impl SerialStream for FakeStream {
    async fn connect(&mut self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_connect {
            return Err(anyhow!("read failed, socket might closed or timeout"));
        }
        self.log.connected.lock().push(self.id.clone());
        Ok(())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(anyhow!("Broken pipe"));
        }
        self.log.written.lock().push(bytes.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.closed.lock().push(self.id.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct ProfileLog {
    pub written: Mutex<Vec<Vec<u8>>>,
    pub closed: Mutex<Vec<DeviceId>>,
}

#[derive(Default)]
pub struct FakeProfiles {
    pub log: Arc<ProfileLog>,
    pub fail_write: Arc<AtomicBool>,
    notifiers: Mutex<Vec<mpsc::UnboundedSender<ProfileState>>>,
}

impl FakeProfiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver a state change to the most recent connection.
    pub fn notify(&self, state: ProfileState) {
        if let Some(tx) = self.notifiers.lock().last() {
            let _ = tx.send(state);
        }
    }

    /// Deliver a state change to the connection started `index`-th.
    pub fn notify_at(&self, index: usize, state: ProfileState) {
        if let Some(tx) = self.notifiers.lock().get(index) {
            let _ = tx.send(state);
        }
    }

    pub fn connections(&self) -> usize {
        self.notifiers.lock().len()
    }
}

impl ProfileConnector for FakeProfiles {
    fn connect(
        &self,
        device: &Device,
        notify: mpsc::UnboundedSender<ProfileState>,
    ) -> Result<Box<dyn ProfileLink>> {
        self.notifiers.lock().push(notify);
        Ok(Box::new(FakeProfileLink {
            id: device.id().clone(),
            log: self.log.clone(),
            fail_write: self.fail_write.clone(),
        }))
    }
}

struct FakeProfileLink {
    id: DeviceId,
    log: Arc<ProfileLog>,
    fail_write: Arc<AtomicBool>,
}

#[async_trait]
impl ProfileLink for FakeProfileLink {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(anyhow!("GATT write failed"));
        }
        self.log.written.lock().push(bytes.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.closed.lock().push(self.id.clone());
        Ok(())
    }
}

pub struct Harness {
    pub controller: LockController,
    pub events: mpsc::UnboundedReceiver<StatusEvent>,
    pub radio: Arc<FakeRadio>,
    pub sockets: Arc<FakeSockets>,
    pub profiles: Arc<FakeProfiles>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_permissions(StaticPermissions::allow_all())
    }

    pub fn with_permissions(permissions: StaticPermissions) -> Self {
        let radio = FakeRadio::new();
        let sockets = FakeSockets::new();
        let profiles = FakeProfiles::new();
        let platform = Platform {
            radio: radio.clone(),
            permissions: Arc::new(permissions),
            sockets: sockets.clone(),
            profiles: profiles.clone(),
        };
        let options = ControllerOptions {
            scan_timeout: Duration::from_secs(5),
            spp_uuid: SPP_UUID,
        };
        let (controller, events) = LockController::new(platform, options);
        Self {
            controller,
            events,
            radio,
            sockets,
            profiles,
        }
    }
}
