// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The single lock connection and its two strategies.
//!
//! Every connect, disconnect, and send runs under one async mutex, so state
//! transitions never interleave. Reads of the current status go through a
//! separate snapshot and do not wait for a handshake in progress.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::device::Device;
use super::radio::{ProfileConnector, ProfileLink, ProfileState, Radio, SerialStream, SocketConnector};
use crate::error::LockError;
use crate::events::{EventSink, StatusEvent};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
        }
    }
}

/// How the link to the peripheral is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// RFCOMM stream located through the SPP service record.
    StreamingSocket,
    /// BLE GATT connection driven by state-change notifications.
    LowEnergyProfile,
}

impl Strategy {
    /// Bonded devices are reached over the serial socket, freshly scanned
    /// ones over the low-energy profile.
    pub fn for_device(device: &Device) -> Self {
        if device.is_bonded() {
            Strategy::StreamingSocket
        } else {
            Strategy::LowEnergyProfile
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::StreamingSocket => f.write_str("Bluetooth socket"),
            Strategy::LowEnergyProfile => f.write_str("BLE GATT"),
        }
    }
}

/// Point-in-time view of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub strategy: Option<Strategy>,
    pub target: Option<Device>,
}

impl LinkStatus {
    fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            strategy: None,
            target: None,
        }
    }
}

/// The live resource behind the connection.
enum Link {
    Socket(Box<dyn SerialStream>),
    Profile(Box<dyn ProfileLink>),
}

impl Link {
    async fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        match self {
            Link::Socket(stream) => stream.write_all(bytes).await,
            Link::Profile(profile) => profile.write(bytes).await,
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        match self {
            Link::Socket(stream) => stream.close().await,
            Link::Profile(profile) => profile.close().await,
        }
    }
}

/// Guarded by the operation lock.
struct Inner {
    link: Option<Link>,
    /// Bumped whenever a new link is installed; profile watchers compare
    /// against it to ignore notifications for a released handle.
    link_id: u64,
}

/// The process-wide connection to the lock.
pub struct TransportConnection {
    radio: Arc<dyn Radio>,
    sockets: Arc<dyn SocketConnector>,
    profiles: Arc<dyn ProfileConnector>,
    service_uuid: Uuid,
    events: EventSink,
    inner: Mutex<Inner>,
    status: RwLock<LinkStatus>,
    /// Latest connect/disconnect request; queued connects that are no longer
    /// the latest are dropped.
    requests: AtomicU64,
}

impl TransportConnection {
    pub fn new(
        radio: Arc<dyn Radio>,
        sockets: Arc<dyn SocketConnector>,
        profiles: Arc<dyn ProfileConnector>,
        service_uuid: Uuid,
        events: EventSink,
    ) -> Arc<Self> {
        Arc::new(Self {
            radio,
            sockets,
            profiles,
            service_uuid,
            events,
            inner: Mutex::new(Inner {
                link: None,
                link_id: 0,
            }),
            status: RwLock::new(LinkStatus::disconnected()),
            requests: AtomicU64::new(0),
        })
    }

    pub fn status(&self) -> LinkStatus {
        self.status.read().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.read().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Connect to `device` on a background task.
    ///
    /// Any existing connection is released first. If another connect or a
    /// disconnect is requested before this one gets the lock, this request is
    /// dropped. The returned handle completes when the attempt has reached
    /// `Connected`, `Disconnected`, or (for the profile strategy) `Connecting`.
    pub fn connect(self: &Arc<Self>, device: Device, strategy: Strategy) -> JoinHandle<()> {
        let ticket = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_connect(ticket, device, strategy).await })
    }

    /// Release the current connection. A no-op when already disconnected.
    pub async fn disconnect(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        if inner.link.is_none() && self.state() == ConnectionState::Disconnected {
            debug!("Disconnect requested while already disconnected");
            return;
        }
        self.release(&mut inner).await;
    }

    /// Write `bytes` to the peripheral.
    ///
    /// Fails with `NotConnected` (no I/O) unless connected. A write error is
    /// reported as `SendFailed` and leaves the connection as it was.
    pub async fn send(&self, bytes: &[u8]) -> Result<(), LockError> {
        let mut inner = self.inner.lock().await;
        if self.state() != ConnectionState::Connected {
            debug!("Send rejected, state is {}", self.state().as_str());
            return Err(LockError::NotConnected);
        }
        let Some(link) = inner.link.as_mut() else {
            return Err(LockError::NotConnected);
        };

        match link.write(bytes).await {
            Ok(()) => {
                debug!("Sent {} bytes", bytes.len());
                self.events.emit(StatusEvent::SendOk {
                    payload: bytes.to_vec(),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Write failed, keeping connection: {}", e);
                self.events.emit(StatusEvent::SendFailed {
                    payload: bytes.to_vec(),
                });
                Err(LockError::SendFailed {
                    payload: bytes.to_vec(),
                })
            }
        }
    }

    async fn run_connect(self: Arc<Self>, ticket: u64, device: Device, strategy: Strategy) {
        let mut inner = self.inner.lock().await;
        if self.requests.load(Ordering::SeqCst) != ticket {
            debug!("Connect to {} superseded before it started", device);
            return;
        }

        self.release(&mut inner).await;
        self.set_status(ConnectionState::Connecting, Some(strategy), Some(device.clone()));
        info!("Connecting to {} over {}", device, strategy);
        self.events.emit(StatusEvent::Connecting {
            device: device.clone(),
            strategy,
        });

        match strategy {
            Strategy::StreamingSocket => self.connect_socket(&mut inner, device).await,
            Strategy::LowEnergyProfile => self.connect_profile(&mut inner, device),
        }
    }

    async fn connect_socket(&self, inner: &mut Inner, device: Device) {
        // Inquiry and page share the radio; a running scan stalls the handshake.
        if let Err(e) = self.radio.stop_discovery().await {
            warn!("Could not cancel discovery before connecting: {}", e);
        }

        let mut stream = match self.sockets.allocate(&device, self.service_uuid) {
            Ok(stream) => stream,
            Err(e) => {
                self.fail_connect(device, LockError::connect_failed(e));
                return;
            }
        };

        match stream.connect().await {
            Ok(()) => {
                inner.link_id += 1;
                inner.link = Some(Link::Socket(stream));
                self.set_status(
                    ConnectionState::Connected,
                    Some(Strategy::StreamingSocket),
                    Some(device.clone()),
                );
                info!("Socket connected to {}", device);
                self.events.emit(StatusEvent::Connected {
                    device,
                    strategy: Strategy::StreamingSocket,
                });
            }
            Err(e) => {
                if let Err(close_err) = stream.close().await {
                    warn!("Failed to close socket after failed connect: {}", close_err);
                }
                self.fail_connect(device, LockError::connect_failed(e));
            }
        }
    }

    fn connect_profile(self: &Arc<Self>, inner: &mut Inner, device: Device) {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        match self.profiles.connect(&device, notify_tx) {
            Ok(link) => {
                inner.link_id += 1;
                inner.link = Some(Link::Profile(link));
                debug!("Profile connect to {} initiated", device);
                let this = Arc::clone(self);
                tokio::spawn(this.watch_profile(inner.link_id, notify_rx));
            }
            Err(e) => self.fail_connect(device, LockError::connect_failed(e)),
        }
    }

    /// Apply profile notifications for the link installed as `link_id`.
    async fn watch_profile(
        self: Arc<Self>,
        link_id: u64,
        mut notify_rx: mpsc::UnboundedReceiver<ProfileState>,
    ) {
        while let Some(profile_state) = notify_rx.recv().await {
            let mut inner = self.inner.lock().await;
            if inner.link_id != link_id || inner.link.is_none() {
                debug!("Ignoring {:?} for a released profile link", profile_state);
                return;
            }

            let status = self.status();
            let Some(device) = status.target.clone() else {
                return;
            };

            match profile_state {
                ProfileState::Connected => {
                    if status.state == ConnectionState::Connecting {
                        self.set_status(
                            ConnectionState::Connected,
                            Some(Strategy::LowEnergyProfile),
                            Some(device.clone()),
                        );
                        info!("Profile connected to {}", device);
                        self.events.emit(StatusEvent::Connected {
                            device,
                            strategy: Strategy::LowEnergyProfile,
                        });
                    }
                }
                ProfileState::Disconnected => {
                    if let Some(mut link) = inner.link.take() {
                        if let Err(e) = link.close().await {
                            warn!("Failed to close profile handle: {}", e);
                        }
                    }
                    if status.state == ConnectionState::Connecting {
                        self.fail_connect(
                            device,
                            LockError::connect_failed("device disconnected before connecting"),
                        );
                    } else {
                        self.set_status(ConnectionState::Disconnected, None, None);
                        info!("Profile link to {} dropped", device);
                        self.events.emit(StatusEvent::Disconnected { device });
                    }
                    return;
                }
            }
        }
        debug!("Profile notifications for link {} ended", link_id);
    }

    /// Close whatever resource is held and go back to `Disconnected`.
    async fn release(&self, inner: &mut Inner) {
        let previous = self.status();
        if let Some(mut link) = inner.link.take() {
            if let Err(e) = link.close().await {
                warn!("Error while releasing link: {}", e);
            }
        }
        self.set_status(ConnectionState::Disconnected, None, None);

        if previous.state != ConnectionState::Disconnected {
            if let Some(device) = previous.target {
                info!("Disconnected from {}", device);
                self.events.emit(StatusEvent::Disconnected { device });
            }
        }
    }

    fn fail_connect(&self, device: Device, err: LockError) {
        self.set_status(ConnectionState::Disconnected, None, None);
        error!("Connection to {} failed: {}", device, err);
        let reason = match err {
            LockError::ConnectFailed { reason } => reason,
            other => other.to_string(),
        };
        self.events.emit(StatusEvent::ConnectFailed { device, reason });
    }

    fn set_status(&self, state: ConnectionState, strategy: Option<Strategy>, target: Option<Device>) {
        *self.status.write() = LinkStatus {
            state,
            strategy,
            target,
        };
    }
}
