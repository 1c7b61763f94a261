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

//! User-facing lock verbs on top of discovery and the transport.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bluetooth::{
    Command, Device, DeviceRegistry, DiscoverySession, LinkStatus, Permission, PermissionGate,
    ProfileConnector, Radio, SocketConnector, Strategy, TransportConnection,
};
use crate::error::LockError;
use crate::events::{EventSink, StatusEvent};

/// Collaborators handed to the controller.
pub struct Platform {
    pub radio: Arc<dyn Radio>,
    pub permissions: Arc<dyn PermissionGate>,
    pub sockets: Arc<dyn SocketConnector>,
    pub profiles: Arc<dyn ProfileConnector>,
}

/// Tunables for the controller.
#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    pub scan_timeout: Duration,
    pub spp_uuid: Uuid,
}

/// Orchestrates discovery, selection, and lock commands.
///
/// Failures are returned to the caller and also reported on the status
/// stream, so a shell can simply render events.
pub struct LockController {
    registry: Arc<DeviceRegistry>,
    discovery: DiscoverySession,
    transport: Arc<TransportConnection>,
    radio: Arc<dyn Radio>,
    permissions: Arc<dyn PermissionGate>,
    events: EventSink,
}

impl LockController {
    /// Create a controller and the status receiver for the shell.
    pub fn new(
        platform: Platform,
        options: ControllerOptions,
    ) -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (events, event_rx) = EventSink::channel();
        let registry = Arc::new(DeviceRegistry::new());
        let discovery = DiscoverySession::new(
            platform.radio.clone(),
            platform.permissions.clone(),
            registry.clone(),
            events.clone(),
            options.scan_timeout,
        );
        let transport = TransportConnection::new(
            platform.radio.clone(),
            platform.sockets,
            platform.profiles,
            options.spp_uuid,
            events.clone(),
        );

        let controller = Self {
            registry,
            discovery,
            transport,
            radio: platform.radio,
            permissions: platform.permissions,
            events,
        };
        (controller, event_rx)
    }

    /// Start scanning for locks.
    pub async fn start_scan(&self) -> Result<(), LockError> {
        self.discovery.start().await.map_err(|e| self.report(e))
    }

    /// Stop scanning.
    pub async fn stop_scan(&self) {
        self.discovery.stop().await;
    }

    pub fn is_scanning(&self) -> bool {
        self.discovery.is_active()
    }

    /// Devices found by the current or last scan.
    pub fn devices(&self) -> Vec<Device> {
        self.registry.list()
    }

    /// Devices bonded at the platform level, for the paired-devices picker.
    pub async fn bonded_devices(&self) -> Result<Vec<Device>, LockError> {
        self.require(Permission::Connect)?;
        let bonded = self.radio.bonded_devices().await.map_err(|e| {
            error!("Failed to read bonded devices: {}", e);
            LockError::Radio(e.to_string())
        })?;
        Ok(self.registry.bonded_snapshot(bonded))
    }

    /// Connect to `device` with the strategy its bonding state calls for.
    pub fn connect(&self, device: Device) -> Result<JoinHandle<()>, LockError> {
        let strategy = Strategy::for_device(&device);
        self.connect_with(device, strategy)
    }

    /// Connect to `device` with an explicit strategy.
    pub fn connect_with(
        &self,
        device: Device,
        strategy: Strategy,
    ) -> Result<JoinHandle<()>, LockError> {
        self.require(Permission::Connect)?;
        info!("Selected {} ({})", device, strategy);
        Ok(self.transport.connect(device, strategy))
    }

    pub async fn disconnect(&self) {
        self.transport.disconnect().await;
    }

    pub fn status(&self) -> LinkStatus {
        self.transport.status()
    }

    /// Send `OPEN`.
    pub async fn open(&self) -> Result<(), LockError> {
        self.send_command(Command::Open).await
    }

    /// Send `CLOSE`.
    pub async fn close(&self) -> Result<(), LockError> {
        self.send_command(Command::Close).await
    }

    pub async fn send_command(&self, command: Command) -> Result<(), LockError> {
        info!("Sending {}", command);
        self.transport
            .send(command.as_bytes())
            .await
            .map_err(|e| self.report(e))
    }

    fn require(&self, permission: Permission) -> Result<(), LockError> {
        if self.permissions.is_granted(permission) {
            Ok(())
        } else {
            warn!("{} not granted", permission.as_str());
            self.events.emit(StatusEvent::PermissionDenied(permission));
            Err(LockError::PermissionDenied(permission))
        }
    }

    /// Forward errors the transport and discovery do not emit themselves.
    fn report(&self, err: LockError) -> LockError {
        match &err {
            LockError::PermissionDenied(permission) => {
                self.events.emit(StatusEvent::PermissionDenied(*permission))
            }
            LockError::RadioDisabled => self.events.emit(StatusEvent::RadioDisabled),
            LockError::NotConnected => self.events.emit(StatusEvent::NotConnected),
            LockError::RadioUnavailable | LockError::Radio(_) => error!("{}", err),
            LockError::ConnectFailed { .. } | LockError::SendFailed { .. } => {}
        }
        err
    }
}
