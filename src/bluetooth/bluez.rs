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

//! BlueZ implementation of the radio and connectors.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bluer::gatt::remote::Characteristic;
use bluer::rfcomm::{ConnectRequest, Profile, ProfileHandle, Role, Stream};
use bluer::{Adapter, AdapterEvent, Address, DeviceEvent, DeviceProperty, Session};
use futures::StreamExt;
use parking_lot::Mutex;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::device::{BondState, Device, DeviceId};
use super::radio::{
    DiscoveryEvent, ProfileConnector, ProfileLink, ProfileState, Radio, SerialStream,
    SocketConnector,
};

/// How long to wait for BlueZ to hand over the RFCOMM socket once the
/// profile connection is up.
const PROFILE_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn parse_address(id: &DeviceId) -> Result<Address> {
    id.as_str()
        .parse()
        .map_err(|_| anyhow!("Invalid Bluetooth address: {}", id))
}

async fn describe(adapter: &Adapter, address: Address) -> Result<Device> {
    let device = adapter.device(address)?;
    let name = device.name().await?;
    let bond_state = if device.is_paired().await? {
        BondState::Bonded
    } else {
        BondState::Unbonded
    };
    Ok(Device::new(DeviceId::new(address.to_string()), name, bond_state))
}

/// The local adapter, through BlueZ.
pub struct BluezRadio {
    session: Session,
    adapter: Adapter,
    scan: Mutex<Option<CancellationToken>>,
}

impl BluezRadio {
    /// Open a BlueZ session on the named adapter, or the default one.
    pub async fn open(adapter_name: Option<&str>) -> Result<Self> {
        let session = Session::new().await?;
        info!("BlueZ session created");

        let adapter = match adapter_name {
            Some(name) => session.adapter(name)?,
            None => session.default_adapter().await?,
        };
        info!("Using Bluetooth adapter: {}", adapter.name());

        Ok(Self {
            session,
            adapter,
            scan: Mutex::new(None),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }
}

#[async_trait]
impl Radio for BluezRadio {
    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.adapter.is_powered().await?)
    }

    async fn bonded_devices(&self) -> Result<Vec<Device>> {
        let mut devices = Vec::new();
        for address in self.adapter.device_addresses().await? {
            let device = describe(&self.adapter, address).await?;
            if device.is_bonded() {
                devices.push(device);
            }
        }
        Ok(devices)
    }

    async fn start_discovery(&self, events: mpsc::UnboundedSender<DiscoveryEvent>) -> Result<()> {
        self.stop_discovery().await?;

        let stream = self.adapter.discover_devices().await?;
        let cancel = CancellationToken::new();
        *self.scan.lock() = Some(cancel.clone());
        let adapter = self.adapter.clone();

        tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = stream.next() => match event {
                        Some(AdapterEvent::DeviceAdded(address)) => {
                            match describe(&adapter, address).await {
                                Ok(device) => {
                                    if events.send(DiscoveryEvent::Found(device)).is_err() {
                                        break;
                                    }
                                }
                                Err(e) => debug!("Skipping {}: {}", address, e),
                            }
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
            }
            // Dropping the stream ends the inquiry.
            drop(stream);
            let _ = events.send(DiscoveryEvent::Finished);
            debug!("Discovery stream closed");
        });

        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        if let Some(cancel) = self.scan.lock().take() {
            cancel.cancel();
        }
        Ok(())
    }
}

/// Opens RFCOMM sockets through a registered client profile.
pub struct BluezSocketConnector {
    session: Session,
    adapter: Adapter,
}

impl BluezSocketConnector {
    pub fn new(session: Session, adapter: Adapter) -> Self {
        Self { session, adapter }
    }
}

impl SocketConnector for BluezSocketConnector {
    fn allocate(&self, device: &Device, service: Uuid) -> Result<Box<dyn SerialStream>> {
        Ok(Box::new(BluezSocket {
            session: self.session.clone(),
            adapter: self.adapter.clone(),
            address: parse_address(device.id())?,
            service,
            profile: None,
            stream: None,
        }))
    }
}

struct BluezSocket {
    session: Session,
    adapter: Adapter,
    address: Address,
    service: Uuid,
    profile: Option<Pin<Box<ProfileHandle>>>,
    stream: Option<Stream>,
}

enum FirstOutcome {
    Connected(bluer::Result<()>),
    Request(Option<ConnectRequest>),
}

#[async_trait]
impl SerialStream for BluezSocket {
    async fn connect(&mut self) -> Result<()> {
        let profile = Profile {
            uuid: self.service,
            name: Some("Serial Port".to_string()),
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let handle = self.session.register_profile(profile).await?;
        let handle = self.profile.insert(Box::pin(handle));
        debug!("Registered client profile {}", self.service);

        let device = self.adapter.device(self.address)?;
        let connect = device.connect_profile(&self.service);
        tokio::pin!(connect);

        // BlueZ may deliver the socket before connect-profile returns.
        let first = tokio::select! {
            res = &mut connect => FirstOutcome::Connected(res),
            req = handle.next() => FirstOutcome::Request(req),
        };
        let request = match first {
            FirstOutcome::Connected(res) => {
                res?;
                tokio::time::timeout(PROFILE_REQUEST_TIMEOUT, handle.next())
                    .await
                    .map_err(|_| anyhow!("Timed out waiting for RFCOMM socket"))?
            }
            FirstOutcome::Request(req) => req,
        };

        let request = request.ok_or_else(|| anyhow!("Profile closed before a connection arrived"))?;
        let stream = request.accept()?;
        info!("RFCOMM stream open to {}", self.address);
        self.stream = Some(stream);
        Ok(())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("Socket is not connected"))?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.profile = None;
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
            debug!("RFCOMM stream to {} closed", self.address);
        }
        Ok(())
    }
}

/// Starts BLE connections and writes to the lock's serial characteristic.
pub struct BluezProfileConnector {
    adapter: Adapter,
    service_uuid: Uuid,
    write_uuid: Uuid,
}

impl BluezProfileConnector {
    pub fn new(adapter: Adapter, service_uuid: Uuid, write_uuid: Uuid) -> Self {
        Self {
            adapter,
            service_uuid,
            write_uuid,
        }
    }
}

impl ProfileConnector for BluezProfileConnector {
    fn connect(
        &self,
        device: &Device,
        notify: mpsc::UnboundedSender<ProfileState>,
    ) -> Result<Box<dyn ProfileLink>> {
        let remote = self.adapter.device(parse_address(device.id())?)?;
        let cancel = CancellationToken::new();

        tokio::spawn(watch_connection(remote.clone(), notify, cancel.clone()));

        Ok(Box::new(BluezGattLink {
            device: remote,
            service_uuid: self.service_uuid,
            write_uuid: self.write_uuid,
            characteristic: None,
            cancel,
        }))
    }
}

/// Connect, then translate the device's `Connected` property into
/// profile-state notifications until cancelled.
async fn watch_connection(
    device: bluer::Device,
    notify: mpsc::UnboundedSender<ProfileState>,
    cancel: CancellationToken,
) {
    let events = match device.events().await {
        Ok(events) => events,
        Err(e) => {
            warn!("Cannot watch {}: {}", device.address(), e);
            let _ = notify.send(ProfileState::Disconnected);
            return;
        }
    };
    let mut events = Box::pin(events);

    tokio::select! {
        _ = cancel.cancelled() => return,
        res = device.connect() => {
            if let Err(e) = res {
                warn!("BLE connect to {} failed: {}", device.address(), e);
                let _ = notify.send(ProfileState::Disconnected);
                return;
            }
        }
    }
    let _ = notify.send(ProfileState::Connected);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.next() => match event {
                Some(DeviceEvent::PropertyChanged(DeviceProperty::Connected(false))) | None => {
                    let _ = notify.send(ProfileState::Disconnected);
                    break;
                }
                Some(_) => {}
            }
        }
    }
}

struct BluezGattLink {
    device: bluer::Device,
    service_uuid: Uuid,
    write_uuid: Uuid,
    characteristic: Option<Characteristic>,
    cancel: CancellationToken,
}

impl BluezGattLink {
    async fn find_characteristic(&self) -> Result<Characteristic> {
        for service in self.device.services().await? {
            if service.uuid().await? != self.service_uuid {
                continue;
            }
            for characteristic in service.characteristics().await? {
                if characteristic.uuid().await? == self.write_uuid {
                    return Ok(characteristic);
                }
            }
        }
        Err(anyhow!(
            "Write characteristic {} not found in service {}",
            self.write_uuid,
            self.service_uuid
        ))
    }
}

#[async_trait]
impl ProfileLink for BluezGattLink {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let characteristic = match self.characteristic.take() {
            Some(characteristic) => characteristic,
            None => self.find_characteristic().await?,
        };
        let result = characteristic.write(bytes).await;
        self.characteristic = Some(characteristic);
        Ok(result?)
    }

    async fn close(&mut self) -> Result<()> {
        self.cancel.cancel();
        self.characteristic = None;
        if self.device.is_connected().await? {
            self.device.disconnect().await?;
            debug!("BLE link to {} closed", self.device.address());
        }
        Ok(())
    }
}
