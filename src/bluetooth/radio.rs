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

//! Platform collaborators the lock core drives.
//!
//! The radio, permission gate, and the two connectors are traits so the core
//! can run against BlueZ or against in-memory doubles.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::device::Device;

/// Events pushed by the radio while a discovery is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A device answered the inquiry.
    Found(Device),
    /// The radio stopped discovering (stop request or inquiry over).
    Finished,
}

/// Profile connection state reported by the low-energy stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    Connected,
    Disconnected,
}

/// Runtime authorizations the core checks before touching the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Scan,
    Connect,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Scan => "BLUETOOTH_SCAN",
            Permission::Connect => "BLUETOOTH_CONNECT",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers whether a permission is currently granted.
pub trait PermissionGate: Send + Sync {
    fn is_granted(&self, permission: Permission) -> bool;
}

/// Fixed grants, read from configuration.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissions {
    pub scan: bool,
    pub connect: bool,
}

impl StaticPermissions {
    pub fn allow_all() -> Self {
        Self {
            scan: true,
            connect: true,
        }
    }
}

impl PermissionGate for StaticPermissions {
    fn is_granted(&self, permission: Permission) -> bool {
        match permission {
            Permission::Scan => self.scan,
            Permission::Connect => self.connect,
        }
    }
}

/// Local Bluetooth adapter.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Whether the adapter is powered.
    async fn is_enabled(&self) -> Result<bool>;

    /// Devices already bonded at the platform level.
    async fn bonded_devices(&self) -> Result<Vec<Device>>;

    /// Begin discovery. Found devices and the end of the inquiry are pushed
    /// on `events`; sends must never block.
    async fn start_discovery(&self, events: mpsc::UnboundedSender<DiscoveryEvent>) -> Result<()>;

    /// Halt discovery. Calling it while idle is fine.
    async fn stop_discovery(&self) -> Result<()>;
}

/// An RFCOMM-style byte stream to a peripheral.
///
/// Allocated first, then connected, mirroring the platform socket API so a
/// failed handshake still leaves a handle to close.
#[async_trait]
pub trait SerialStream: Send {
    /// Perform the handshake. Blocks until the link is up or has failed.
    async fn connect(&mut self) -> Result<()>;

    async fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Release the socket. Must be safe on a never-connected stream.
    async fn close(&mut self) -> Result<()>;
}

/// Creates streaming sockets addressed by service record.
pub trait SocketConnector: Send + Sync {
    fn allocate(&self, device: &Device, service: Uuid) -> Result<Box<dyn SerialStream>>;
}

/// A low-energy profile handle.
#[async_trait]
pub trait ProfileLink: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Tear the profile connection down and release the handle.
    async fn close(&mut self) -> Result<()>;
}

/// Starts low-energy profile connections.
pub trait ProfileConnector: Send + Sync {
    /// Initiate a connection and return at once. The outcome and any later
    /// drop arrive on `notify`.
    fn connect(
        &self,
        device: &Device,
        notify: mpsc::UnboundedSender<ProfileState>,
    ) -> Result<Box<dyn ProfileLink>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_permissions() {
        let perms = StaticPermissions {
            scan: true,
            connect: false,
        };
        assert!(perms.is_granted(Permission::Scan));
        assert!(!perms.is_granted(Permission::Connect));
        assert!(StaticPermissions::allow_all().is_granted(Permission::Connect));
    }
}
