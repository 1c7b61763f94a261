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

//! Bluetooth communication module.
//!
//! Discovery, the single lock connection, and the platform seams it runs on.

#[cfg(feature = "bluez")]
mod bluez;
mod constants;
mod device;
mod discovery;
mod protocol;
mod radio;
mod transport;

#[cfg(feature = "bluez")]
pub use bluez::{BluezProfileConnector, BluezRadio, BluezSocketConnector};
pub use constants::{
    DEFAULT_SCAN_TIMEOUT, LE_SERIAL_SERVICE_UUID, LE_SERIAL_WRITE_UUID, SPP_UUID,
    UNKNOWN_DEVICE_NAME,
};
pub use device::{BondState, Device, DeviceId, DeviceRegistry};
pub use discovery::DiscoverySession;
pub use protocol::{Command, LINE_ENDING};
pub use radio::{
    DiscoveryEvent, Permission, PermissionGate, ProfileConnector, ProfileLink, ProfileState,
    Radio, SerialStream, SocketConnector, StaticPermissions,
};
pub use transport::{ConnectionState, LinkStatus, Strategy, TransportConnection};
