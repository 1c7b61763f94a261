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

//! Discovered devices and the registry that deduplicates them.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;

use super::constants::UNKNOWN_DEVICE_NAME;

/// Platform-assigned device identity (the Bluetooth address on BlueZ).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform bonding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondState {
    Unbonded,
    Bonded,
}

/// A candidate peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    id: DeviceId,
    name: Option<String>,
    bond_state: BondState,
}

impl Device {
    pub fn new(id: DeviceId, name: Option<String>, bond_state: BondState) -> Self {
        Self {
            id,
            name,
            bond_state,
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Name as reported by the device, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for display, with a placeholder for unnamed devices.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_DEVICE_NAME)
    }

    pub fn bond_state(&self) -> BondState {
        self.bond_state
    }

    pub fn is_bonded(&self) -> bool {
        self.bond_state == BondState::Bonded
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.id)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    order: Vec<Device>,
    seen: HashSet<DeviceId>,
}

/// Devices found during the current scan, in discovery order.
///
/// Safe to share between the discovery pump and readers; [`list`](Self::list)
/// hands out a copy so a running scan can keep appending.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    inner: RwLock<RegistryInner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every device.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.order.clear();
        inner.seen.clear();
    }

    /// Insert a device unless its identity is already known.
    ///
    /// Returns `true` if the device was new.
    pub fn add(&self, device: Device) -> bool {
        let mut inner = self.inner.write();
        if !inner.seen.insert(device.id.clone()) {
            return false;
        }
        inner.order.push(device);
        true
    }

    /// Snapshot of the devices in discovery order.
    pub fn list(&self) -> Vec<Device> {
        self.inner.read().order.clone()
    }

    /// Device at a list position.
    pub fn get(&self, index: usize) -> Option<Device> {
        self.inner.read().order.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }

    /// Turn the platform's bonded set into an ordered list.
    ///
    /// Used for the paired-devices picker; the live registry is not touched.
    pub fn bonded_snapshot<I>(&self, source: I) -> Vec<Device>
    where
        I: IntoIterator<Item = Device>,
    {
        let mut seen = HashSet::new();
        source
            .into_iter()
            .filter(|device| seen.insert(device.id.clone()))
            .collect()
    }
}
