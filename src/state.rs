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

//! Application state management.
//!
//! Mirrors the status stream for the shell's `status` command.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::bluetooth::ConnectionState;
use crate::events::StatusEvent;

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    /// Current connection status.
    pub connection_status: RwLock<ConnectionState>,

    /// Device the connection is bound to.
    pub connected_device: RwLock<Option<String>>,

    /// Whether a scan is running.
    pub scanning: RwLock<bool>,

    /// Last message shown to the user.
    pub last_message: RwLock<Option<String>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            connection_status: RwLock::new(ConnectionState::Disconnected),
            connected_device: RwLock::new(None),
            scanning: RwLock::new(false),
            last_message: RwLock::new(None),
        }
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fold a status event into the state.
    pub fn apply(&self, event: &StatusEvent) {
        match event {
            StatusEvent::Scanning => *self.scanning.write() = true,
            StatusEvent::ScanStopped => *self.scanning.write() = false,
            StatusEvent::Connecting { device, .. } => {
                *self.connection_status.write() = ConnectionState::Connecting;
                *self.connected_device.write() = Some(device.display_name().to_string());
            }
            StatusEvent::Connected { device, .. } => {
                *self.connection_status.write() = ConnectionState::Connected;
                *self.connected_device.write() = Some(device.display_name().to_string());
            }
            StatusEvent::Disconnected { .. } | StatusEvent::ConnectFailed { .. } => {
                *self.connection_status.write() = ConnectionState::Disconnected;
                *self.connected_device.write() = None;
            }
            _ => {}
        }
        *self.last_message.write() = Some(event.message());
    }

    pub fn get_status(&self) -> ConnectionState {
        *self.connection_status.read()
    }

    pub fn get_device_name(&self) -> Option<String> {
        self.connected_device.read().clone()
    }

    pub fn is_scanning(&self) -> bool {
        *self.scanning.read()
    }

    pub fn get_last_message(&self) -> Option<String> {
        self.last_message.read().clone()
    }
}
