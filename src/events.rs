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

//! Status events reported to the presentation shell.

use tokio::sync::mpsc;
use tracing::debug;

use crate::bluetooth::{Device, Permission, Strategy};

/// Everything the core tells the shell. The core never renders anything
/// itself; the shell turns these into lists, prompts, and toasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Discovery started.
    Scanning,
    /// Discovery ended (stop, timeout, or radio completion).
    ScanStopped,
    /// A new device was added to the registry.
    DeviceFound(Device),
    /// Connection attempt started.
    Connecting { device: Device, strategy: Strategy },
    /// Connection established.
    Connected { device: Device, strategy: Strategy },
    /// An established or pending connection was released.
    Disconnected { device: Device },
    /// Connection attempt failed.
    ConnectFailed { device: Device, reason: String },
    /// Payload written to the peripheral.
    SendOk { payload: Vec<u8> },
    /// Payload could not be written; the connection is kept.
    SendFailed { payload: Vec<u8> },
    /// A permission the operation needs is not granted.
    PermissionDenied(Permission),
    /// Bluetooth is off; the shell should ask the user to enable it.
    RadioDisabled,
    /// A command was issued with no active connection.
    NotConnected,
}

impl StatusEvent {
    /// Human-readable message for the shell.
    pub fn message(&self) -> String {
        match self {
            StatusEvent::Scanning => "Starting Bluetooth scan.".to_string(),
            StatusEvent::ScanStopped => "Bluetooth scan finished.".to_string(),
            StatusEvent::DeviceFound(device) => format!("Found {}", device),
            StatusEvent::Connecting { device, strategy } => {
                format!("Connecting to {} over {}...", device, strategy)
            }
            StatusEvent::Connected { device, strategy } => {
                format!("Connected to {} over {}.", device, strategy)
            }
            StatusEvent::Disconnected { device } => format!("Disconnected from {}.", device),
            StatusEvent::ConnectFailed { device, reason } => {
                format!("Could not connect to {}: {}", device, reason)
            }
            StatusEvent::SendOk { payload } => format!("Message sent: {}", printable(payload)),
            StatusEvent::SendFailed { payload } => {
                format!("Failed to send message: {}", printable(payload))
            }
            StatusEvent::PermissionDenied(permission) => {
                format!("{} permission is required.", permission.as_str())
            }
            StatusEvent::RadioDisabled => "Bluetooth is not enabled.".to_string(),
            StatusEvent::NotConnected => "No device connected.".to_string(),
        }
    }
}

fn printable(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).trim_end().to_string()
}

/// Sending half of the status stream.
///
/// Unbounded so emitting never waits on the shell, even while the transport
/// lock is held.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the shell drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event.
    pub fn emit(&self, event: StatusEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("Status receiver gone, dropping {:?}", e.0);
        }
    }
}
