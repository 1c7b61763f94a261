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

//! Error kinds surfaced by the lock core.

use thiserror::Error;

use crate::bluetooth::Permission;

/// Failures reported across the core boundary.
///
/// Transport faults never escape as panics; they are converted into one of
/// these kinds and also reported as a [`StatusEvent`](crate::events::StatusEvent).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Bluetooth is switched off; the shell should prompt for enablement.
    #[error("Bluetooth is not enabled")]
    RadioDisabled,

    /// No Bluetooth adapter is present.
    #[error("Bluetooth is not supported on this device")]
    RadioUnavailable,

    /// The operation needs a runtime authorization that was not granted.
    #[error("Permission denied: {0}")]
    PermissionDenied(Permission),

    /// Connection attempt failed; the transport is back in `Disconnected`.
    #[error("Could not connect: {reason}")]
    ConnectFailed { reason: String },

    /// Write to the peripheral failed; the connection is kept.
    #[error("Failed to send {}", String::from_utf8_lossy(.payload).trim_end())]
    SendFailed { payload: Vec<u8> },

    /// A command was issued without an active connection.
    #[error("Not connected")]
    NotConnected,

    /// A radio request (discovery, bonded lookup) failed.
    #[error("Radio error: {0}")]
    Radio(String),
}

impl LockError {
    /// Wrap a collaborator failure as a connect failure.
    pub fn connect_failed(err: impl std::fmt::Display) -> Self {
        Self::ConnectFailed {
            reason: err.to_string(),
        }
    }
}
