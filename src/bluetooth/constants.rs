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

//! Service UUIDs and timing constants for the lock link.

use std::time::Duration;
use uuid::Uuid;

/// Serial Port Profile service record (streaming socket path).
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// GATT serial service exposed by BLE UART lock modules.
pub const LE_SERIAL_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);

/// Write characteristic inside [`LE_SERIAL_SERVICE_UUID`].
/// Properties: Write, Write Without Response
pub const LE_SERIAL_WRITE_UUID: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

/// Name shown for devices that do not report one.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Default discovery window (classic inquiry length).
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(12);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            SPP_UUID.to_string().to_uppercase(),
            "00001101-0000-1000-8000-00805F9B34FB"
        );
        assert_eq!(
            LE_SERIAL_WRITE_UUID.to_string(),
            "0000ffe1-0000-1000-8000-00805f9b34fb"
        );
    }
}
