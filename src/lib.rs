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

//! Bluetooth remote for serial door-lock controllers.
//!
//! Finds nearby locks, keeps one connection to the selected lock over an
//! RFCOMM socket or a BLE GATT link, and sends it `OPEN` / `CLOSE`.

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod state;

pub use error::LockError;
pub use events::StatusEvent;
pub use lock::{ControllerOptions, LockController, Platform};
