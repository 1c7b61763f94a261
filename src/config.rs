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

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::bluetooth::{
    StaticPermissions, DEFAULT_SCAN_TIMEOUT, LE_SERIAL_SERVICE_UUID, LE_SERIAL_WRITE_UUID,
    SPP_UUID,
};

const APP_DIR: &str = "doorlock-remote";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Runtime authorizations granted to the core.
    pub permissions: PermissionsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Adapter to use (e.g. "hci0"); the default adapter when unset.
    pub adapter: Option<String>,

    /// Discovery window in seconds.
    pub scan_timeout_secs: u64,

    /// Service record for the streaming socket.
    pub spp_uuid: Uuid,

    /// GATT service holding the lock's serial characteristic.
    pub le_service_uuid: Uuid,

    /// Characteristic commands are written to over BLE.
    pub le_write_uuid: Uuid,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT.as_secs(),
            spp_uuid: SPP_UUID,
            le_service_uuid: LE_SERIAL_SERVICE_UUID,
            le_write_uuid: LE_SERIAL_WRITE_UUID,
        }
    }
}

impl BluetoothConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "doorlock_remote=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Allow device discovery.
    pub scan: bool,

    /// Allow connecting and listing bonded devices.
    pub connect: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            scan: true,
            connect: true,
        }
    }
}

impl PermissionsConfig {
    pub fn to_gate(&self) -> StaticPermissions {
        StaticPermissions {
            scan: self.scan,
            connect: self.connect,
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`, writing the defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
