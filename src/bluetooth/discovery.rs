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

//! Time-bounded device discovery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::device::{Device, DeviceRegistry};
use super::radio::{DiscoveryEvent, Permission, PermissionGate, Radio};
use crate::error::LockError;
use crate::events::{EventSink, StatusEvent};

/// Background task draining one scan's event channel.
struct ScanTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives a scan and feeds found devices into the registry.
pub struct DiscoverySession {
    radio: Arc<dyn Radio>,
    permissions: Arc<dyn PermissionGate>,
    registry: Arc<DeviceRegistry>,
    events: EventSink,
    scan_timeout: Duration,
    active: Arc<AtomicBool>,
    scan: Mutex<Option<ScanTask>>,
}

impl DiscoverySession {
    pub fn new(
        radio: Arc<dyn Radio>,
        permissions: Arc<dyn PermissionGate>,
        registry: Arc<DeviceRegistry>,
        events: EventSink,
        scan_timeout: Duration,
    ) -> Self {
        Self {
            radio,
            permissions,
            registry,
            events,
            scan_timeout,
            active: Arc::new(AtomicBool::new(false)),
            scan: Mutex::new(None),
        }
    }

    /// Whether a scan is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a new scan, replacing any running one.
    ///
    /// The registry is emptied before the first event of the new scan is
    /// accepted. On error nothing changes.
    pub async fn start(&self) -> Result<(), LockError> {
        if !self.permissions.is_granted(Permission::Scan) {
            warn!("Scan requested without {}", Permission::Scan.as_str());
            return Err(LockError::PermissionDenied(Permission::Scan));
        }

        match self.radio.is_enabled().await {
            Ok(true) => {}
            Ok(false) => {
                info!("Bluetooth is disabled, not scanning");
                return Err(LockError::RadioDisabled);
            }
            Err(e) => return Err(LockError::Radio(e.to_string())),
        }

        let mut scan = self.scan.lock().await;
        if let Some(previous) = scan.take() {
            debug!("Replacing running scan");
            Self::finish(previous).await;
        }

        self.registry.clear();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.active.store(true, Ordering::SeqCst);

        if let Err(e) = self.radio.start_discovery(event_tx).await {
            error!("Failed to start discovery: {}", e);
            self.active.store(false, Ordering::SeqCst);
            return Err(LockError::Radio(e.to_string()));
        }

        self.events.emit(StatusEvent::Scanning);
        info!("Scan started ({}s window)", self.scan_timeout.as_secs());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::pump(
            self.radio.clone(),
            self.registry.clone(),
            self.events.clone(),
            self.active.clone(),
            event_rx,
            cancel.clone(),
            self.scan_timeout,
        ));
        *scan = Some(ScanTask { cancel, handle });
        Ok(())
    }

    /// Stop the running scan. Safe to call when idle.
    pub async fn stop(&self) {
        let task = self.scan.lock().await.take();
        match task {
            Some(task) => {
                info!("Stopping scan");
                Self::finish(task).await;
            }
            None => debug!("No active scan to stop"),
        }

        if let Err(e) = self.radio.stop_discovery().await {
            warn!("Radio refused to stop discovery: {}", e);
        }
        self.active.store(false, Ordering::SeqCst);
    }

    /// Record a device reported by the radio.
    ///
    /// Returns `true` if it was not seen before in this scan.
    pub fn on_device_found(&self, device: Device) -> bool {
        record_found(&self.registry, &self.events, device)
    }

    async fn finish(task: ScanTask) {
        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            if !e.is_cancelled() {
                error!("Scan task ended abnormally: {:?}", e);
            }
        }
    }

    async fn pump(
        radio: Arc<dyn Radio>,
        registry: Arc<DeviceRegistry>,
        events: EventSink,
        active: Arc<AtomicBool>,
        mut event_rx: mpsc::UnboundedReceiver<DiscoveryEvent>,
        cancel: CancellationToken,
        scan_timeout: Duration,
    ) {
        let deadline = tokio::time::sleep(scan_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Scan cancelled");
                    break;
                }
                _ = &mut deadline => {
                    info!("Scan window elapsed");
                    if let Err(e) = radio.stop_discovery().await {
                        warn!("Radio refused to stop discovery: {}", e);
                    }
                    break;
                }
                event = event_rx.recv() => match event {
                    Some(DiscoveryEvent::Found(device)) => {
                        record_found(&registry, &events, device);
                    }
                    Some(DiscoveryEvent::Finished) | None => {
                        info!("Radio finished discovery");
                        break;
                    }
                }
            }
        }

        active.store(false, Ordering::SeqCst);
        info!("Scan stopped with {} device(s)", registry.len());
        events.emit(StatusEvent::ScanStopped);
    }
}

fn record_found(registry: &DeviceRegistry, events: &EventSink, device: Device) -> bool {
    if registry.add(device.clone()) {
        debug!("Found device: {}", device);
        events.emit(StatusEvent::DeviceFound(device));
        true
    } else {
        false
    }
}
