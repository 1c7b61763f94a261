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

//! Doorlock Remote command-line shell

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doorlock_remote::bluetooth::{
    BluezProfileConnector, BluezRadio, BluezSocketConnector, Command, Device, Strategy,
};
use doorlock_remote::config::Config;
use doorlock_remote::state::AppState;
use doorlock_remote::{ControllerOptions, LockController, LockError, Platform};

const HELP: &str = "\
Commands:
  scan            start scanning for locks
  stop            stop scanning
  list            show scanned devices
  paired          show bonded devices
  connect <n>     connect to scanned device n
  pair <n>        connect to bonded device n over the serial socket
  open | close    send a lock command
  disconnect      drop the connection
  status          show connection status
  quit            exit";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting Doorlock Remote v{}...", env!("CARGO_PKG_VERSION"));

    let radio = BluezRadio::open(config.bluetooth.adapter.as_deref())
        .await
        .map_err(|e| {
            error!("No usable Bluetooth adapter: {}", e);
            LockError::RadioUnavailable
        })?;
    let radio = Arc::new(radio);

    let platform = Platform {
        sockets: Arc::new(BluezSocketConnector::new(
            radio.session().clone(),
            radio.adapter().clone(),
        )),
        profiles: Arc::new(BluezProfileConnector::new(
            radio.adapter().clone(),
            config.bluetooth.le_service_uuid,
            config.bluetooth.le_write_uuid,
        )),
        permissions: Arc::new(config.permissions.to_gate()),
        radio,
    };
    let options = ControllerOptions {
        scan_timeout: config.bluetooth.scan_timeout(),
        spp_uuid: config.bluetooth.spp_uuid,
    };
    let (controller, mut event_rx) = LockController::new(platform, options);
    let state = AppState::new();

    // Render status events
    let state_events = state.clone();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            state_events.apply(&event);
            println!("{}", event.message());
        }
    });

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut bonded: Vec<Device> = Vec::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !handle_line(&controller, &state, &mut bonded, line.trim()).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    controller.stop_scan().await;
    controller.disconnect().await;
    info!("Doorlock Remote stopped");
    Ok(())
}

/// Run one shell command. Returns `false` to exit.
async fn handle_line(
    controller: &LockController,
    state: &AppState,
    bonded: &mut Vec<Device>,
    line: &str,
) -> bool {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return true;
    };
    let index = parts.next().and_then(|n| n.parse::<usize>().ok());

    let result = match verb {
        "scan" => controller.start_scan().await,
        "stop" => {
            controller.stop_scan().await;
            Ok(())
        }
        "list" => {
            print_devices(&controller.devices());
            Ok(())
        }
        "paired" => controller.bonded_devices().await.map(|devices| {
            print_devices(&devices);
            *bonded = devices;
        }),
        "connect" => match index.and_then(|n| controller.devices().get(n).cloned()) {
            Some(device) => controller.connect(device).map(|_| ()),
            None => {
                println!("Usage: connect <n> (see `list`)");
                Ok(())
            }
        },
        "pair" => match index.and_then(|n| bonded.get(n).cloned()) {
            Some(device) => controller
                .connect_with(device, Strategy::StreamingSocket)
                .map(|_| ()),
            None => {
                println!("Usage: pair <n> (see `paired`)");
                Ok(())
            }
        },
        "disconnect" => {
            controller.disconnect().await;
            Ok(())
        }
        "status" => {
            let status = controller.status();
            println!(
                "{} {}{}",
                status.state.as_str(),
                state.get_device_name().unwrap_or_default(),
                if state.is_scanning() { " (scanning)" } else { "" }
            );
            Ok(())
        }
        "help" => {
            println!("{}", HELP);
            Ok(())
        }
        "quit" | "exit" => return false,
        other => match Command::parse(other) {
            Some(command) => controller.send_command(command).await,
            None => {
                println!("Unknown command: {}", other);
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        debug!("{} failed: {}", verb, e);
    }
    true
}

fn print_devices(devices: &[Device]) {
    if devices.is_empty() {
        println!("No devices.");
    }
    for (i, device) in devices.iter().enumerate() {
        println!("  [{}] {}", i, device);
    }
}
