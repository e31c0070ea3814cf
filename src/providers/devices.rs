use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    device::discovery::{self, DeviceFactory},
    event::{Event, EventBus},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Keeps the device directory in step with the hardware.
///
/// Scans the device root on start and then every rescan interval, adding
/// new devices (with their effect workers) and tearing down vanished ones.
/// On shutdown every device is torn down.
///
/// # Priority and Criticality
///
/// - **Priority**: 10 (highest)
/// - **Critical**: Yes
pub struct DeviceServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
}

impl DeviceServiceProvider {
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for DeviceServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_device_service(state, event_bus, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "DeviceService"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_critical(&self) -> bool {
        true
    }
}

/// Outcome of one rescan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Tracks which device directory produced which registered serial.
pub struct DeviceSync {
    state: Arc<AppState>,
    event_bus: EventBus,
    factory: DeviceFactory,
    known: HashMap<PathBuf, String>,
    /// Entries whose serial collided with a registered device.
    rejected: HashSet<PathBuf>,
}

impl DeviceSync {
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        let factory = state.device_factory();
        Self {
            state,
            event_bus,
            factory,
            known: HashMap::new(),
            rejected: HashSet::new(),
        }
    }

    fn announce(&self, event: Event) {
        if let Err(e) = self.event_bus.publish(event) {
            debug!("Device event not delivered: {e}");
        }
    }

    /// Scans `root` once and applies the difference.
    pub async fn rescan(&mut self, root: &Path) -> Result<SyncReport> {
        let scan_root = root.to_path_buf();
        let candidates = tokio::task::spawn_blocking(move || discovery::scan(&scan_root))
            .await
            .context("device scan task failed")?
            .with_context(|| format!("Failed to scan {}", root.display()))?;

        let present: HashSet<&PathBuf> = candidates.iter().map(|c| &c.path).collect();
        let mut report = SyncReport::default();

        let vanished: Vec<PathBuf> = self
            .known
            .keys()
            .filter(|path| !present.contains(path))
            .cloned()
            .collect();
        for path in vanished {
            if let Some(serial) = self.known.remove(&path) {
                self.drop_device(&serial).await;
                report.removed.push(serial);
            }
        }
        self.rejected.retain(|path| present.contains(path));

        for candidate in candidates {
            if self.known.contains_key(&candidate.path) || self.rejected.contains(&candidate.path)
            {
                continue;
            }
            let factory = self.factory.clone();
            let built = tokio::task::spawn_blocking({
                let candidate = candidate.clone();
                move || factory.build(&candidate)
            })
            .await
            .context("device build task failed")?;
            let device = match built {
                Ok(device) => device,
                Err(e) => {
                    warn!("Skipping {}: {}", candidate.id(), e);
                    continue;
                }
            };

            device.start_effects(&self.state.effects, &self.state.device_token);
            let serial = device.serial().to_string();
            if !self.state.directory.add(device.clone()) {
                device.teardown(self.state.effects.shutdown_timeout).await;
                self.rejected.insert(candidate.path);
                continue;
            }
            self.known.insert(candidate.path, serial.clone());
            self.announce(Event::DeviceAdded(serial.clone()));
            report.added.push(serial);
        }

        if !report.added.is_empty() || !report.removed.is_empty() {
            info!(
                "Devices: {} added, {} removed, {} registered",
                report.added.len(),
                report.removed.len(),
                self.state.directory.len()
            );
        }
        Ok(report)
    }

    async fn drop_device(&self, serial: &str) {
        if let Some(device) = self.state.directory.remove(serial) {
            device.teardown(self.state.effects.shutdown_timeout).await;
            info!("[{serial}] device removed");
            self.announce(Event::DeviceRemoved(serial.to_string()));
        }
    }

    /// Removes and tears down every device this sync registered.
    pub async fn teardown_all(&mut self) {
        let serials: Vec<String> = self.known.drain().map(|(_, serial)| serial).collect();
        for serial in serials {
            self.drop_device(&serial).await;
        }
        self.rejected.clear();
    }
}

async fn run_device_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    cancel_token: CancellationToken,
) -> Result<()> {
    let (root, period) = {
        let config = state.config().await;
        (config.devices_root.clone(), config.rescan_interval())
    };
    info!("Watching {} for devices", root.display());

    let mut sync = DeviceSync::new(state.clone(), event_bus);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            _instant = ticker.tick() => {
                if let Err(e) = sync.rescan(&root).await {
                    warn!("{e:#}");
                }
            }
        }
    }

    state.device_token.cancel();
    sync.teardown_all().await;
    info!("Device service stopped");
    Ok(())
}
