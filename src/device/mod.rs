//! Devices and their composed method surfaces.

pub mod discovery;
pub mod profiles;
pub mod zone;

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, RwLock, Weak,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use futures::future::join_all;
use log::{debug, error, info, warn};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use crate::{
    capability::{CapabilityRegistry, Surface, Value},
    directory::{DeviceDirectory, EffectListener, EffectMessage},
    effect_sync::EffectSynchronizer,
    effects::{EffectKind, EffectManager, EffectSettings, KeyPressStore},
    error::{RazerError, RazerResult},
    hardware::HardwareEndpoint,
    persistence::{NullPersistence, PersistenceSink},
    suspend::{self, SuspendResume},
};

pub use profiles::{DeviceKind, DeviceProfile, MatrixDims};
pub use zone::{Zone, ZoneState};

const SERIAL_ATTRIBUTE: &str = "device_serial";
const SERIAL_ATTEMPTS: usize = 3;
const SERIAL_RETRY_DELAY: Duration = Duration::from_millis(100);

static UNKNOWN_SERIALS: AtomicU32 = AtomicU32::new(0);

/// Firmware effect attributes. Writing one takes the matrix away from
/// daemon-rendered frames.
fn replaces_frames(attribute: &str) -> bool {
    attribute.starts_with("matrix_effect_") && attribute != "matrix_effect_custom"
}

/// One physical peripheral.
///
/// Holds the hardware endpoint, the composed surface and the runtime state
/// handlers read and write. All mutation goes through surface calls.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use razerd::capability::{CapabilityRegistry, Value};
/// use razerd::device::{Device, profiles};
/// use razerd::hardware::SysfsEndpoint;
///
/// # fn example() -> anyhow::Result<()> {
/// let registry = Arc::new(CapabilityRegistry::with_catalog()?);
/// let endpoint = Arc::new(SysfsEndpoint::new("/sys/bus/hid/devices/0003:1532:0203.0001"));
/// let device = Device::builder(profiles::BLACKWIDOW_CHROMA, endpoint)
///     .registry(registry)
///     .build()?;
///
/// device.call("setStatic", &[Value::U8(255), Value::U8(0), Value::U8(0)])?;
/// # Ok(())
/// # }
/// ```
pub struct Device {
    serial: String,
    profile: DeviceProfile,
    endpoint: Arc<dyn HardwareEndpoint>,
    write_lock: Mutex<()>,
    /// Bumped by every matrix effect write. Held while a frame is pushed.
    frame_gate: Mutex<u64>,
    surface: Surface,
    zones: Mutex<HashMap<Zone, ZoneState>>,
    suspend: Box<dyn SuspendResume>,
    notifications_suppressed: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn EffectListener>>>,
    directory: RwLock<Weak<DeviceDirectory>>,
    key_presses: KeyPressStore,
    persistence: Arc<dyn PersistenceSink>,
    effects: Mutex<Vec<Arc<EffectManager>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Device {
    pub fn builder(profile: DeviceProfile, endpoint: Arc<dyn HardwareEndpoint>) -> DeviceBuilder {
        DeviceBuilder {
            profile,
            endpoint,
            registry: None,
            persistence: None,
            serial: None,
            key_press_window: Duration::from_secs(2),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn endpoint(&self) -> &dyn HardwareEndpoint {
        self.endpoint.as_ref()
    }

    pub fn key_presses(&self) -> &KeyPressStore {
        &self.key_presses
    }

    /// Calls `namespace.method` on this device's surface.
    pub fn invoke(&self, namespace: &str, method: &str, args: &[Value]) -> RazerResult<Value> {
        let endpoint = self
            .surface
            .get(namespace, method)
            .ok_or_else(|| RazerError::not_supported(namespace, method))?;
        endpoint.call(self, args).inspect_err(|e| {
            warn!("[{}] {}.{} failed: {}", self.serial, namespace, method, e);
        })
    }

    /// Calls the first bound method named `method`, whatever its namespace.
    pub fn call(&self, method: &str, args: &[Value]) -> RazerResult<Value> {
        let endpoint = self
            .surface
            .find_method(method)
            .ok_or_else(|| RazerError::not_supported("*", method))?;
        endpoint.call(self, args).inspect_err(|e| {
            warn!("[{}] {} failed: {}", self.serial, endpoint.key, e);
        })
    }

    pub fn read_attribute(&self, attribute: &str) -> RazerResult<Vec<u8>> {
        self.endpoint.read(attribute)
    }

    pub fn read_text(&self, attribute: &str) -> RazerResult<String> {
        self.endpoint.read_text(attribute)
    }

    /// Writes one attribute while holding the device write lock.
    ///
    /// A successful matrix effect write also closes the frame gate on every
    /// frame rendered before it.
    pub fn write_attribute(&self, attribute: &str, data: impl AsRef<[u8]>) -> RazerResult<()> {
        if !replaces_frames(attribute) {
            return self.write_locked(attribute, data.as_ref());
        }
        let mut generation = lock(&self.frame_gate);
        self.write_locked(attribute, data.as_ref())?;
        *generation += 1;
        Ok(())
    }

    fn write_locked(&self, attribute: &str, data: &[u8]) -> RazerResult<()> {
        let _guard = lock(&self.write_lock);
        self.endpoint.write(attribute, data)
    }

    /// Matrix effect writes made so far.
    pub fn frame_generation(&self) -> u64 {
        *lock(&self.frame_gate)
    }

    /// Runs `push` under the frame gate, provided no matrix effect was
    /// written since `generation` and `wanted` still holds. Returns whether
    /// the frame was pushed.
    pub fn push_frame(
        &self,
        generation: u64,
        wanted: impl FnOnce() -> bool,
        push: impl FnOnce(&Self) -> RazerResult<()>,
    ) -> RazerResult<bool> {
        let current = lock(&self.frame_gate);
        if *current != generation || !wanted() {
            return Ok(false);
        }
        push(self)?;
        drop(current);
        Ok(true)
    }

    /// Blocks until a frame push in progress has finished.
    pub fn wait_for_frame(&self) {
        drop(lock(&self.frame_gate));
    }

    pub fn zone(&self, zone: Zone) -> ZoneState {
        lock(&self.zones).entry(zone).or_default().clone()
    }

    pub fn update_zone(&self, zone: Zone, update: impl FnOnce(&mut ZoneState)) {
        update(lock(&self.zones).entry(zone).or_default());
    }

    pub fn persist(&self, zone: Option<Zone>, key: &str, value: impl Into<JsonValue>) {
        self.persistence.set_persistence(
            &self.serial,
            zone.as_ref().map(Zone::as_str),
            key,
            value.into(),
        );
    }

    pub fn suspend_strategy(&self) -> &dyn SuspendResume {
        self.suspend.as_ref()
    }

    pub fn notifications_suppressed(&self) -> bool {
        self.notifications_suppressed.load(Ordering::SeqCst)
    }

    /// Suppresses fan-out until the returned guard drops. Nested guards
    /// restore whatever state they found.
    pub fn suppress_notifications(&self) -> NotificationGuard<'_> {
        let previous = self.notifications_suppressed.swap(true, Ordering::SeqCst);
        NotificationGuard {
            flag: &self.notifications_suppressed,
            previous,
        }
    }

    /// Announces an effect change to this device's own listeners and, when
    /// syncing is on, to every sibling.
    pub fn send_effect_event(&self, effect: &str, params: Vec<Value>) {
        if self.notifications_suppressed() {
            debug!("[{}] {} not propagated, notifications suppressed", self.serial, effect);
            return;
        }
        let message = EffectMessage::new(self.serial.as_str(), effect, params);
        self.deliver(&message);
        if let Some(directory) = self.directory() {
            if directory.sync_effects() {
                directory.notify(self, &message);
            }
        }
    }

    /// Runs every listener attached to this device. Failures are logged.
    pub fn deliver(&self, message: &EffectMessage) {
        let listeners: Vec<Arc<dyn EffectListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in listeners {
            if let Err(e) = listener.on_message(message) {
                error!(
                    "[{}] {} failed handling {}: {}",
                    self.serial,
                    listener.name(),
                    message,
                    e
                );
            }
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn EffectListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn directory(&self) -> Option<Arc<DeviceDirectory>> {
        self.directory
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .upgrade()
    }

    pub(crate) fn attach_directory(&self, directory: Weak<DeviceDirectory>) {
        *self
            .directory
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = directory;
    }

    pub(crate) fn detach_directory(&self) {
        self.attach_directory(Weak::new());
    }

    /// Records a key press for the animated key effects.
    pub fn record_key_press(&self, row: u8, col: u8) -> bool {
        let Some(matrix) = self.profile.matrix else {
            return false;
        };
        if row >= matrix.rows || col >= matrix.cols {
            debug!("[{}] key press ({row}, {col}) outside matrix", self.serial);
            return false;
        }
        self.key_presses.record((row, col), Instant::now())
    }

    /// Starts one effect manager per animated effect the surface can trigger.
    pub fn start_effects(
        self: &Arc<Self>,
        settings: &EffectSettings,
        parent: &CancellationToken,
    ) -> usize {
        if self.profile.matrix.is_none() {
            return 0;
        }
        let mut effects = lock(&self.effects);
        if !effects.is_empty() {
            return effects.len();
        }
        for kind in EffectKind::ALL {
            if self.surface.find_method(kind.trigger()).is_none() {
                continue;
            }
            let manager = Arc::new(EffectManager::spawn(
                Arc::downgrade(self),
                kind,
                settings.clone(),
                parent,
            ));
            self.add_listener(manager.clone());
            effects.push(manager);
        }
        if !effects.is_empty() {
            info!("[{}] started {} effect worker(s)", self.serial, effects.len());
        }
        effects.len()
    }

    pub fn effect_manager(&self, kind: EffectKind) -> Option<Arc<EffectManager>> {
        lock(&self.effects)
            .iter()
            .find(|manager| manager.kind() == kind)
            .cloned()
    }

    /// Stops every effect worker and detaches all listeners.
    ///
    /// Workers that miss `timeout` are logged and left behind.
    pub async fn teardown(&self, timeout: Duration) {
        let managers: Vec<Arc<EffectManager>> = lock(&self.effects).drain(..).collect();
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.key_presses.set_recording(false);
        let results = join_all(managers.iter().map(|m| m.shutdown(timeout))).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            error!("[{}] {} effect worker(s) did not stop", self.serial, failed);
        } else {
            debug!("[{}] torn down", self.serial);
        }
    }
}

/// Restores the previous suppression state on drop.
pub struct NotificationGuard<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl Drop for NotificationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::SeqCst);
    }
}

pub struct DeviceBuilder {
    profile: DeviceProfile,
    endpoint: Arc<dyn HardwareEndpoint>,
    registry: Option<Arc<CapabilityRegistry>>,
    persistence: Option<Arc<dyn PersistenceSink>>,
    serial: Option<String>,
    key_press_window: Duration,
}

impl DeviceBuilder {
    pub fn registry(mut self, registry: Arc<CapabilityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn PersistenceSink>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Uses a fixed serial instead of reading `device_serial`.
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    pub fn key_press_window(mut self, window: Duration) -> Self {
        self.key_press_window = window;
        self
    }

    /// Reads the serial, composes the surface and attaches the synchronizer.
    pub fn build(self) -> RazerResult<Arc<Device>> {
        let registry = self.registry.ok_or_else(|| {
            RazerError::UnsupportedOperation("device built without a capability registry".into())
        })?;
        let serial = match self.serial {
            Some(serial) => serial,
            None => read_serial(self.endpoint.as_ref()),
        };
        let surface = Surface::compose(registry, self.profile.capabilities);
        let persistence = self
            .persistence
            .unwrap_or_else(|| Arc::new(NullPersistence));
        let zones = Zone::ALL
            .into_iter()
            .map(|zone| (zone, ZoneState::default()))
            .collect();
        debug!(
            "[{}] composed {} of {} declared capabilities",
            serial,
            surface.len(),
            self.profile.capabilities.len()
        );

        Ok(Arc::new_cyclic(|weak: &Weak<Device>| {
            let synchronizer: Arc<dyn EffectListener> =
                Arc::new(EffectSynchronizer::new(weak.clone()));
            Device {
                serial,
                suspend: suspend::strategy_for(&self.profile.suspend),
                profile: self.profile,
                endpoint: self.endpoint,
                write_lock: Mutex::new(()),
                frame_gate: Mutex::new(0),
                surface,
                zones: Mutex::new(zones),
                notifications_suppressed: AtomicBool::new(false),
                listeners: RwLock::new(vec![synchronizer]),
                directory: RwLock::new(Weak::new()),
                key_presses: KeyPressStore::new(self.key_press_window),
                persistence,
                effects: Mutex::new(Vec::new()),
            }
        }))
    }
}

/// Reads `device_serial`, retrying a few times before falling back to a
/// generated `UNKWN` serial.
fn read_serial(endpoint: &dyn HardwareEndpoint) -> String {
    for attempt in 1..=SERIAL_ATTEMPTS {
        match endpoint.read_text(SERIAL_ATTRIBUTE) {
            Ok(serial) if !serial.is_empty() => return serial.replace(' ', "_"),
            Ok(_) => debug!("Empty serial from {} (attempt {attempt})", endpoint.describe()),
            Err(e) => debug!("Serial read from {} failed: {e} (attempt {attempt})", endpoint.describe()),
        }
        if attempt < SERIAL_ATTEMPTS {
            std::thread::sleep(SERIAL_RETRY_DELAY);
        }
    }
    let serial = format!("UNKWN{:012}", UNKNOWN_SERIALS.fetch_add(1, Ordering::SeqCst) + 1);
    warn!("Could not read serial from {}, using {}", endpoint.describe(), serial);
    serial
}

#[cfg(test)]
pub mod testing {
    //! Device fixtures shared by unit tests.

    use super::*;
    use crate::hardware::testing::MemoryEndpoint;
    use crate::persistence::testing::RecordingPersistence;

    pub const TEST_PROFILE: DeviceProfile = DeviceProfile {
        name: "Test Device",
        kind: DeviceKind::Keyboard,
        vid: 0x1532,
        pid: 0xFFFF,
        has_matrix: true,
        matrix: Some(MatrixDims { rows: 2, cols: 3 }),
        capabilities: &[],
        excluded_cells: &[],
        cell_remaps: &[],
        suspend: profiles::SuspendStrategy::Unsupported,
    };

    pub fn registry() -> Arc<CapabilityRegistry> {
        Arc::new(CapabilityRegistry::with_catalog().unwrap())
    }

    pub fn device_with_profile(
        serial: &str,
        profile: DeviceProfile,
    ) -> (Arc<Device>, Arc<MemoryEndpoint>) {
        let endpoint = Arc::new(MemoryEndpoint::new());
        let device = Device::builder(profile, endpoint.clone())
            .registry(registry())
            .serial(serial)
            .build()
            .unwrap();
        (device, endpoint)
    }

    pub fn test_device(
        serial: &str,
        capabilities: &'static [&'static str],
    ) -> (Arc<Device>, Arc<MemoryEndpoint>) {
        device_with_profile(
            serial,
            DeviceProfile {
                capabilities,
                ..TEST_PROFILE
            },
        )
    }

    pub fn chroma_keyboard(serial: &str) -> (Arc<Device>, Arc<MemoryEndpoint>) {
        device_with_profile(serial, profiles::BLACKWIDOW_CHROMA)
    }

    pub fn recorded_device(
        serial: &str,
        profile: DeviceProfile,
    ) -> (Arc<Device>, Arc<MemoryEndpoint>, Arc<RecordingPersistence>) {
        let endpoint = Arc::new(MemoryEndpoint::new());
        let persistence = Arc::new(RecordingPersistence::default());
        let device = Device::builder(profile, endpoint.clone())
            .registry(registry())
            .persistence(persistence.clone())
            .serial(serial)
            .build()
            .unwrap();
        (device, endpoint, persistence)
    }
}
