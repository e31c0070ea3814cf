//! Live device registry and in-process fan-out of effect changes.
//!
//! When a device changes its lighting it hands an [`EffectMessage`] to the
//! [`DeviceDirectory`], which synchronously calls the listeners of every other
//! registered device in insertion order.

use std::{
    fmt,
    sync::{
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info, warn};

use crate::{
    capability::Value,
    device::Device,
    error::{RazerError, RazerResult},
};

/// An effect change announced by one device.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectMessage {
    origin: Arc<str>,
    effect: String,
    params: Vec<Value>,
}

impl EffectMessage {
    pub fn new(origin: impl Into<Arc<str>>, effect: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            origin: origin.into(),
            effect: effect.into(),
            params,
        }
    }

    /// Serial of the device that produced the message.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn effect(&self) -> &str {
        &self.effect
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Checks the message names a method-like effect.
    pub fn validate(&self) -> RazerResult<()> {
        if self.effect.is_empty() {
            return Err(RazerError::MalformedMessage(format!(
                "empty effect name from {}",
                self.origin
            )));
        }
        if !self.effect.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RazerError::MalformedMessage(format!(
                "effect name {:?} from {} is not a method name",
                self.effect, self.origin
            )));
        }
        Ok(())
    }
}

impl fmt::Display for EffectMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        write!(f, "{}({}) from {}", self.effect, params.join(", "), self.origin)
    }
}

/// Receiver of fan-out messages attached to a device.
pub trait EffectListener: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    fn on_message(&self, message: &EffectMessage) -> RazerResult<()>;
}

/// Ordered collection of live devices.
///
/// Created once at startup and passed to whoever needs to enumerate or notify
/// devices.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use razerd::directory::DeviceDirectory;
///
/// let directory = Arc::new(DeviceDirectory::new(true));
/// assert!(directory.is_empty());
/// ```
pub struct DeviceDirectory {
    devices: RwLock<Vec<Arc<Device>>>,
    sync_effects: AtomicBool,
}

impl DeviceDirectory {
    pub fn new(sync_effects: bool) -> Self {
        Self {
            devices: RwLock::new(Vec::new()),
            sync_effects: AtomicBool::new(sync_effects),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Device>>> {
        self.devices.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Device>>> {
        self.devices.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a device and points it back at this directory. A device
    /// whose serial is already present is not added twice.
    pub fn add(self: &Arc<Self>, device: Arc<Device>) -> bool {
        let mut devices = self.write();
        if devices.iter().any(|d| d.serial() == device.serial()) {
            warn!("Device {} is already registered", device.serial());
            return false;
        }
        device.attach_directory(Arc::downgrade(self));
        info!("Registered {} ({})", device.serial(), device.profile().name);
        devices.push(device);
        true
    }

    /// Removes a device by serial and detaches it from the directory.
    pub fn remove(&self, serial: &str) -> Option<Arc<Device>> {
        let mut devices = self.write();
        let index = devices.iter().position(|d| d.serial() == serial)?;
        let device = devices.remove(index);
        device.detach_directory();
        info!("Unregistered {}", serial);
        Some(device)
    }

    pub fn get(&self, serial: &str) -> Option<Arc<Device>> {
        self.read().iter().find(|d| d.serial() == serial).cloned()
    }

    pub fn serials(&self) -> Vec<String> {
        self.read().iter().map(|d| d.serial().to_string()).collect()
    }

    /// Snapshot of the registered devices in insertion order.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn sync_effects(&self) -> bool {
        self.sync_effects.load(Ordering::SeqCst)
    }

    pub fn set_sync_effects(&self, enabled: bool) {
        if self.sync_effects.swap(enabled, Ordering::SeqCst) != enabled {
            info!("Effect sync {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    /// Delivers `message` to the listeners of every device except `origin`.
    ///
    /// Returns once all listeners ran. The device list is snapshotted first so
    /// listeners may add or remove devices without deadlocking. Returns the
    /// number of devices the message was delivered to.
    pub fn notify(&self, origin: &Device, message: &EffectMessage) -> usize {
        let recipients: Vec<Arc<Device>> = self
            .read()
            .iter()
            .filter(|d| d.serial() != origin.serial())
            .cloned()
            .collect();
        debug!("Fan-out {} to {} device(s)", message, recipients.len());
        for device in &recipients {
            device.deliver(message);
        }
        recipients.len()
    }
}

impl Default for DeviceDirectory {
    fn default() -> Self {
        Self::new(true)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingListener;
    use super::*;
    use crate::device::testing::{chroma_keyboard, test_device};
    use pretty_assertions::assert_eq;

    #[test]
    fn add_preserves_order_and_rejects_duplicates() {
        let directory = Arc::new(DeviceDirectory::new(true));
        assert!(directory.add(test_device("AAA", &[]).0));
        assert!(directory.add(test_device("BBB", &[]).0));
        assert!(!directory.add(test_device("AAA", &[]).0));

        assert_eq!(directory.serials(), vec!["AAA", "BBB"]);
    }

    #[test]
    fn remove_detaches_device() {
        let directory = Arc::new(DeviceDirectory::new(true));
        let (device, _) = test_device("AAA", &[]);
        directory.add(device.clone());

        let removed = directory.remove("AAA").unwrap();
        assert_eq!(removed.serial(), "AAA");
        assert!(directory.is_empty());
        assert!(directory.remove("AAA").is_none());
        assert!(device.directory().is_none());
    }

    #[test]
    fn notify_skips_origin_and_keeps_insertion_order() {
        let directory = Arc::new(DeviceDirectory::new(true));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        struct OrderListener {
            serial: &'static str,
            order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        }
        impl EffectListener for OrderListener {
            fn name(&self) -> &'static str {
                "order"
            }
            fn on_message(&self, _message: &EffectMessage) -> RazerResult<()> {
                self.order.lock().unwrap().push(self.serial);
                Ok(())
            }
        }

        let serials = ["AAA", "BBB", "CCC", "DDD"];
        let mut devices = Vec::new();
        for serial in serials {
            let (device, _) = test_device(serial, &[]);
            device.add_listener(Arc::new(OrderListener {
                serial,
                order: order.clone(),
            }));
            directory.add(device.clone());
            devices.push(device);
        }

        let message = EffectMessage::new("BBB", "setSpectrum", vec![]);
        let delivered = directory.notify(&devices[1], &message);

        assert_eq!(delivered, 3);
        assert_eq!(*order.lock().unwrap(), vec!["AAA", "CCC", "DDD"]);
    }

    #[test]
    fn failing_listener_does_not_stop_delivery() {
        let directory = Arc::new(DeviceDirectory::new(true));
        let (origin, _) = test_device("ORIGIN", &[]);
        let (first, _) = test_device("FIRST", &[]);
        let (second, _) = test_device("SECOND", &[]);
        let failing = Arc::new(RecordingListener::failing());
        let recording = Arc::new(RecordingListener::default());
        first.add_listener(failing.clone());
        second.add_listener(recording.clone());
        for device in [&origin, &first, &second] {
            directory.add(device.clone());
        }

        directory.notify(&origin, &EffectMessage::new("ORIGIN", "setNone", vec![]));

        assert_eq!(failing.effects(), vec!["setNone"]);
        assert_eq!(recording.effects(), vec!["setNone"]);
    }

    #[test]
    fn origin_listeners_never_see_their_own_fan_out() {
        let directory = Arc::new(DeviceDirectory::new(true));
        let mut listeners = Vec::new();
        let mut devices = Vec::new();
        for serial in ["AAA", "BBB", "CCC"] {
            let (device, _) = test_device(serial, &[]);
            let listener = Arc::new(RecordingListener::default());
            device.add_listener(listener.clone());
            directory.add(device.clone());
            devices.push(device);
            listeners.push(listener);
        }

        for (index, origin) in devices.iter().enumerate() {
            let message = EffectMessage::new(origin.serial(), "setSpectrum", vec![]);
            directory.notify(origin, &message);
            let seen = listeners[index].seen.lock().unwrap();
            assert!(seen.iter().all(|m| m.origin() != origin.serial()));
        }
    }

    #[test]
    fn validate_rejects_bad_effect_names() {
        assert!(EffectMessage::new("A", "setStatic", vec![]).validate().is_ok());
        assert!(matches!(
            EffectMessage::new("A", "", vec![]).validate(),
            Err(RazerError::MalformedMessage(_))
        ));
        assert!(EffectMessage::new("A", "set Static", vec![]).validate().is_err());
    }

    #[test]
    fn handler_fan_out_reaches_sibling_listeners() {
        let directory = Arc::new(DeviceDirectory::new(true));
        let (origin, _) = chroma_keyboard("KBD");
        let (sibling, _) = test_device("SIB", &[]);
        let recording = Arc::new(RecordingListener::default());
        sibling.add_listener(recording.clone());
        directory.add(origin.clone());
        directory.add(sibling);

        origin.call("setSpectrum", &[]).unwrap();

        assert_eq!(recording.effects(), vec!["setSpectrum"]);
    }

    #[test]
    fn sync_switch_stops_fan_out() {
        let directory = Arc::new(DeviceDirectory::new(false));
        let (origin, _) = chroma_keyboard("KBD");
        let (sibling, _) = test_device("SIB", &[]);
        let recording = Arc::new(RecordingListener::default());
        sibling.add_listener(recording.clone());
        directory.add(origin.clone());
        directory.add(sibling);

        origin.call("setSpectrum", &[]).unwrap();
        assert!(recording.effects().is_empty());

        directory.set_sync_effects(true);
        origin.call("setSpectrum", &[]).unwrap();
        assert_eq!(recording.effects(), vec!["setSpectrum"]);
    }
}
