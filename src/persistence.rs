//! Fire-and-forget storage of user lighting settings.

use log::debug;
use serde_json::Value as JsonValue;

/// External key/value store for settings a device should come back with.
///
/// Writes never fail from the caller's point of view; a sink that cannot
/// store a value logs and drops it.
pub trait PersistenceSink: Send + Sync {
    fn set_persistence(&self, serial: &str, zone: Option<&str>, key: &str, value: JsonValue);
}

/// Sink that records settings in the daemon log.
#[derive(Debug, Default)]
pub struct LogPersistence;

impl PersistenceSink for LogPersistence {
    fn set_persistence(&self, serial: &str, zone: Option<&str>, key: &str, value: JsonValue) {
        debug!(
            "[{serial}] persist {}.{key} = {value}",
            zone.unwrap_or("device")
        );
    }
}

/// Sink used when persistence is switched off.
#[derive(Debug, Default)]
pub struct NullPersistence;

impl PersistenceSink for NullPersistence {
    fn set_persistence(&self, _serial: &str, _zone: Option<&str>, _key: &str, _value: JsonValue) {}
}
