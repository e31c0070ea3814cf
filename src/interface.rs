//! D-Bus objects exported by the daemon.
//!
//! The daemon object lists devices and controls effect sync. Each device is
//! exported as its own object whose `Invoke` method reaches any endpoint of
//! the device's composed surface.

use std::sync::Arc;

use event_listener::Event;
use zbus::{fdo, interface, object_server::SignalEmitter};
use zvariant::{OwnedValue, Value as DBusValue};

use crate::{
    capability::{Value, ValueKind},
    device::Device,
    directory::DeviceDirectory,
    error::RazerError,
};

pub const SERVICE_NAME: &str = "io.github.razerd";
pub const DAEMON_PATH: &str = "/io/github/razerd";

/// Object path of a device. Characters D-Bus does not allow become `_`.
pub fn device_path(serial: &str) -> String {
    let element: String = serial
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let element = if element.is_empty() { "_".to_string() } else { element };
    format!("{DAEMON_PATH}/device/{element}")
}

pub struct DaemonInterface {
    pub directory: Arc<DeviceDirectory>,
    pub stop: Arc<Event>,
    pub version: String,
}

#[interface(name = "io.github.razerd.Daemon1")]
impl DaemonInterface {
    #[zbus(signal)]
    async fn stopped(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

    async fn stop(&self, #[zbus(signal_emitter)] emitter: SignalEmitter<'_>) -> fdo::Result<()> {
        emitter.stopped().await?;
        self.stop.notify(1);
        Ok(())
    }

    /// Serials of the registered devices.
    async fn devices(&self) -> Vec<String> {
        self.directory.serials()
    }

    #[zbus(property)]
    async fn version(&self) -> String {
        self.version.clone()
    }

    #[zbus(property)]
    async fn sync_effects(&self) -> bool {
        self.directory.sync_effects()
    }

    #[zbus(property)]
    async fn set_sync_effects(&self, enabled: bool) {
        self.directory.set_sync_effects(enabled);
    }
}

pub struct DeviceInterface {
    pub device: Arc<Device>,
}

#[interface(name = "io.github.razerd.Device1")]
impl DeviceInterface {
    /// Every bound endpoint as `namespace.method(signature)`.
    async fn methods(&self) -> Vec<String> {
        self.device
            .surface()
            .endpoints()
            .iter()
            .map(|endpoint| endpoint.describe())
            .collect()
    }

    /// Calls a surface endpoint. The reply is empty for methods without a
    /// result and holds one value otherwise.
    async fn invoke(
        &self,
        namespace: String,
        method: String,
        args: Vec<OwnedValue>,
    ) -> fdo::Result<Vec<OwnedValue>> {
        let endpoint = self
            .device
            .surface()
            .get(&namespace, &method)
            .ok_or_else(|| to_fdo(RazerError::not_supported(&namespace, &method)))?;
        let args = from_dbus_args(&args, endpoint.input)?;

        let device = self.device.clone();
        let result = tokio::task::spawn_blocking(move || device.invoke(&namespace, &method, &args))
            .await
            .map_err(|e| fdo::Error::Failed(format!("handler task failed: {e}")))?
            .map_err(to_fdo)?;
        to_dbus_reply(result)
    }

    /// Feeds a key press to the animated key effects.
    async fn key_press(&self, row: u8, col: u8) -> bool {
        self.device.record_key_press(row, col)
    }

    #[zbus(property)]
    async fn serial(&self) -> String {
        self.device.serial().to_string()
    }

    #[zbus(property)]
    async fn name(&self) -> String {
        self.device.profile().name.to_string()
    }
}

pub fn to_fdo(error: RazerError) -> fdo::Error {
    match error {
        RazerError::CapabilityNotSupported { .. } | RazerError::EndpointNotFound { .. } => {
            fdo::Error::UnknownMethod(error.to_string())
        }
        RazerError::InvalidArguments { .. } => fdo::Error::InvalidArgs(error.to_string()),
        other => fdo::Error::Failed(other.to_string()),
    }
}

fn integer(value: &DBusValue<'_>) -> Option<i64> {
    match value {
        DBusValue::U8(v) => Some(i64::from(*v)),
        DBusValue::I16(v) => Some(i64::from(*v)),
        DBusValue::U16(v) => Some(i64::from(*v)),
        DBusValue::I32(v) => Some(i64::from(*v)),
        DBusValue::U32(v) => Some(i64::from(*v)),
        DBusValue::I64(v) => Some(*v),
        DBusValue::U64(v) => i64::try_from(*v).ok(),
        _ => None,
    }
}

/// Converts one D-Bus value into `kind`, widening or narrowing numbers
/// when they fit. Clients rarely send the exact integer width.
fn coerce(value: &DBusValue<'_>, kind: &ValueKind) -> Option<Value> {
    if let DBusValue::Value(inner) = value {
        return coerce(inner, kind);
    }
    match kind {
        ValueKind::Unit => None,
        ValueKind::Bool => match value {
            DBusValue::Bool(v) => Some(Value::Bool(*v)),
            _ => None,
        },
        ValueKind::U8 => integer(value).and_then(|v| u8::try_from(v).ok()).map(Value::U8),
        ValueKind::U16 => integer(value).and_then(|v| u16::try_from(v).ok()).map(Value::U16),
        ValueKind::U32 => integer(value).and_then(|v| u32::try_from(v).ok()).map(Value::U32),
        ValueKind::I32 => integer(value).and_then(|v| i32::try_from(v).ok()).map(Value::I32),
        ValueKind::F64 => match value {
            DBusValue::F64(v) => Some(Value::F64(*v)),
            other => integer(other).map(|v| Value::F64(v as f64)),
        },
        ValueKind::Str => match value {
            DBusValue::Str(s) => Some(Value::Str(s.to_string())),
            _ => None,
        },
        ValueKind::Bytes => match value {
            DBusValue::Array(items) => items
                .inner()
                .iter()
                .map(|item| integer(item).and_then(|v| u8::try_from(v).ok()))
                .collect::<Option<Vec<u8>>>()
                .map(Value::Bytes),
            _ => None,
        },
        ValueKind::Array(inner) => match value {
            DBusValue::Array(items) => items
                .inner()
                .iter()
                .map(|item| coerce(item, inner))
                .collect::<Option<Vec<Value>>>()
                .map(Value::Array),
            _ => None,
        },
    }
}

/// Converts an `av` argument list against an endpoint input schema.
pub fn from_dbus_args(args: &[OwnedValue], schema: &[ValueKind]) -> fdo::Result<Vec<Value>> {
    if args.len() != schema.len() {
        return Err(fdo::Error::InvalidArgs(format!(
            "expected {} argument(s), got {}",
            schema.len(),
            args.len()
        )));
    }
    args.iter()
        .zip(schema)
        .enumerate()
        .map(|(index, (arg, kind))| {
            coerce(arg, kind).ok_or_else(|| {
                fdo::Error::InvalidArgs(format!(
                    "argument {index} cannot be read as '{}'",
                    kind.signature()
                ))
            })
        })
        .collect()
}

fn homogeneous<T>(items: &[Value], pick: impl Fn(&Value) -> Option<T>) -> Option<Vec<T>> {
    items.iter().map(pick).collect()
}

fn to_dbus_value(value: Value) -> fdo::Result<DBusValue<'static>> {
    let converted = match value {
        Value::Unit => {
            return Err(fdo::Error::Failed("no value to marshal".to_string()));
        }
        Value::Bool(v) => DBusValue::from(v),
        Value::U8(v) => DBusValue::from(v),
        Value::U16(v) => DBusValue::from(v),
        Value::U32(v) => DBusValue::from(v),
        Value::I32(v) => DBusValue::from(v),
        Value::F64(v) => DBusValue::from(v),
        Value::Str(v) => DBusValue::from(v),
        Value::Bytes(v) => DBusValue::from(v),
        Value::Array(items) => {
            let pick_i32 = |v: &Value| match v {
                Value::I32(i) => Some(*i),
                _ => None,
            };
            let pick_str = |v: &Value| match v {
                Value::Str(s) => Some(s.clone()),
                _ => None,
            };
            if let Some(ints) = homogeneous(&items, pick_i32) {
                DBusValue::from(ints)
            } else if let Some(strings) = homogeneous(&items, pick_str) {
                DBusValue::from(strings)
            } else {
                return Err(fdo::Error::Failed(
                    "mixed arrays cannot be marshalled".to_string(),
                ));
            }
        }
    };
    Ok(converted)
}

/// Wraps a handler result for the `av` reply of `Invoke`.
pub fn to_dbus_reply(value: Value) -> fdo::Result<Vec<OwnedValue>> {
    if value == Value::Unit {
        return Ok(Vec::new());
    }
    let owned = OwnedValue::try_from(to_dbus_value(value)?)
        .map_err(|e| fdo::Error::Failed(format!("cannot marshal reply: {e}")))?;
    Ok(vec![owned])
}
