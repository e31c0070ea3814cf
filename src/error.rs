//! Typed errors raised by the capability core.
//!
//! Daemon plumbing keeps using `anyhow`; everything a device method can fail
//! with is described here so callers can map it onto their transport.

use std::io;

use thiserror::Error;

/// Errors produced by capability lookup, invocation and effect workers.
#[derive(Debug, Error)]
pub enum RazerError {
    /// Reading or writing a driver attribute failed.
    #[error("hardware attribute '{attribute}' failed: {source}")]
    HardwareIo {
        attribute: String,
        #[source]
        source: io::Error,
    },

    /// A driver attribute held content that could not be interpreted.
    #[error("hardware attribute '{attribute}' is malformed: {detail}")]
    MalformedAttribute { attribute: String, detail: String },

    /// The method is not part of the device's composed surface.
    #[error("method {namespace}.{method} is not supported by this device")]
    CapabilityNotSupported { namespace: String, method: String },

    /// Arguments did not match the endpoint input schema.
    #[error("invalid arguments for {method}: expected ({expected}), got ({got})")]
    InvalidArguments {
        method: String,
        expected: String,
        got: String,
    },

    /// A fan-out message did not have the expected shape.
    #[error("malformed effect message: {0}")]
    MalformedMessage(String),

    /// An endpoint with the same identity is already registered.
    #[error("endpoint {namespace}.{method} is already registered")]
    DuplicateEndpoint { namespace: String, method: String },

    /// Registry lookup miss.
    #[error("endpoint {namespace}.{method} is not registered")]
    EndpointNotFound { namespace: String, method: String },

    /// A per-key colour file could not be read or parsed.
    #[error("effect config file '{path}' could not be loaded: {detail}")]
    EffectConfig { path: String, detail: String },

    /// An effect worker did not confirm termination in time.
    #[error("could not stop {effect} worker for device {serial}")]
    WorkerShutdownTimeout { effect: String, serial: String },

    /// The operation exists but cannot be carried out in the current state.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl RazerError {
    pub fn hardware(attribute: impl Into<String>, source: io::Error) -> Self {
        Self::HardwareIo {
            attribute: attribute.into(),
            source,
        }
    }

    pub fn not_supported(namespace: impl Into<String>, method: impl Into<String>) -> Self {
        Self::CapabilityNotSupported {
            namespace: namespace.into(),
            method: method.into(),
        }
    }
}

pub type RazerResult<T> = std::result::Result<T, RazerError>;
