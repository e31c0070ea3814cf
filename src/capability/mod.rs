//! Capability endpoints and the values they exchange.
//!
//! A capability endpoint is a `(namespace, method)` pair backed by a plain
//! function that receives the device it runs against. Endpoints live in the
//! [`CapabilityRegistry`]; each device composes its own [`Surface`] from the
//! capability ids its profile declares.

pub mod catalog;
pub mod registry;
pub mod surface;

use std::fmt;

use crate::{
    device::Device,
    error::{RazerError, RazerResult},
};

pub use registry::CapabilityRegistry;
pub use surface::Surface;

/// Value passed into or returned from an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    /// Only used by the wave direction argument.
    I32(i32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
}

/// Type of a [`Value`], used in endpoint schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Unit,
    Bool,
    U8,
    U16,
    U32,
    I32,
    F64,
    Str,
    Bytes,
    Array(&'static ValueKind),
}

impl ValueKind {
    /// D-Bus type signature of this kind.
    pub fn signature(&self) -> String {
        match self {
            Self::Unit => String::new(),
            Self::Bool => "b".to_string(),
            Self::U8 => "y".to_string(),
            Self::U16 => "q".to_string(),
            Self::U32 => "u".to_string(),
            Self::I32 => "i".to_string(),
            Self::F64 => "d".to_string(),
            Self::Str => "s".to_string(),
            Self::Bytes => "ay".to_string(),
            Self::Array(inner) => format!("a{}", inner.signature()),
        }
    }
}

/// Renders a schema as a concatenated D-Bus signature.
pub fn schema_signature(schema: &[ValueKind]) -> String {
    schema.iter().map(ValueKind::signature).collect()
}

impl Value {
    pub fn kind_matches(&self, kind: &ValueKind) -> bool {
        match (self, kind) {
            (Self::Unit, ValueKind::Unit)
            | (Self::Bool(_), ValueKind::Bool)
            | (Self::U8(_), ValueKind::U8)
            | (Self::U16(_), ValueKind::U16)
            | (Self::U32(_), ValueKind::U32)
            | (Self::I32(_), ValueKind::I32)
            | (Self::F64(_), ValueKind::F64)
            | (Self::Str(_), ValueKind::Str)
            | (Self::Bytes(_), ValueKind::Bytes) => true,
            (Self::Array(items), ValueKind::Array(inner)) => {
                items.iter().all(|item| item.kind_matches(inner))
            }
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::U8(v) => Some(f64::from(*v)),
            Self::U16(v) => Some(f64::from(*v)),
            Self::U32(v) => Some(f64::from(*v)),
            Self::I32(v) => Some(f64::from(*v)),
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Self::U8(v) => Some(*v),
            Self::U16(v) => u8::try_from(*v).ok(),
            Self::U32(v) => u8::try_from(*v).ok(),
            Self::I32(v) => u8::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "()"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Identity of an endpoint inside a surface or registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointKey {
    pub namespace: &'static str,
    pub method: &'static str,
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.method)
    }
}

/// Function backing an endpoint. Arguments are already checked against the
/// input schema when the handler runs.
pub type Handler = fn(&Device, &Args<'_>) -> RazerResult<Value>;

/// A cataloged method: identity, schema and handler.
pub struct CapabilityEndpoint {
    /// Capability id used in device profiles, e.g. `set_static_effect`.
    pub capability: &'static str,
    pub key: EndpointKey,
    pub input: &'static [ValueKind],
    pub output: ValueKind,
    /// Accepts bulk binary payloads such as per-key matrix frames.
    pub byte_arrays: bool,
    handler: Handler,
}

impl CapabilityEndpoint {
    pub const fn new(
        capability: &'static str,
        namespace: &'static str,
        method: &'static str,
        input: &'static [ValueKind],
        output: ValueKind,
        handler: Handler,
    ) -> Self {
        Self {
            capability,
            key: EndpointKey { namespace, method },
            input,
            output,
            byte_arrays: false,
            handler,
        }
    }

    pub const fn with_byte_arrays(mut self) -> Self {
        self.byte_arrays = true;
        self
    }

    pub fn namespace(&self) -> &'static str {
        self.key.namespace
    }

    pub fn method(&self) -> &'static str {
        self.key.method
    }

    pub fn arity(&self) -> usize {
        self.input.len()
    }

    /// Introspection line, e.g. `razer.device.lighting.chroma.setStatic(yyy)`.
    pub fn describe(&self) -> String {
        let output = self.output.signature();
        if output.is_empty() {
            format!("{}({})", self.key, schema_signature(self.input))
        } else {
            format!("{}({}) -> {}", self.key, schema_signature(self.input), output)
        }
    }

    /// Checks `args` against the input schema and runs the handler.
    pub fn call(&self, device: &Device, args: &[Value]) -> RazerResult<Value> {
        let valid = args.len() == self.input.len()
            && args
                .iter()
                .zip(self.input)
                .all(|(value, kind)| value.kind_matches(kind));
        if !valid {
            let got: Vec<String> = args.iter().map(ToString::to_string).collect();
            return Err(RazerError::InvalidArguments {
                method: self.key.to_string(),
                expected: schema_signature(self.input),
                got: got.join(", "),
            });
        }
        (self.handler)(
            device,
            &Args {
                method: self.key.method,
                values: args,
            },
        )
    }
}

impl fmt::Debug for CapabilityEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityEndpoint")
            .field("capability", &self.capability)
            .field("key", &self.key)
            .field("input", &schema_signature(self.input))
            .field("output", &self.output.signature())
            .field("byte_arrays", &self.byte_arrays)
            .finish()
    }
}

/// Typed accessors over validated handler arguments.
pub struct Args<'a> {
    method: &'static str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    fn mismatch(&self, index: usize, expected: &str) -> RazerError {
        RazerError::InvalidArguments {
            method: self.method.to_string(),
            expected: format!("{expected} at position {index}"),
            got: self
                .values
                .get(index)
                .map_or_else(|| "nothing".to_string(), ToString::to_string),
        }
    }

    pub fn u8(&self, index: usize) -> RazerResult<u8> {
        match self.values.get(index) {
            Some(Value::U8(v)) => Ok(*v),
            _ => Err(self.mismatch(index, "y")),
        }
    }

    pub fn i32(&self, index: usize) -> RazerResult<i32> {
        match self.values.get(index) {
            Some(Value::I32(v)) => Ok(*v),
            _ => Err(self.mismatch(index, "i")),
        }
    }

    pub fn f64(&self, index: usize) -> RazerResult<f64> {
        match self.values.get(index) {
            Some(Value::F64(v)) => Ok(*v),
            _ => Err(self.mismatch(index, "d")),
        }
    }

    pub fn bool(&self, index: usize) -> RazerResult<bool> {
        match self.values.get(index) {
            Some(Value::Bool(v)) => Ok(*v),
            _ => Err(self.mismatch(index, "b")),
        }
    }

    pub fn str(&self, index: usize) -> RazerResult<&'a str> {
        match self.values.get(index) {
            Some(Value::Str(v)) => Ok(v.as_str()),
            _ => Err(self.mismatch(index, "s")),
        }
    }

    pub fn bytes(&self, index: usize) -> RazerResult<&'a [u8]> {
        match self.values.get(index) {
            Some(Value::Bytes(v)) => Ok(v.as_slice()),
            _ => Err(self.mismatch(index, "ay")),
        }
    }

    /// Consecutive `y` arguments starting at `start`.
    pub fn rgb(&self, start: usize) -> RazerResult<[u8; 3]> {
        Ok([self.u8(start)?, self.u8(start + 1)?, self.u8(start + 2)?])
    }
}
