//! Parameter value trees and signal serialization.
//!
//! Three layers, in order of appearance during a compilation:
//!
//! - [`ParamValue`] — builder-time values. May contain structural
//!   references to module outputs and deferred outputs.
//! - [`SignalValue`] — the serialized form of one signal: a cable
//!   reference, the disconnected sentinel, or a bare voltage.
//! - [`PatchValue`] — finalized values with every reference resolved,
//!   serialized into the patch graph.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::deferred::DeferredId;

/// Locator for one module output: module ID, port name, and an optional
/// channel index into a polyphonic port.
///
/// Purely a reference — never an owner of the module. The `Display` form
/// (`module/port`, or `module/port:channel`) is the string-interpolation
/// form the finalizer substitutes into pattern strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputRef {
    /// Owning module's ID.
    pub module: String,
    /// Output port name.
    pub port: String,
    /// Channel index for channel-addressed polyphonic outputs.
    pub channel: Option<u16>,
}

impl OutputRef {
    /// Creates a whole-port reference (no channel index).
    pub fn new(module: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            port: port.into(),
            channel: None,
        }
    }

    /// Creates a channel-indexed reference into a polyphonic port.
    pub fn channel(module: impl Into<String>, port: impl Into<String>, channel: u16) -> Self {
        Self {
            module: module.into(),
            port: port.into(),
            channel: Some(channel),
        }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Some(ch) => write!(f, "{}/{}:{ch}", self.module, self.port),
            None => write!(f, "{}/{}", self.module, self.port),
        }
    }
}

/// Source position of a DSL call, captured best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

/// Side-table entry mapping a module back to the DSL call that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
    /// Whether the module's ID was user-chosen.
    pub id_is_explicit: bool,
}

/// Serialized form of one signal-typed value.
///
/// Serializes as `{"type":"cable","module":..,"port":..,"channel"?:..}`,
/// `{"type":"disconnected"}`, or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SignalRepr", into = "SignalRepr")]
pub enum SignalValue {
    /// A connection from another module's output.
    Cable(OutputRef),
    /// Explicit no-connection sentinel.
    Disconnected,
    /// A literal voltage.
    Volts(f64),
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(untagged)]
enum SignalRepr {
    Volts(f64),
    Tagged(TaggedSignal),
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedSignal {
    Cable {
        module: String,
        port: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<u16>,
    },
    Disconnected,
}

impl From<SignalRepr> for SignalValue {
    fn from(repr: SignalRepr) -> Self {
        match repr {
            SignalRepr::Volts(v) => SignalValue::Volts(v),
            SignalRepr::Tagged(TaggedSignal::Cable {
                module,
                port,
                channel,
            }) => SignalValue::Cable(OutputRef {
                module,
                port,
                channel,
            }),
            SignalRepr::Tagged(TaggedSignal::Disconnected) => SignalValue::Disconnected,
        }
    }
}

impl From<SignalValue> for SignalRepr {
    fn from(value: SignalValue) -> Self {
        match value {
            SignalValue::Volts(v) => SignalRepr::Volts(v),
            SignalValue::Cable(r) => SignalRepr::Tagged(TaggedSignal::Cable {
                module: r.module,
                port: r.port,
                channel: r.channel,
            }),
            SignalValue::Disconnected => SignalRepr::Tagged(TaggedSignal::Disconnected),
        }
    }
}

/// A builder-time parameter value.
///
/// Structural references ([`ParamValue::Output`], [`ParamValue::Deferred`])
/// are resolved into [`SignalValue`]s at finalization; everything else
/// carries through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A literal number (voltage or plain numeric parameter).
    Number(f64),
    /// A boolean flag.
    Bool(bool),
    /// A string. May embed deferred-output placeholders that the finalizer
    /// substitutes.
    Text(String),
    /// Explicit no-connection sentinel.
    Disconnected,
    /// Structural reference to a module output.
    Output(OutputRef),
    /// Structural reference to a deferred output.
    Deferred(DeferredId),
    /// Ordered sequence; element order is channel order.
    List(Vec<ParamValue>),
    /// Nested string-keyed object.
    Map(BTreeMap<String, ParamValue>),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<OutputRef> for ParamValue {
    fn from(v: OutputRef) -> Self {
        ParamValue::Output(v)
    }
}

impl From<DeferredId> for ParamValue {
    fn from(v: DeferredId) -> Self {
        ParamValue::Deferred(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Argument seam for signal-typed combinator inputs: anything that can feed
/// a signal parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalArg {
    /// A literal voltage.
    Volts(f64),
    /// A module output.
    Output(OutputRef),
    /// A deferred output.
    Deferred(DeferredId),
}

impl From<f64> for SignalArg {
    fn from(v: f64) -> Self {
        SignalArg::Volts(v)
    }
}

impl From<OutputRef> for SignalArg {
    fn from(v: OutputRef) -> Self {
        SignalArg::Output(v)
    }
}

impl From<DeferredId> for SignalArg {
    fn from(v: DeferredId) -> Self {
        SignalArg::Deferred(v)
    }
}

impl From<SignalArg> for ParamValue {
    fn from(v: SignalArg) -> Self {
        match v {
            SignalArg::Volts(n) => ParamValue::Number(n),
            SignalArg::Output(r) => ParamValue::Output(r),
            SignalArg::Deferred(id) => ParamValue::Deferred(id),
        }
    }
}

/// A finalized parameter value with every reference resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchValue {
    /// A signal: bare number, cable, or disconnected.
    Signal(SignalValue),
    /// A boolean flag.
    Bool(bool),
    /// A string with all placeholder substitutions applied.
    Text(String),
    /// Ordered sequence.
    List(Vec<PatchValue>),
    /// Nested object.
    Map(BTreeMap<String, PatchValue>),
}

impl PatchValue {
    /// Convenience constructor for a bare-number signal.
    pub fn volts(v: f64) -> Self {
        PatchValue::Signal(SignalValue::Volts(v))
    }

    /// Convenience constructor for a cable reference.
    pub fn cable(target: OutputRef) -> Self {
        PatchValue::Signal(SignalValue::Cable(target))
    }

    /// Convenience constructor for the disconnected sentinel.
    pub fn disconnected() -> Self {
        PatchValue::Signal(SignalValue::Disconnected)
    }
}
