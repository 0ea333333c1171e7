//! Patchscript DSL - the scripting surface of the patch compiler
//!
//! Scripts declare oscillators, filters, envelopes, and routing by calling
//! factory functions and chaining combinators on the returned outputs. This
//! crate supplies those bindings: per-schema [`Factory`] callables arranged
//! in a dotted-name [`Namespace`] tree, the global helpers (pitch
//! conversion, tempo, collections, deferred outputs), and the
//! [`PatchContext`] that wires one schema set to one fresh graph builder
//! per script run.
//!
//! The script language itself is external — any general-purpose interpreter
//! that can marshal [`DslValue`]s and call [`Factory::call`] works. This
//! crate never parses script text.
//!
//! # Example
//!
//! ```rust,ignore
//! let context = PatchContext::new(schemas, utilities, NoChannelCount)?;
//!
//! // What a script line like `osc(pitch("A3")).gain(0.5).out(0)` binds to:
//! let osc = context.call("osc", &[context.pitch("A3")?.into()], &CallSite::at(1, 1))?;
//! if let Some(OutputValue::Ranged(output)) = osc.base() {
//!     output.gain(0.5)?.out(0, StereoOutOptions::default())?;
//! }
//!
//! let patch = context.to_patch()?;
//! ```

pub mod channels;
pub mod context;
pub mod error;
pub mod factory;
pub mod namespace;
pub mod pitch;
pub mod value;

pub use channels::{ChannelCount, ChannelCountError, NoChannelCount};
pub use context::{PatchContext, ROOT_CLOCK_TYPE};
pub use error::DslError;
pub use factory::{
    ARG_SPANS_KEY, Factory, FactoryOutput, OutputValue, RESERVED_OUTPUT_NAMES, sanitize_port_name,
};
pub use namespace::{Namespace, NamespaceEntry};
pub use pitch::note_volts;
pub use value::{ArgSpan, CallSite, DslValue};
