//! Patchscript Graph - patch graph construction for the DSL compiler
//!
//! This crate is the mutable core of one compilation: a [`GraphBuilder`]
//! accumulates module instances, parameter assignments, output-routing
//! groups, scope subscriptions, and deferred outputs while a script runs,
//! then [`GraphBuilder::to_patch`] resolves everything into a serializable
//! [`Patch`] consumable by the external audio engine.
//!
//! # Core Abstractions
//!
//! - [`GraphBuilder`] - the per-compilation state machine
//! - [`ModuleNode`] - handle to one module instance
//! - [`ModuleOutput`] / [`ModuleOutputWithRange`] - chainable output handles
//! - [`Collection`] / [`CollectionWithRange`] - homogeneous output groups
//!   broadcasting combinators through one shared node
//! - [`DeferredOutput`] - placeholders enabling feedback and forward
//!   references, resolved at finalization
//! - [`UtilityRegistry`] - the closed map of utility module kinds
//!   combinators materialize
//! - [`Patch`] - the finalized, serializable graph
//!
//! # Invariants
//!
//! - Module IDs are unique within a compilation; generated IDs take the
//!   form `"{type}-{n}"` with strictly increasing per-type suffixes.
//! - Every signal transform is a graph node; nothing is folded at compile
//!   time.
//! - Modules serialize in insertion order.
//! - One builder per compilation, single-threaded; a schema set may be
//!   shared across compilations, a builder may not.

pub mod builder;
pub mod config;
pub mod deferred;
pub mod error;
pub mod finalize;
pub mod output;
pub mod patch;
pub mod scope;
pub mod utility;
pub mod value;

pub use builder::{
    GraphBuilder, MAX_MONO_CHANNEL, MAX_STEREO_BASE_CHANNEL, ModuleNode, ROOT_CLOCK_ID,
    ROOT_OUT_ID, StereoOutOptions,
};
pub use config::CompilationConfig;
pub use deferred::{DeferredId, DeferredOutput, DeferredTarget};
pub use error::GraphError;
pub use output::{
    Collection, CollectionWithRange, DEFAULT_PIPE_MIX, ModuleOutput, ModuleOutputWithRange,
};
pub use patch::{Patch, PatchModule, PatchScope, ScopeItem};
pub use scope::{
    DEFAULT_MS_PER_FRAME, DEFAULT_SCOPE_RANGE, ScopeConfig, ScopeTarget, TriggerMode,
};
pub use utility::{UtilityKind, UtilityRegistry};
pub use value::{
    ModuleLocation, OutputRef, ParamValue, PatchValue, SignalArg, SignalValue, SourceLocation,
};
