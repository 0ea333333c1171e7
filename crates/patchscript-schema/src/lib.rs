//! Patchscript Schema - module schema normalization for the patch compiler
//!
//! Module schemas arrive from the host as JSON-Schema-like descriptors: a
//! module name, ordered positional-argument names, a structural parameter
//! schema, and a list of output ports. This crate turns each raw schema into
//! a [`ProcessedModuleSchema`] whose parameters carry a typed
//! [`ParamKind`] classification the graph builder and factory layer key off.
//!
//! # Pipeline
//!
//! 1. Dereference local `$ref` pointers (cycle-guarded; unresolvable refs
//!    pass through unchanged).
//! 2. Merge `allOf` branches into one schema.
//! 3. Classify every property by structural shape into signal /
//!    poly-signal / signal-array / number / text / boolean / unknown.
//!
//! Classification is purely structural — parameter names are never
//! consulted — and it never fails: shapes the classifier does not recognize
//! degrade to [`ParamKind::Unknown`] so schema evolution on the host side
//! cannot break compilation.

pub mod kind;
pub mod process;
pub mod schema;

pub use kind::{ParamKind, classify};
pub use process::{ParamDescriptor, ProcessedModuleSchema, ProcessedSchemaSet};
pub use schema::{ArgDescriptor, ModuleSchema, OutputDescriptor};
