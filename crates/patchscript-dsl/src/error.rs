//! Error types for the factory layer and execution context.

use thiserror::Error;

use crate::channels::ChannelCountError;
use patchscript_graph::GraphError;

/// Errors surfaced to the embedding interpreter during script execution.
#[derive(Debug, Error)]
pub enum DslError {
    /// A graph construction or finalization error.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A dotted schema name uses a path segment that is already a leaf
    /// module (e.g. `"fx.delay"` when `"fx"` is itself a module).
    #[error("name '{path}' is already a module")]
    ModuleNameCollision {
        /// The colliding path segment.
        path: String,
    },

    /// A schema name is already taken by a namespace prefix (e.g. `"fx"`
    /// when `"fx.delay"` exists).
    #[error("name '{path}' is already a namespace")]
    NamespaceCollision {
        /// The colliding path segment.
        path: String,
    },

    /// The external channel-count derivation failed; fatal for the
    /// compilation.
    #[error(transparent)]
    ChannelCount(#[from] ChannelCountError),

    /// A pitch helper was handed a note name it cannot parse.
    #[error("invalid note name '{name}'")]
    InvalidNoteName {
        /// The unparseable input.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_errors_pass_through_transparently() {
        let err: DslError = GraphError::DuplicateModuleId { id: "x".into() }.into();
        assert_eq!(err.to_string(), "duplicate module id 'x'");
    }

    #[test]
    fn collision_displays() {
        let err = DslError::ModuleNameCollision { path: "fx".into() };
        assert_eq!(err.to_string(), "name 'fx' is already a module");
        let err = DslError::NamespaceCollision { path: "fx".into() };
        assert_eq!(err.to_string(), "name 'fx' is already a namespace");
    }
}
