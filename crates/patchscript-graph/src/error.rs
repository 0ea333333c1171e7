//! Error types for graph construction and finalization.

use thiserror::Error;

/// Errors that can occur while building or finalizing a patch graph.
///
/// Every variant is fail-fast and aborts the compilation; there is no
/// partial-success graph. The embedding interpreter is expected to catch
/// these and re-surface them to the user, optionally enriched with the
/// builder's source-location map.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A factory or `add_module` call named a type absent from the schema set.
    #[error("unknown module type '{module_type}'")]
    UnknownModuleType {
        /// The unrecognized type name.
        module_type: String,
    },

    /// An explicitly chosen module ID is already registered.
    #[error("duplicate module id '{id}'")]
    DuplicateModuleId {
        /// The colliding ID.
        id: String,
    },

    /// A parameter write targeted a nonexistent module.
    ///
    /// Unreachable through the factory layer's controlled call sites;
    /// treated as a programming-error guard.
    #[error("module '{id}' not found")]
    ModuleNotFound {
        /// The missing ID.
        id: String,
    },

    /// An output-group channel argument was outside its valid range.
    #[error("output channel {channel} out of range (0-{max})")]
    InvalidChannel {
        /// The requested base channel.
        channel: u16,
        /// The highest valid base channel for the group kind.
        max: u16,
    },

    /// A deferred-output resolution chain revisited itself.
    #[error("circular reference while resolving '{placeholder}'")]
    CircularReference {
        /// Placeholder form of the deferred output that closed the cycle.
        placeholder: String,
    },

    /// A string-embedded deferred reference was never resolved by
    /// finalization time.
    #[error("deferred output '{placeholder}' was never set")]
    UnsetDeferredOutput {
        /// The unresolved placeholder text.
        placeholder: String,
    },

    /// A required utility factory was not registered before finalization.
    ///
    /// Internal setup invariant, not a user-facing error.
    #[error("utility factory '{utility}' is not registered")]
    MissingUtilityFactory {
        /// Name of the missing utility kind.
        utility: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Display formatting ---

    #[test]
    fn unknown_module_type_display() {
        let err = GraphError::UnknownModuleType {
            module_type: "osc.fake".into(),
        };
        assert_eq!(err.to_string(), "unknown module type 'osc.fake'");
    }

    #[test]
    fn invalid_channel_display() {
        let err = GraphError::InvalidChannel {
            channel: 15,
            max: 14,
        };
        assert_eq!(err.to_string(), "output channel 15 out of range (0-14)");
    }

    #[test]
    fn circular_reference_display() {
        let err = GraphError::CircularReference {
            placeholder: "DEFERRED-3".into(),
        };
        assert_eq!(
            err.to_string(),
            "circular reference while resolving 'DEFERRED-3'"
        );
    }
}
