//! The external channel-count derivation seam.
//!
//! How many parallel voices a module instance should produce is not decided
//! here — an external capability (typically cache-backed in the host)
//! derives it from the module's schema name and a snapshot of its current
//! parameters. This crate only requires the capability to be synchronous
//! and idempotent for identical inputs.

use thiserror::Error;

/// Failure of the external channel-count derivation. Propagates as fatal.
#[derive(Debug, Error)]
#[error("channel count derivation failed for '{schema}': {message}")]
pub struct ChannelCountError {
    /// Schema name the derivation was invoked for.
    pub schema: String,
    /// Host-supplied failure description.
    pub message: String,
}

/// External capability deriving a module's polyphonic channel count.
///
/// Invoked once per instantiation of a module with a polyphonic output.
/// `params` is the module's current parameter snapshot in serialized form.
/// Returning `Ok(None)` means the count cannot be derived; the module's
/// polyphonic outputs then stay un-shaped (whole-port references).
pub trait ChannelCount {
    /// Derives the channel count for one module instantiation.
    fn derive(
        &self,
        schema_name: &str,
        params: &serde_json::Value,
    ) -> Result<Option<u32>, ChannelCountError>;
}

/// Derivation stub for hosts without polyphony support: always `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChannelCount;

impl ChannelCount for NoChannelCount {
    fn derive(
        &self,
        _schema_name: &str,
        _params: &serde_json::Value,
    ) -> Result<Option<u32>, ChannelCountError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_never_derives() {
        let result = NoChannelCount
            .derive("osc", &serde_json::Value::Null)
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn error_display_names_the_schema() {
        let err = ChannelCountError {
            schema: "osc".into(),
            message: "cache miss".into(),
        };
        assert_eq!(
            err.to_string(),
            "channel count derivation failed for 'osc': cache miss"
        );
    }
}
