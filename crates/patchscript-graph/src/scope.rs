//! Scope registrations: visualization subscriptions recorded alongside the
//! graph.
//!
//! Scopes are independent of the routing model — registering one never
//! creates graph nodes. A scope whose target is a deferred output that
//! never resolves is silently dropped at finalization.

use serde::{Deserialize, Serialize};

use crate::deferred::DeferredId;
use crate::value::OutputRef;

/// Default frame duration when the script does not specify one.
pub const DEFAULT_MS_PER_FRAME: f64 = 10.0;

/// Default display range for targets with no declared value range.
pub const DEFAULT_SCOPE_RANGE: (f64, f64) = (-1.0, 1.0);

/// How a scope renders around its trigger threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerMode {
    /// Hold the display until the threshold is crossed.
    #[default]
    Wait,
    /// Keep rolling regardless of the threshold.
    Roll,
}

/// Script-facing scope configuration. All fields optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScopeConfig {
    /// Frame duration in milliseconds. Defaults to [`DEFAULT_MS_PER_FRAME`].
    pub ms_per_frame: Option<f64>,
    /// Trigger threshold, when triggered rendering is wanted.
    pub trigger_threshold: Option<f64>,
    /// Render mode around the trigger. Only meaningful with a threshold.
    pub trigger_mode: TriggerMode,
    /// Display value range. Defaults to the target's declared range, else
    /// [`DEFAULT_SCOPE_RANGE`].
    pub range: Option<(f64, f64)>,
}

/// What a scope watches.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeTarget {
    /// A concrete module output.
    Output(OutputRef),
    /// A deferred output, resolved (or dropped) at finalization.
    Deferred(DeferredId),
}

impl From<OutputRef> for ScopeTarget {
    fn from(r: OutputRef) -> Self {
        ScopeTarget::Output(r)
    }
}

impl From<DeferredId> for ScopeTarget {
    fn from(id: DeferredId) -> Self {
        ScopeTarget::Deferred(id)
    }
}

/// A fully-resolved scope registration held by the builder.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScopeRegistration {
    pub target: ScopeTarget,
    pub ms_per_frame: f64,
    pub trigger: Option<(f64, TriggerMode)>,
    pub range: (f64, f64),
}

impl ScopeRegistration {
    /// Combines a script config with the target's declared range fallback.
    pub(crate) fn from_config(
        target: ScopeTarget,
        config: ScopeConfig,
        declared_range: Option<(f64, f64)>,
    ) -> Self {
        Self {
            target,
            ms_per_frame: config.ms_per_frame.unwrap_or(DEFAULT_MS_PER_FRAME),
            trigger: config
                .trigger_threshold
                .map(|threshold| (threshold, config.trigger_mode)),
            range: config
                .range
                .or(declared_range)
                .unwrap_or(DEFAULT_SCOPE_RANGE),
        }
    }
}
