//! Utility module kinds and their registration map.
//!
//! Signal transforms (gain, remap, mixing) are never computed at compile
//! time — every combinator materializes a graph node so the rendering
//! engine can see and process it. The node types used for those transforms
//! are ordinary schema-backed modules, registered here against a closed set
//! of [`UtilityKind`]s at builder-construction time. Lookup is typed and
//! fails fast when a required kind is absent.
//!
//! # Parameter contract
//!
//! The builder writes these parameter names on the registered module types:
//!
//! | kind | parameters |
//! |---|---|
//! | `Passthrough` | `input` |
//! | `Mix` | `inputs` |
//! | `StereoMixer` | `inputs`, `pan`, `width` |
//! | `ScaleAndShift` | `input`, `scale`, `shift` |
//! | `Remap` | `input`, `inMin`, `inMax`, `outMin`, `outMax` |
//! | `Clamp` | `input`, `min`, `max` |

use std::collections::HashMap;

use crate::error::GraphError;

/// The closed set of utility module roles the builder can materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UtilityKind {
    /// Signal passthrough; wraps the final mix as the root node.
    Passthrough,
    /// Polyphonic summing mixer.
    Mix,
    /// Stereo mixer with pan and width controls.
    StereoMixer,
    /// Linear `x * scale + shift` stage.
    ScaleAndShift,
    /// Linear range remap.
    Remap,
    /// Hard value clamp.
    Clamp,
}

impl UtilityKind {
    /// Stable name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            UtilityKind::Passthrough => "passthrough",
            UtilityKind::Mix => "mix",
            UtilityKind::StereoMixer => "stereo-mixer",
            UtilityKind::ScaleAndShift => "scale-and-shift",
            UtilityKind::Remap => "remap",
            UtilityKind::Clamp => "clamp",
        }
    }
}

/// Maps utility kinds to the schema-backed module types that implement them.
///
/// Built once when the builder is constructed; finalization requires
/// `Passthrough`, `Mix`, `StereoMixer`, and `ScaleAndShift` to be present.
#[derive(Debug, Clone, Default)]
pub struct UtilityRegistry {
    map: HashMap<UtilityKind, String>,
}

impl UtilityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the module type implementing `kind`. Re-registration
    /// replaces the previous type.
    pub fn register(&mut self, kind: UtilityKind, module_type: impl Into<String>) -> &mut Self {
        self.map.insert(kind, module_type.into());
        self
    }

    /// Looks up the module type for `kind`, if registered.
    pub fn get(&self, kind: UtilityKind) -> Option<&str> {
        self.map.get(&kind).map(String::as_str)
    }

    /// Typed lookup that fails fast when the kind is absent.
    pub(crate) fn require(&self, kind: UtilityKind) -> Result<&str, GraphError> {
        self.get(kind).ok_or(GraphError::MissingUtilityFactory {
            utility: kind.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_round_trips() {
        let mut registry = UtilityRegistry::new();
        registry.register(UtilityKind::Mix, "util.mix");
        assert_eq!(registry.get(UtilityKind::Mix), Some("util.mix"));
        assert_eq!(registry.get(UtilityKind::Clamp), None);
    }

    #[test]
    fn require_fails_fast_with_kind_name() {
        let registry = UtilityRegistry::new();
        let err = registry.require(UtilityKind::StereoMixer).unwrap_err();
        assert_eq!(
            err.to_string(),
            "utility factory 'stereo-mixer' is not registered"
        );
    }

    #[test]
    fn re_registration_replaces() {
        let mut registry = UtilityRegistry::new();
        registry
            .register(UtilityKind::Remap, "old")
            .register(UtilityKind::Remap, "new");
        assert_eq!(registry.get(UtilityKind::Remap), Some("new"));
    }
}
