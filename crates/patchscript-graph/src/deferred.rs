//! Deferred outputs: placeholders usable before their value is known.
//!
//! A deferred output lets a script reference a signal that has not been
//! produced yet — the mechanism behind feedback loops and forward
//! references. Each deferred output is a slot in an arena owned by the
//! builder; resolution happens once, at finalization, by iteratively
//! following the slot chain with a visited set so cyclic chains fail
//! instead of looping.

use std::collections::HashSet;
use std::fmt;

use crate::GraphBuilder;
use crate::error::GraphError;
use crate::value::OutputRef;

/// Stable index of a deferred-output slot.
///
/// The `Display` form (`DEFERRED-{n}`) is the placeholder text scripts can
/// embed in pattern strings; the finalizer substitutes it with the resolved
/// locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredId(pub(crate) usize);

impl fmt::Display for DeferredId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DEFERRED-{}", self.0)
    }
}

/// What a deferred output currently points at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeferredSlot {
    /// No target assigned yet.
    Unset,
    /// Chained to another deferred output.
    PointsTo(usize),
    /// Assigned a concrete output.
    Target(OutputRef),
}

/// Assignable target of a deferred output: a concrete output or another
/// deferred output (forming a resolution chain).
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredTarget {
    /// A concrete module output.
    Output(OutputRef),
    /// Another deferred output.
    Deferred(DeferredId),
}

impl From<OutputRef> for DeferredTarget {
    fn from(r: OutputRef) -> Self {
        DeferredTarget::Output(r)
    }
}

impl From<DeferredId> for DeferredTarget {
    fn from(id: DeferredId) -> Self {
        DeferredTarget::Deferred(id)
    }
}

/// Handle to one deferred-output slot.
///
/// Usable wherever a module output is expected — as a parameter value, a
/// scope target, or embedded in a pattern string via its placeholder form.
#[derive(Debug, Clone)]
pub struct DeferredOutput {
    graph: GraphBuilder,
    id: DeferredId,
}

impl DeferredOutput {
    pub(crate) fn new(graph: GraphBuilder, id: DeferredId) -> Self {
        Self { graph, id }
    }

    /// The slot's stable ID.
    pub fn id(&self) -> DeferredId {
        self.id
    }

    /// Assigns the real target this placeholder resolves to.
    ///
    /// Calling `set` again overwrites the previous target — last write
    /// wins, silently.
    pub fn set(&self, target: impl Into<DeferredTarget>) {
        self.graph.set_deferred(self.id, target.into());
    }

    /// The placeholder text scripts embed in pattern strings.
    pub fn placeholder(&self) -> String {
        self.id.to_string()
    }
}

impl fmt::Display for DeferredOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

/// Resolves slot `start` by iteratively following the chain.
///
/// Returns `None` when the chain ends in an unset slot. Fails with
/// [`GraphError::CircularReference`] when the chain revisits a slot.
pub(crate) fn resolve(
    slots: &[DeferredSlot],
    start: usize,
) -> Result<Option<OutputRef>, GraphError> {
    let mut visited = HashSet::new();
    let mut current = start;
    loop {
        if !visited.insert(current) {
            return Err(GraphError::CircularReference {
                placeholder: DeferredId(current).to_string(),
            });
        }
        match &slots[current] {
            DeferredSlot::Unset => return Ok(None),
            DeferredSlot::Target(target) => return Ok(Some(target.clone())),
            DeferredSlot::PointsTo(next) => current = *next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- chain resolution ---

    #[test]
    fn unset_resolves_to_none() {
        let slots = vec![DeferredSlot::Unset];
        assert_eq!(resolve(&slots, 0).unwrap(), None);
    }

    #[test]
    fn direct_target_resolves() {
        let slots = vec![DeferredSlot::Target(OutputRef::new("osc-1", "sine"))];
        assert_eq!(
            resolve(&slots, 0).unwrap(),
            Some(OutputRef::new("osc-1", "sine"))
        );
    }

    #[test]
    fn chain_resolves_through_intermediates() {
        let slots = vec![
            DeferredSlot::PointsTo(1),
            DeferredSlot::PointsTo(2),
            DeferredSlot::Target(OutputRef::new("lfo-1", "out")),
        ];
        assert_eq!(
            resolve(&slots, 0).unwrap(),
            Some(OutputRef::new("lfo-1", "out"))
        );
    }

    #[test]
    fn chain_ending_unset_resolves_to_none() {
        let slots = vec![DeferredSlot::PointsTo(1), DeferredSlot::Unset];
        assert_eq!(resolve(&slots, 0).unwrap(), None);
    }

    #[test]
    fn self_cycle_fails() {
        let slots = vec![DeferredSlot::PointsTo(0)];
        assert!(matches!(
            resolve(&slots, 0),
            Err(GraphError::CircularReference { .. })
        ));
    }

    #[test]
    fn mutual_cycle_fails() {
        let slots = vec![DeferredSlot::PointsTo(1), DeferredSlot::PointsTo(0)];
        let err = resolve(&slots, 0).unwrap_err();
        assert!(matches!(err, GraphError::CircularReference { .. }));
    }

    // --- placeholder form ---

    #[test]
    fn placeholder_form() {
        assert_eq!(DeferredId(7).to_string(), "DEFERRED-7");
    }
}
