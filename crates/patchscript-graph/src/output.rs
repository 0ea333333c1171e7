//! Output handles and their chainable combinators.
//!
//! These are the value types DSL code holds: single outputs, range-aware
//! outputs, and homogeneous collections of outputs. Every combinator
//! materializes graph nodes through the builder's utility helpers — signal
//! transforms are never computed at compile time, so the rendering engine
//! sees and processes them.
//!
//! Collection combinators broadcast through ONE shared utility node with an
//! array-valued input, not one node per element.

use std::fmt;

use crate::GraphBuilder;
use crate::builder::StereoOutOptions;
use crate::error::GraphError;
use crate::scope::{ScopeConfig, ScopeTarget};
use crate::value::{OutputRef, ParamValue, SignalArg};

/// Default dry/wet position of [`ModuleOutput::pipe_mix`]'s mix control.
pub const DEFAULT_PIPE_MIX: f64 = 2.5;

/// A single-channel output handle: a locator plus combinator behavior.
///
/// Holds a non-owning back-reference to the builder, used only to call its
/// mutation methods.
#[derive(Clone)]
pub struct ModuleOutput {
    graph: GraphBuilder,
    target: OutputRef,
}

impl ModuleOutput {
    /// Wraps a locator in a combinator-capable handle.
    pub fn new(graph: GraphBuilder, target: OutputRef) -> Self {
        Self { graph, target }
    }

    /// The underlying locator.
    pub fn target(&self) -> &OutputRef {
        &self.target
    }

    /// The graph this output belongs to.
    pub fn graph(&self) -> &GraphBuilder {
        &self.graph
    }

    /// Scales the signal through one scale-and-shift node.
    pub fn gain(&self, factor: impl Into<SignalArg>) -> Result<ModuleOutput, GraphError> {
        self.graph
            .scale_and_shift(self.as_param(), factor, 0.0)
    }

    /// Offsets the signal through one scale-and-shift node.
    pub fn shift(&self, offset: impl Into<SignalArg>) -> Result<ModuleOutput, GraphError> {
        self.graph.scale_and_shift(self.as_param(), 1.0, offset)
    }

    /// Clamps the signal into `[min, max]` through one clamp node.
    pub fn clamp(
        &self,
        min: impl Into<SignalArg>,
        max: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        self.graph.clamp_stage(self.as_param(), min, max)
    }

    /// Remaps the signal from `[in_min, in_max]` to `[out_min, out_max]`.
    ///
    /// A plain output carries no range provenance, so the input bounds must
    /// be explicit; see [`ModuleOutputWithRange::range`] for the two-argument
    /// form.
    pub fn range(
        &self,
        in_min: impl Into<SignalArg>,
        in_max: impl Into<SignalArg>,
        out_min: impl Into<SignalArg>,
        out_max: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        self.graph
            .remap(self.as_param(), in_min, in_max, out_min, out_max)
    }

    /// Registers a scope on this output. Chainable; never creates nodes.
    pub fn scope(&self, config: ScopeConfig) -> &Self {
        self.graph
            .add_scope(ScopeTarget::Output(self.target.clone()), config, None);
        self
    }

    /// Routes this output to a stereo output group on `base_channel` (0–14).
    pub fn out(&self, base_channel: u16, options: StereoOutOptions) -> Result<&Self, GraphError> {
        self.graph
            .add_out(vec![self.as_param()], base_channel, options)?;
        Ok(self)
    }

    /// Routes this output to a mono output group on `channel` (0–15).
    pub fn out_mono(&self, channel: u16, gain: Option<SignalArg>) -> Result<&Self, GraphError> {
        self.graph.add_out_mono(vec![self.as_param()], channel, gain)?;
        Ok(self)
    }

    /// Pure functional application: returns `f(self)` with no graph side
    /// effect beyond what `f` itself performs.
    pub fn pipe<T>(&self, f: impl FnOnce(&Self) -> T) -> T {
        f(self)
    }

    /// Crossfades this signal with `f(self)`'s result.
    ///
    /// The mix control (0–5, [`DEFAULT_PIPE_MIX`] for an even blend) feeds a
    /// reciprocal remap and a complementary scale stage driving two gain
    /// stages, combined through one mix node — the dry/wet control lives
    /// entirely in the graph.
    pub fn pipe_mix(
        &self,
        f: impl FnOnce(&Self) -> Result<ModuleOutput, GraphError>,
        mix: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        let wet = f(self)?;
        crossfade(&self.graph, self.as_param(), wet.as_param(), mix.into())
    }

    pub(crate) fn as_param(&self) -> ParamValue {
        ParamValue::Output(self.target.clone())
    }
}

impl fmt::Display for ModuleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

impl fmt::Debug for ModuleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleOutput").field(&self.target).finish()
    }
}

impl From<&ModuleOutput> for SignalArg {
    fn from(output: &ModuleOutput) -> Self {
        SignalArg::Output(output.target.clone())
    }
}

impl From<&ModuleOutput> for ParamValue {
    fn from(output: &ModuleOutput) -> Self {
        output.as_param()
    }
}

/// An output carrying the declared value range copied from its schema at
/// construction time.
#[derive(Clone)]
pub struct ModuleOutputWithRange {
    output: ModuleOutput,
    min_value: f64,
    max_value: f64,
}

impl ModuleOutputWithRange {
    /// Wraps a locator with its declared range.
    pub fn new(graph: GraphBuilder, target: OutputRef, min_value: f64, max_value: f64) -> Self {
        Self {
            output: ModuleOutput::new(graph, target),
            min_value,
            max_value,
        }
    }

    /// The declared `(min, max)` range.
    pub fn bounds(&self) -> (f64, f64) {
        (self.min_value, self.max_value)
    }

    /// The range-less view of this output.
    pub fn output(&self) -> &ModuleOutput {
        &self.output
    }

    /// The underlying locator.
    pub fn target(&self) -> &OutputRef {
        self.output.target()
    }

    /// Remaps into `[out_min, out_max]`; the input range is the stored
    /// declared range — that provenance is the point of this type.
    pub fn range(
        &self,
        out_min: impl Into<SignalArg>,
        out_max: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        self.output
            .range(self.min_value, self.max_value, out_min, out_max)
    }

    /// See [`ModuleOutput::gain`].
    pub fn gain(&self, factor: impl Into<SignalArg>) -> Result<ModuleOutput, GraphError> {
        self.output.gain(factor)
    }

    /// See [`ModuleOutput::shift`].
    pub fn shift(&self, offset: impl Into<SignalArg>) -> Result<ModuleOutput, GraphError> {
        self.output.shift(offset)
    }

    /// See [`ModuleOutput::clamp`].
    pub fn clamp(
        &self,
        min: impl Into<SignalArg>,
        max: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        self.output.clamp(min, max)
    }

    /// Registers a scope; the display range defaults to the declared range.
    pub fn scope(&self, config: ScopeConfig) -> &Self {
        self.output.graph.add_scope(
            ScopeTarget::Output(self.output.target.clone()),
            config,
            Some(self.bounds()),
        );
        self
    }

    /// See [`ModuleOutput::out`].
    pub fn out(&self, base_channel: u16, options: StereoOutOptions) -> Result<&Self, GraphError> {
        self.output.out(base_channel, options)?;
        Ok(self)
    }

    /// See [`ModuleOutput::out_mono`].
    pub fn out_mono(&self, channel: u16, gain: Option<SignalArg>) -> Result<&Self, GraphError> {
        self.output.out_mono(channel, gain)?;
        Ok(self)
    }

    /// See [`ModuleOutput::pipe`].
    pub fn pipe<T>(&self, f: impl FnOnce(&Self) -> T) -> T {
        f(self)
    }

    /// See [`ModuleOutput::pipe_mix`].
    pub fn pipe_mix(
        &self,
        f: impl FnOnce(&ModuleOutput) -> Result<ModuleOutput, GraphError>,
        mix: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        self.output.pipe_mix(f, mix)
    }
}

impl fmt::Display for ModuleOutputWithRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.output.fmt(f)
    }
}

impl fmt::Debug for ModuleOutputWithRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleOutputWithRange")
            .field("target", self.output.target())
            .field("min", &self.min_value)
            .field("max", &self.max_value)
            .finish()
    }
}

impl From<&ModuleOutputWithRange> for SignalArg {
    fn from(output: &ModuleOutputWithRange) -> Self {
        SignalArg::Output(output.target().clone())
    }
}

impl From<&ModuleOutputWithRange> for ParamValue {
    fn from(output: &ModuleOutputWithRange) -> Self {
        ParamValue::Output(output.target().clone())
    }
}

/// An ordered, indexable collection of outputs.
///
/// Insertion order is channel order. Combinators broadcast across all
/// elements through one shared utility node with an array-valued input.
#[derive(Clone)]
pub struct Collection {
    graph: GraphBuilder,
    items: Vec<OutputRef>,
}

impl Collection {
    /// Builds a collection over explicit locators.
    pub fn new(graph: GraphBuilder, items: Vec<OutputRef>) -> Self {
        Self { graph, items }
    }

    /// Builds a collection from output handles, preserving order.
    pub fn from_outputs(
        graph: GraphBuilder,
        outputs: impl IntoIterator<Item = ModuleOutput>,
    ) -> Self {
        let items = outputs.into_iter().map(|o| o.target).collect();
        Self { graph, items }
    }

    /// Number of contained outputs.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The element at `index`, as a full output handle.
    pub fn get(&self, index: usize) -> Option<ModuleOutput> {
        self.items
            .get(index)
            .map(|r| ModuleOutput::new(self.graph.clone(), r.clone()))
    }

    /// Iterates over the contained outputs in channel order.
    pub fn iter(&self) -> impl Iterator<Item = ModuleOutput> + '_ {
        self.items
            .iter()
            .map(|r| ModuleOutput::new(self.graph.clone(), r.clone()))
    }

    /// The graph this collection belongs to.
    pub fn graph(&self) -> &GraphBuilder {
        &self.graph
    }

    /// Scales every element through ONE shared scale-and-shift node.
    pub fn gain(&self, factor: impl Into<SignalArg>) -> Result<Collection, GraphError> {
        let factor = factor.into();
        self.broadcast(|graph, input| graph.scale_and_shift(input, factor, 0.0))
    }

    /// Offsets every element through ONE shared scale-and-shift node.
    pub fn shift(&self, offset: impl Into<SignalArg>) -> Result<Collection, GraphError> {
        let offset = offset.into();
        self.broadcast(|graph, input| graph.scale_and_shift(input, 1.0, offset))
    }

    /// Clamps every element through ONE shared clamp node.
    pub fn clamp(
        &self,
        min: impl Into<SignalArg>,
        max: impl Into<SignalArg>,
    ) -> Result<Collection, GraphError> {
        let (min, max) = (min.into(), max.into());
        self.broadcast(|graph, input| graph.clamp_stage(input, min, max))
    }

    /// Remaps every element through ONE shared remap node. A plain
    /// collection carries no range provenance, so the input bounds must be
    /// explicit.
    pub fn range(
        &self,
        in_min: impl Into<SignalArg>,
        in_max: impl Into<SignalArg>,
        out_min: impl Into<SignalArg>,
        out_max: impl Into<SignalArg>,
    ) -> Result<Collection, GraphError> {
        let (in_min, in_max) = (in_min.into(), in_max.into());
        let (out_min, out_max) = (out_min.into(), out_max.into());
        self.broadcast(|graph, input| graph.remap(input, in_min, in_max, out_min, out_max))
    }

    /// Registers a scope on the FIRST element only; a scope shows one
    /// trace, not one per channel. Chainable no-op on an empty collection.
    pub fn scope(&self, config: ScopeConfig) -> &Self {
        if let Some(first) = self.items.first() {
            self.graph
                .add_scope(ScopeTarget::Output(first.clone()), config, None);
        }
        self
    }

    /// Routes all elements to a stereo output group on `base_channel`.
    pub fn out(&self, base_channel: u16, options: StereoOutOptions) -> Result<&Self, GraphError> {
        self.graph
            .add_out(self.as_params(), base_channel, options)?;
        Ok(self)
    }

    /// Routes all elements to a mono output group on `channel`.
    pub fn out_mono(&self, channel: u16, gain: Option<SignalArg>) -> Result<&Self, GraphError> {
        self.graph.add_out_mono(self.as_params(), channel, gain)?;
        Ok(self)
    }

    /// Pure functional application, as on a single output.
    pub fn pipe<T>(&self, f: impl FnOnce(&Self) -> T) -> T {
        f(self)
    }

    /// Crossfades the whole collection with `f(self)`'s result; same
    /// topology as [`ModuleOutput::pipe_mix`] with an array-valued dry input.
    pub fn pipe_mix(
        &self,
        f: impl FnOnce(&Self) -> Result<ModuleOutput, GraphError>,
        mix: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        let wet = f(self)?;
        crossfade(
            &self.graph,
            ParamValue::List(self.as_params()),
            wet.as_param(),
            mix.into(),
        )
    }

    fn as_params(&self) -> Vec<ParamValue> {
        self.items
            .iter()
            .map(|r| ParamValue::Output(r.clone()))
            .collect()
    }

    /// Feeds the whole collection into one node built by `build`, and
    /// re-collects that node's output as channel-indexed references.
    fn broadcast(
        &self,
        build: impl FnOnce(&GraphBuilder, ParamValue) -> Result<ModuleOutput, GraphError>,
    ) -> Result<Collection, GraphError> {
        let node_output = build(&self.graph, ParamValue::List(self.as_params()))?;
        let target = node_output.target();
        let items = (0..self.items.len())
            .map(|i| OutputRef::channel(target.module.clone(), target.port.clone(), i as u16))
            .collect();
        Ok(Collection {
            graph: self.graph.clone(),
            items,
        })
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Collection").field(&self.items).finish()
    }
}

/// A collection whose elements share one declared value range.
#[derive(Clone)]
pub struct CollectionWithRange {
    collection: Collection,
    min_value: f64,
    max_value: f64,
}

impl CollectionWithRange {
    /// Builds a range-aware collection over explicit locators.
    pub fn new(
        graph: GraphBuilder,
        items: Vec<OutputRef>,
        min_value: f64,
        max_value: f64,
    ) -> Self {
        Self {
            collection: Collection::new(graph, items),
            min_value,
            max_value,
        }
    }

    /// The declared `(min, max)` range shared by all elements.
    pub fn bounds(&self) -> (f64, f64) {
        (self.min_value, self.max_value)
    }

    /// The range-less view of this collection.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Number of contained outputs.
    pub fn len(&self) -> usize {
        self.collection.len()
    }

    /// Returns `true` when the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// The element at `index`, carrying the shared range.
    pub fn get(&self, index: usize) -> Option<ModuleOutputWithRange> {
        self.collection.items.get(index).map(|r| {
            ModuleOutputWithRange::new(
                self.collection.graph.clone(),
                r.clone(),
                self.min_value,
                self.max_value,
            )
        })
    }

    /// Remaps into `[out_min, out_max]`; the input range is the stored
    /// declared range.
    pub fn range(
        &self,
        out_min: impl Into<SignalArg>,
        out_max: impl Into<SignalArg>,
    ) -> Result<Collection, GraphError> {
        self.collection
            .range(self.min_value, self.max_value, out_min, out_max)
    }

    /// See [`Collection::gain`].
    pub fn gain(&self, factor: impl Into<SignalArg>) -> Result<Collection, GraphError> {
        self.collection.gain(factor)
    }

    /// See [`Collection::shift`].
    pub fn shift(&self, offset: impl Into<SignalArg>) -> Result<Collection, GraphError> {
        self.collection.shift(offset)
    }

    /// See [`Collection::clamp`].
    pub fn clamp(
        &self,
        min: impl Into<SignalArg>,
        max: impl Into<SignalArg>,
    ) -> Result<Collection, GraphError> {
        self.collection.clamp(min, max)
    }

    /// Registers a scope on the first element; the display range defaults
    /// to the declared range.
    pub fn scope(&self, config: ScopeConfig) -> &Self {
        if let Some(first) = self.collection.items.first() {
            self.collection.graph.add_scope(
                ScopeTarget::Output(first.clone()),
                config,
                Some(self.bounds()),
            );
        }
        self
    }

    /// See [`Collection::out`].
    pub fn out(&self, base_channel: u16, options: StereoOutOptions) -> Result<&Self, GraphError> {
        self.collection.out(base_channel, options)?;
        Ok(self)
    }

    /// See [`Collection::out_mono`].
    pub fn out_mono(&self, channel: u16, gain: Option<SignalArg>) -> Result<&Self, GraphError> {
        self.collection.out_mono(channel, gain)?;
        Ok(self)
    }

    /// See [`Collection::pipe`].
    pub fn pipe<T>(&self, f: impl FnOnce(&Self) -> T) -> T {
        f(self)
    }
}

impl fmt::Debug for CollectionWithRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionWithRange")
            .field("items", &self.collection.items)
            .field("min", &self.min_value)
            .field("max", &self.max_value)
            .finish()
    }
}

/// Shared dry/wet crossfade: a reciprocal remap of the mix control drives
/// the dry gain stage, a complementary scale drives the wet one, and one
/// mix node sums the two.
fn crossfade(
    graph: &GraphBuilder,
    dry: ParamValue,
    wet: ParamValue,
    mix: SignalArg,
) -> Result<ModuleOutput, GraphError> {
    let dry_level = graph.remap(mix.clone().into(), 0.0, 5.0, 1.0, 0.0)?;
    let wet_level = graph.scale_and_shift(mix.into(), 1.0 / 5.0, 0.0)?;
    let dry_stage = graph.scale_and_shift(dry, dry_level.target().clone(), 0.0)?;
    let wet_stage = graph.scale_and_shift(wet, wet_level.target().clone(), 0.0)?;
    graph.mix(vec![dry_stage.as_param(), wet_stage.as_param()])
}
