//! Graph builder — the mutable state machine behind one compilation.
//!
//! [`GraphBuilder`] owns the module registry, ID allocator, output-routing
//! groups, scope registrations, deferred-output arena, and the compilation
//! config. DSL factories and output combinators mutate it through the
//! operations here; [`GraphBuilder::to_patch`] (in `finalize`) resolves
//! everything into a serializable [`crate::Patch`].
//!
//! One builder is scoped to exactly one compilation. It is single-threaded
//! by contract: value handles ([`crate::ModuleOutput`],
//! [`crate::DeferredOutput`], …) share the builder through a cheap clone
//! and use it only to call mutation methods.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use patchscript_schema::{ParamKind, ProcessedModuleSchema, ProcessedSchemaSet};

use crate::config::CompilationConfig;
use crate::deferred::{DeferredId, DeferredOutput, DeferredSlot, DeferredTarget};
use crate::error::GraphError;
use crate::output::ModuleOutput;
use crate::scope::{ScopeConfig, ScopeRegistration, ScopeTarget};
use crate::utility::{UtilityKind, UtilityRegistry};
use crate::value::{ModuleLocation, OutputRef, ParamValue, SignalArg, SourceLocation};

/// Well-known ID of the root signal-passthrough node every finalized graph
/// contains.
pub const ROOT_OUT_ID: &str = "root-out";

/// Well-known ID of the root clock node the transport signals are pushed
/// into (created by the host before script execution, when present).
pub const ROOT_CLOCK_ID: &str = "root-clock";

/// Highest valid base channel for a stereo output group.
pub const MAX_STEREO_BASE_CHANNEL: u16 = 14;

/// Highest valid channel for a mono output group.
pub const MAX_MONO_CHANNEL: u16 = 15;

/// One module instance under construction.
#[derive(Debug, Clone)]
pub(crate) struct ModuleState {
    pub id: String,
    pub module_type: String,
    pub id_is_explicit: bool,
    pub params: BTreeMap<String, ParamValue>,
    /// Derived polyphonic channel count, when known.
    pub channels: Option<u32>,
}

/// Options for a stereo output-group registration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoOutOptions {
    /// Extra gain stage applied after the stereo mix.
    pub gain: Option<SignalArg>,
    /// Pan position, -1 (left) to 1 (right). Defaults to center.
    pub pan: Option<SignalArg>,
    /// Stereo width, 0 (mono) to 1 (full). Defaults to full.
    pub width: Option<SignalArg>,
}

/// One accumulated output-group registration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OutGroup {
    Stereo {
        sources: Vec<ParamValue>,
        options: StereoOutOptions,
    },
    Mono {
        sources: Vec<ParamValue>,
        gain: Option<SignalArg>,
    },
}

pub(crate) struct BuilderState {
    pub schemas: ProcessedSchemaSet,
    pub utilities: UtilityRegistry,
    pub config: CompilationConfig,
    pub modules: Vec<ModuleState>,
    pub module_index: HashMap<String, usize>,
    pub type_counters: HashMap<String, u32>,
    /// Keyed by base channel; BTreeMap gives the ascending processing
    /// order finalization requires.
    pub out_groups: BTreeMap<u16, Vec<OutGroup>>,
    pub scopes: Vec<ScopeRegistration>,
    pub deferred: Vec<DeferredSlot>,
    pub locations: HashMap<String, ModuleLocation>,
    pub interpolations: HashMap<String, String>,
}

/// The core mutable state machine of one compilation.
///
/// Cheap to clone — clones share the same underlying state. Not designed
/// for reuse across compilations: construct a fresh builder per run.
#[derive(Clone)]
pub struct GraphBuilder {
    pub(crate) state: Rc<RefCell<BuilderState>>,
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("modules", &self.state.borrow().modules.len())
            .finish_non_exhaustive()
    }
}

impl GraphBuilder {
    /// Creates a builder over a processed schema set.
    pub fn new(
        schemas: ProcessedSchemaSet,
        utilities: UtilityRegistry,
        config: CompilationConfig,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(BuilderState {
                schemas,
                utilities,
                config,
                modules: Vec::new(),
                module_index: HashMap::new(),
                type_counters: HashMap::new(),
                out_groups: BTreeMap::new(),
                scopes: Vec::new(),
                deferred: Vec::new(),
                locations: HashMap::new(),
                interpolations: HashMap::new(),
            })),
        }
    }

    // --- module lifecycle ---

    /// Adds a module of `module_type`.
    ///
    /// An explicit ID is used verbatim and fails with
    /// [`GraphError::DuplicateModuleId`] when already registered. Otherwise
    /// an ID of the form `"{type}-{n}"` is generated from a per-type
    /// counter starting at 1, skipping suffixes already taken (including
    /// by explicit IDs). Signal and poly-signal parameters default to the
    /// disconnected sentinel and signal-array parameters to an empty
    /// sequence, so every connectable parameter has a defined value.
    pub fn add_module(
        &self,
        module_type: &str,
        explicit_id: Option<&str>,
        location: Option<SourceLocation>,
    ) -> Result<ModuleNode, GraphError> {
        let schema = self
            .state
            .borrow()
            .schemas
            .get(module_type)
            .cloned()
            .ok_or_else(|| GraphError::UnknownModuleType {
                module_type: module_type.to_string(),
            })?;

        let mut state = self.state.borrow_mut();
        let (id, id_is_explicit) = match explicit_id {
            Some(id) => {
                if state.module_index.contains_key(id) {
                    return Err(GraphError::DuplicateModuleId { id: id.to_string() });
                }
                (id.to_string(), true)
            }
            None => {
                let counter = state
                    .type_counters
                    .get(module_type)
                    .copied()
                    .unwrap_or(1);
                let mut n = counter;
                let mut candidate = format!("{module_type}-{n}");
                while state.module_index.contains_key(&candidate) {
                    n += 1;
                    candidate = format!("{module_type}-{n}");
                }
                state.type_counters.insert(module_type.to_string(), n + 1);
                (candidate, false)
            }
        };

        let mut params = BTreeMap::new();
        for descriptor in schema.params.iter().filter(|d| d.kind.is_connectable()) {
            let default = if descriptor.kind == ParamKind::SignalArray {
                ParamValue::List(Vec::new())
            } else {
                ParamValue::Disconnected
            };
            params.insert(descriptor.name.clone(), default);
        }

        let index = state.modules.len();
        state.modules.push(ModuleState {
            id: id.clone(),
            module_type: module_type.to_string(),
            id_is_explicit,
            params,
            channels: None,
        });
        state.module_index.insert(id.clone(), index);

        if let Some(loc) = location {
            state.locations.insert(
                id.clone(),
                ModuleLocation {
                    line: loc.line,
                    column: loc.column,
                    id_is_explicit,
                },
            );
        }
        drop(state);

        tracing::debug!(module_type, id = %id, "graph_add: module");
        Ok(ModuleNode {
            graph: self.clone(),
            schema,
            id,
        })
    }

    /// Overwrites a parameter unconditionally — last write wins, no type
    /// checking at this layer.
    pub fn set_param(
        &self,
        module_id: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), GraphError> {
        let mut state = self.state.borrow_mut();
        let index =
            *state
                .module_index
                .get(module_id)
                .ok_or_else(|| GraphError::ModuleNotFound {
                    id: module_id.to_string(),
                })?;
        state.modules[index].params.insert(name.to_string(), value.into());
        tracing::trace!(module_id, param = name, "graph_set: param");
        Ok(())
    }

    /// Records the derived polyphonic channel count for a module.
    pub fn set_channel_count(&self, module_id: &str, channels: u32) -> Result<(), GraphError> {
        let mut state = self.state.borrow_mut();
        let index =
            *state
                .module_index
                .get(module_id)
                .ok_or_else(|| GraphError::ModuleNotFound {
                    id: module_id.to_string(),
                })?;
        state.modules[index].channels = Some(channels);
        Ok(())
    }

    /// Clones a module's current parameter assignments — the snapshot the
    /// channel-count derivation capability is keyed on.
    pub fn params(
        &self,
        module_id: &str,
    ) -> Result<BTreeMap<String, ParamValue>, GraphError> {
        let state = self.state.borrow();
        let index =
            *state
                .module_index
                .get(module_id)
                .ok_or_else(|| GraphError::ModuleNotFound {
                    id: module_id.to_string(),
                })?;
        Ok(state.modules[index].params.clone())
    }

    // --- deferred outputs ---

    /// Creates a new deferred output, usable before its value is known.
    pub fn deferred(&self) -> DeferredOutput {
        let mut state = self.state.borrow_mut();
        let id = DeferredId(state.deferred.len());
        state.deferred.push(DeferredSlot::Unset);
        drop(state);
        tracing::debug!(%id, "graph_add: deferred output");
        DeferredOutput::new(self.clone(), id)
    }

    pub(crate) fn set_deferred(&self, id: DeferredId, target: DeferredTarget) {
        let slot = match target {
            DeferredTarget::Output(r) => DeferredSlot::Target(r),
            DeferredTarget::Deferred(other) => DeferredSlot::PointsTo(other.0),
        };
        self.state.borrow_mut().deferred[id.0] = slot;
    }

    // --- output routing ---

    /// Registers a stereo output group on `base_channel` (0–14).
    pub fn add_out(
        &self,
        sources: Vec<ParamValue>,
        base_channel: u16,
        options: StereoOutOptions,
    ) -> Result<(), GraphError> {
        if base_channel > MAX_STEREO_BASE_CHANNEL {
            return Err(GraphError::InvalidChannel {
                channel: base_channel,
                max: MAX_STEREO_BASE_CHANNEL,
            });
        }
        tracing::debug!(base_channel, sources = sources.len(), "graph_add: stereo out group");
        self.state
            .borrow_mut()
            .out_groups
            .entry(base_channel)
            .or_default()
            .push(OutGroup::Stereo { sources, options });
        Ok(())
    }

    /// Registers a mono output group on `channel` (0–15).
    pub fn add_out_mono(
        &self,
        sources: Vec<ParamValue>,
        channel: u16,
        gain: Option<SignalArg>,
    ) -> Result<(), GraphError> {
        if channel > MAX_MONO_CHANNEL {
            return Err(GraphError::InvalidChannel {
                channel,
                max: MAX_MONO_CHANNEL,
            });
        }
        tracing::debug!(channel, sources = sources.len(), "graph_add: mono out group");
        self.state
            .borrow_mut()
            .out_groups
            .entry(channel)
            .or_default()
            .push(OutGroup::Mono { sources, gain });
        Ok(())
    }

    // --- scopes ---

    /// Registers a scope subscription on `target`.
    ///
    /// `declared_range` is the target's declared value range, used when the
    /// config does not pick one.
    pub fn add_scope(
        &self,
        target: impl Into<ScopeTarget>,
        config: ScopeConfig,
        declared_range: Option<(f64, f64)>,
    ) {
        let registration = ScopeRegistration::from_config(target.into(), config, declared_range);
        self.state.borrow_mut().scopes.push(registration);
    }

    // --- compilation config ---

    /// Sets the tempo (a number in BPM, or a signal driving it).
    pub fn set_tempo(&self, tempo: impl Into<ParamValue>) {
        self.state.borrow_mut().config.tempo = tempo.into();
    }

    /// Sets the transport run signal.
    pub fn set_run(&self, run: impl Into<ParamValue>) {
        self.state.borrow_mut().config.run = run.into();
    }

    /// Sets the transport reset signal.
    pub fn set_reset(&self, reset: impl Into<ParamValue>) {
        self.state.borrow_mut().config.reset = reset.into();
    }

    /// Sets the linear gain applied to the final mix.
    pub fn set_output_gain(&self, gain: f64) {
        self.state.borrow_mut().config.output_gain = gain;
    }

    /// Current tempo value (for script-side tempo math).
    pub fn tempo(&self) -> ParamValue {
        self.state.borrow().config.tempo.clone()
    }

    // --- side-channel accessors ---

    /// The `module id → source location` map for error-to-source mapping.
    pub fn source_map(&self) -> HashMap<String, ModuleLocation> {
        self.state.borrow().locations.clone()
    }

    /// The `placeholder → resolved locator` map recorded for every
    /// string-template substitution during finalization.
    pub fn interpolation_map(&self) -> HashMap<String, String> {
        self.state.borrow().interpolations.clone()
    }

    /// Number of modules currently registered.
    pub fn module_count(&self) -> usize {
        self.state.borrow().modules.len()
    }

    /// Whether a module with the given ID exists.
    pub fn has_module(&self, id: &str) -> bool {
        self.state.borrow().module_index.contains_key(id)
    }

    // --- utility node construction ---

    /// Materializes a utility node of `kind` with the given params, and
    /// returns its default output.
    pub(crate) fn utility(
        &self,
        kind: UtilityKind,
        params: Vec<(&str, ParamValue)>,
    ) -> Result<ModuleOutput, GraphError> {
        let module_type = self.state.borrow().utilities.require(kind)?.to_string();
        let node = self.add_module(&module_type, None, None)?;
        for (name, value) in params {
            node.set_param(name, value)?;
        }
        Ok(node.default_output())
    }

    /// One `x * scale + shift` stage over `input`.
    pub(crate) fn scale_and_shift(
        &self,
        input: ParamValue,
        scale: impl Into<SignalArg>,
        shift: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        let (scale, shift): (SignalArg, SignalArg) = (scale.into(), shift.into());
        self.utility(
            UtilityKind::ScaleAndShift,
            vec![
                ("input", input),
                ("scale", scale.into()),
                ("shift", shift.into()),
            ],
        )
    }

    /// One linear range remap over `input`.
    pub(crate) fn remap(
        &self,
        input: ParamValue,
        in_min: impl Into<SignalArg>,
        in_max: impl Into<SignalArg>,
        out_min: impl Into<SignalArg>,
        out_max: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        let (in_min, in_max): (SignalArg, SignalArg) = (in_min.into(), in_max.into());
        let (out_min, out_max): (SignalArg, SignalArg) = (out_min.into(), out_max.into());
        self.utility(
            UtilityKind::Remap,
            vec![
                ("input", input),
                ("inMin", in_min.into()),
                ("inMax", in_max.into()),
                ("outMin", out_min.into()),
                ("outMax", out_max.into()),
            ],
        )
    }

    /// One hard clamp over `input`.
    pub(crate) fn clamp_stage(
        &self,
        input: ParamValue,
        min: impl Into<SignalArg>,
        max: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        let (min, max): (SignalArg, SignalArg) = (min.into(), max.into());
        self.utility(
            UtilityKind::Clamp,
            vec![("input", input), ("min", min.into()), ("max", max.into())],
        )
    }

    /// One polyphonic summing mix over `inputs`.
    pub(crate) fn mix(&self, inputs: Vec<ParamValue>) -> Result<ModuleOutput, GraphError> {
        self.utility(UtilityKind::Mix, vec![("inputs", ParamValue::List(inputs))])
    }

    /// One stereo mix over `inputs` with pan and width.
    pub(crate) fn stereo_mix(
        &self,
        inputs: Vec<ParamValue>,
        pan: impl Into<SignalArg>,
        width: impl Into<SignalArg>,
    ) -> Result<ModuleOutput, GraphError> {
        let (pan, width): (SignalArg, SignalArg) = (pan.into(), width.into());
        self.utility(
            UtilityKind::StereoMixer,
            vec![
                ("inputs", ParamValue::List(inputs)),
                ("pan", pan.into()),
                ("width", width.into()),
            ],
        )
    }
}

/// Handle to one module instance, returned by [`GraphBuilder::add_module`]
/// and the factory layer.
///
/// The stored state is never handed out directly — parameter writes go
/// through [`ModuleNode::set_param`] so they follow the same path as every
/// other mutation.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    graph: GraphBuilder,
    schema: Arc<ProcessedModuleSchema>,
    id: String,
}

impl ModuleNode {
    /// The module's ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The module's type name.
    pub fn module_type(&self) -> &str {
        &self.schema.schema.name
    }

    /// The processed schema backing this module.
    pub fn schema(&self) -> &Arc<ProcessedModuleSchema> {
        &self.schema
    }

    /// The graph this module belongs to.
    pub fn graph(&self) -> &GraphBuilder {
        &self.graph
    }

    /// Overwrites one parameter.
    pub fn set_param(&self, name: &str, value: impl Into<ParamValue>) -> Result<(), GraphError> {
        self.graph.set_param(&self.id, name, value)
    }

    /// Records the derived polyphonic channel count.
    pub fn set_channel_count(&self, channels: u32) -> Result<(), GraphError> {
        self.graph.set_channel_count(&self.id, channels)
    }

    /// Clones the module's current parameter assignments.
    pub fn params(&self) -> Result<BTreeMap<String, ParamValue>, GraphError> {
        self.graph.params(&self.id)
    }

    /// An output handle for a declared port, or `None` for unknown ports.
    pub fn output(&self, port: &str) -> Option<ModuleOutput> {
        self.schema
            .schema
            .outputs
            .iter()
            .find(|o| o.name == port)
            .map(|o| {
                ModuleOutput::new(self.graph.clone(), OutputRef::new(self.id.clone(), &o.name))
            })
    }

    /// The default output: the first port flagged `default`, else the
    /// first declared port, else a conventional `"output"` port for
    /// schemas that declare none.
    pub fn default_output(&self) -> ModuleOutput {
        let port = self
            .schema
            .schema
            .outputs
            .iter()
            .find(|o| o.default)
            .or_else(|| self.schema.schema.outputs.first())
            .map_or_else(|| "output".to_string(), |o| o.name.clone());
        ModuleOutput::new(self.graph.clone(), OutputRef::new(self.id.clone(), port))
    }
}
