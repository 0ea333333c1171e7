//! The DSL execution context: everything a script's bindings close over.

use std::rc::Rc;

use patchscript_graph::{
    Collection, CompilationConfig, DeferredOutput, GraphBuilder, GraphError, ModuleLocation,
    OutputRef, ParamValue, Patch, ROOT_CLOCK_ID, UtilityRegistry,
};
use patchscript_schema::ProcessedSchemaSet;

use crate::channels::ChannelCount;
use crate::error::DslError;
use crate::factory::{Factory, FactoryOutput};
use crate::namespace::Namespace;
use crate::pitch;
use crate::value::{CallSite, DslValue};

/// Module type name of the root clock, pre-created when the schema set
/// declares it.
pub const ROOT_CLOCK_TYPE: &str = "clock";

/// Binds a schema set to a fresh [`GraphBuilder`] for one script run.
///
/// Construction builds the factory namespace tree (dotted schema names
/// become nested namespaces) and pre-creates the root clock module when
/// the schema set declares one. The embedding interpreter exposes the
/// namespace tree and the global helpers here as script bindings, runs the
/// script, then calls [`PatchContext::to_patch`].
#[derive(Debug)]
pub struct PatchContext {
    graph: GraphBuilder,
    root: Namespace,
}

impl PatchContext {
    /// Creates a context with the default compilation config.
    pub fn new(
        schemas: ProcessedSchemaSet,
        utilities: UtilityRegistry,
        channels: impl ChannelCount + 'static,
    ) -> Result<Self, DslError> {
        Self::with_config(schemas, utilities, channels, CompilationConfig::default())
    }

    /// Creates a context with an explicit compilation config.
    pub fn with_config(
        schemas: ProcessedSchemaSet,
        utilities: UtilityRegistry,
        channels: impl ChannelCount + 'static,
        config: CompilationConfig,
    ) -> Result<Self, DslError> {
        let graph = GraphBuilder::new(schemas.clone(), utilities, config);
        let channels: Rc<dyn ChannelCount> = Rc::new(channels);

        // Sorted for deterministic construction (and deterministic
        // collision reporting).
        let mut names: Vec<String> = schemas.iter().map(|s| s.schema.name.clone()).collect();
        names.sort();

        let mut root = Namespace::default();
        for name in &names {
            let schema = schemas
                .get(name)
                .expect("iterated name must resolve")
                .clone();
            root.insert(name, Factory::new(schema, graph.clone(), channels.clone()))?;
        }
        tracing::debug!(factories = names.len(), "context: namespace tree built");

        if schemas.contains(ROOT_CLOCK_TYPE) {
            graph.add_module(ROOT_CLOCK_TYPE, Some(ROOT_CLOCK_ID), None)?;
        }

        Ok(Self { graph, root })
    }

    /// The builder this context mutates.
    pub fn graph(&self) -> &GraphBuilder {
        &self.graph
    }

    /// The root of the factory namespace tree.
    pub fn root(&self) -> &Namespace {
        &self.root
    }

    /// Resolves a factory by dotted path.
    pub fn factory(&self, path: &str) -> Option<&Factory> {
        self.root.factory(path)
    }

    /// Resolves and calls a factory in one step. Unknown paths fail the
    /// same way an unknown type does.
    pub fn call(
        &self,
        path: &str,
        args: &[DslValue],
        site: &CallSite,
    ) -> Result<FactoryOutput, DslError> {
        let factory = self.factory(path).ok_or_else(|| {
            DslError::from(GraphError::UnknownModuleType {
                module_type: path.to_string(),
            })
        })?;
        factory.call(args, site)
    }

    // --- globals ---

    /// Note-name to volts (1 V/oct, C4 = 0 V).
    pub fn pitch(&self, name: &str) -> Result<f64, DslError> {
        pitch::note_volts(name)
    }

    /// Sets the tempo (BPM number or driving signal).
    pub fn set_tempo(&self, tempo: impl Into<ParamValue>) {
        self.graph.set_tempo(tempo);
    }

    /// Sets the transport run signal.
    pub fn set_run(&self, run: impl Into<ParamValue>) {
        self.graph.set_run(run);
    }

    /// Sets the transport reset signal.
    pub fn set_reset(&self, reset: impl Into<ParamValue>) {
        self.graph.set_reset(reset);
    }

    /// Sets the gain applied to the final mix.
    pub fn set_output_gain(&self, gain: f64) {
        self.graph.set_output_gain(gain);
    }

    /// Milliseconds per beat at the current tempo, when the tempo is a
    /// positive number (signal-driven tempo has no static beat length).
    pub fn ms_per_beat(&self) -> Option<f64> {
        match self.graph.tempo() {
            ParamValue::Number(bpm) if bpm > 0.0 => Some(60_000.0 / bpm),
            _ => None,
        }
    }

    /// Builds a [`Collection`] from loose outputs, flattening nested
    /// collections and lists. Values that are not outputs are ignored.
    pub fn collect(&self, values: impl IntoIterator<Item = DslValue>) -> Collection {
        let mut refs = Vec::new();
        for value in values {
            flatten_outputs(&value, &mut refs);
        }
        Collection::new(self.graph.clone(), refs)
    }

    /// Creates a deferred output for feedback and forward references.
    pub fn deferred(&self) -> DeferredOutput {
        self.graph.deferred()
    }

    // --- finalization and side channels ---

    /// Finalizes the compilation into a [`Patch`].
    pub fn to_patch(&self) -> Result<Patch, DslError> {
        Ok(self.graph.to_patch()?)
    }

    /// The `module id → source location` side map.
    pub fn source_map(&self) -> std::collections::HashMap<String, ModuleLocation> {
        self.graph.source_map()
    }

    /// The string-template substitution side map (populated by
    /// finalization).
    pub fn interpolation_map(&self) -> std::collections::HashMap<String, String> {
        self.graph.interpolation_map()
    }
}

fn flatten_outputs(value: &DslValue, refs: &mut Vec<OutputRef>) {
    match value {
        DslValue::Output(o) => refs.push(o.target().clone()),
        DslValue::RangedOutput(o) => refs.push(o.target().clone()),
        DslValue::Collection(c) => refs.extend(c.iter().map(|o| o.target().clone())),
        DslValue::RangedCollection(c) => {
            refs.extend(c.collection().iter().map(|o| o.target().clone()));
        }
        DslValue::List(items) => {
            for item in items {
                flatten_outputs(item, refs);
            }
        }
        _ => {}
    }
}
