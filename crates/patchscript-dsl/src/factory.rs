//! Per-schema factories: the callable surface scripts instantiate modules
//! through.
//!
//! A factory call splits its arguments into positionals (per the schema's
//! declared order) and one trailing config object, creates the module,
//! assigns every defined parameter, derives the polyphonic channel count
//! through the external [`ChannelCount`] capability, and shapes its return
//! value from the schema's declared outputs.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

use patchscript_graph::{
    Collection, CollectionWithRange, GraphBuilder, ModuleNode, ModuleOutput,
    ModuleOutputWithRange, OutputRef, ParamValue,
};
use patchscript_schema::{OutputDescriptor, ProcessedModuleSchema};

use crate::channels::ChannelCount;
use crate::error::DslError;
use crate::value::{ArgSpan, CallSite, DslValue};

/// Reserved internal parameter key the captured per-argument source spans
/// are attached under. The `$` prefix keeps it out of any legal schema
/// parameter name.
pub const ARG_SPANS_KEY: &str = "$argSpans";

/// Output property names that would collide with the combinator methods on
/// output handles. Must stay in lockstep with the method vocabulary of
/// [`ModuleOutput`] / [`Collection`].
pub const RESERVED_OUTPUT_NAMES: &[&str] = &[
    "gain", "shift", "range", "clamp", "scope", "out", "outMono", "out_mono", "pipe", "pipeMix",
    "pipe_mix", "target", "bounds", "output", "graph", "id", "len", "get", "iter",
];

/// One output in a factory's return value, shaped by the schema's output
/// descriptor and the derived channel count.
#[derive(Debug, Clone)]
pub enum OutputValue {
    /// A plain single output.
    Single(ModuleOutput),
    /// A single output with a declared value range.
    Ranged(ModuleOutputWithRange),
    /// A polyphonic output shaped into channel-indexed outputs.
    Poly(Collection),
    /// A polyphonic, range-aware output.
    PolyRanged(CollectionWithRange),
}

impl OutputValue {
    /// Converts into a marshalling value for the interpreter.
    pub fn into_dsl(self) -> DslValue {
        match self {
            OutputValue::Single(o) => DslValue::Output(o),
            OutputValue::Ranged(o) => DslValue::RangedOutput(o),
            OutputValue::Poly(c) => DslValue::Collection(c),
            OutputValue::PolyRanged(c) => DslValue::RangedCollection(c),
        }
    }
}

/// A factory call's return value.
///
/// The binding layer exposes `Named` extras however the target language
/// supports — associative attachment is enough, no field synthesis needed.
#[derive(Debug, Clone)]
pub enum FactoryOutput {
    /// The schema declared no outputs. Defensive; schemas should always
    /// declare at least one.
    Empty,
    /// Exactly one declared output.
    Single(OutputValue),
    /// Several declared outputs: the default one as the base value, every
    /// other attached under its sanitized name.
    Named {
        /// The default output (first flagged `default`, else first declared).
        base: OutputValue,
        /// Remaining outputs, keyed by sanitized port name.
        named: BTreeMap<String, OutputValue>,
    },
}

impl FactoryOutput {
    /// The base output, when any output was declared.
    pub fn base(&self) -> Option<&OutputValue> {
        match self {
            FactoryOutput::Empty => None,
            FactoryOutput::Single(v) => Some(v),
            FactoryOutput::Named { base, .. } => Some(base),
        }
    }

    /// A named extra output, by sanitized name.
    pub fn named(&self, name: &str) -> Option<&OutputValue> {
        match self {
            FactoryOutput::Named { named, .. } => named.get(name),
            _ => None,
        }
    }
}

/// The callable constructor for one module schema.
#[derive(Clone)]
pub struct Factory {
    schema: Arc<ProcessedModuleSchema>,
    graph: GraphBuilder,
    channels: Rc<dyn ChannelCount>,
}

impl Factory {
    pub(crate) fn new(
        schema: Arc<ProcessedModuleSchema>,
        graph: GraphBuilder,
        channels: Rc<dyn ChannelCount>,
    ) -> Self {
        Self {
            schema,
            graph,
            channels,
        }
    }

    /// The module type this factory instantiates.
    pub fn module_type(&self) -> &str {
        &self.schema.schema.name
    }

    /// The processed schema backing this factory.
    pub fn schema(&self) -> &Arc<ProcessedModuleSchema> {
        &self.schema
    }

    /// Instantiates one module from a DSL call.
    ///
    /// Argument handling: leading arguments map onto the schema's declared
    /// positional names; one trailing config object merges in afterwards
    /// (config wins on collision, `id` is extracted rather than assigned).
    /// A trailing plain string past the positional arity is shorthand for
    /// `{ id: ... }`. `Null` arguments and config values are skipped —
    /// their parameters keep their defaults.
    pub fn call(&self, args: &[DslValue], site: &CallSite) -> Result<FactoryOutput, DslError> {
        let declared = &self.schema.schema.args;

        let mut positional = args;
        let mut config: Option<&BTreeMap<String, DslValue>> = None;
        let mut explicit_id: Option<String> = None;
        match args.last() {
            Some(DslValue::Config(map)) => {
                config = Some(map);
                positional = &args[..args.len() - 1];
            }
            Some(DslValue::Text(s)) if args.len() > declared.len() => {
                explicit_id = Some(s.clone());
                positional = &args[..args.len() - 1];
            }
            _ => {}
        }
        if let Some(map) = config {
            if let Some(DslValue::Text(id)) = map.get("id") {
                explicit_id = Some(id.clone());
            }
        }

        let node =
            self.graph
                .add_module(self.module_type(), explicit_id.as_deref(), site.location)?;

        // Positionals first, config second: config wins on collision.
        for (descriptor, value) in declared.iter().zip(positional) {
            if matches!(value, DslValue::Null) {
                continue;
            }
            node.set_param(&descriptor.name, value.to_param())?;
        }
        if let Some(map) = config {
            for (key, value) in map {
                if key == "id" || matches!(value, DslValue::Null) {
                    continue;
                }
                node.set_param(key, value.to_param())?;
            }
        }

        if let Some(spans) = site.arg_spans.as_deref() {
            if !spans.is_empty() {
                node.set_param(ARG_SPANS_KEY, spans_param(spans))?;
            }
        }

        let mut channel_count = None;
        if self.schema.schema.outputs.iter().any(|o| o.poly) {
            let snapshot = params_snapshot(&node)?;
            channel_count = self.channels.derive(self.module_type(), &snapshot)?;
            if let Some(n) = channel_count {
                node.set_channel_count(n)?;
            }
        }
        tracing::debug!(
            module_type = self.module_type(),
            id = node.id(),
            ?channel_count,
            "factory_call"
        );

        Ok(shape_outputs(&node, channel_count))
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Factory").field(&self.module_type()).finish()
    }
}

/// Sanitizes a port name so it cannot shadow a combinator method.
pub fn sanitize_port_name(name: &str) -> String {
    let mut sanitized = name.to_string();
    while RESERVED_OUTPUT_NAMES.contains(&sanitized.as_str()) {
        sanitized.push('_');
    }
    sanitized
}

/// Shapes a factory's return value from the schema's declared outputs.
fn shape_outputs(node: &ModuleNode, channel_count: Option<u32>) -> FactoryOutput {
    let outputs = &node.schema().schema.outputs;
    match outputs.len() {
        0 => FactoryOutput::Empty,
        1 => FactoryOutput::Single(output_value(node, &outputs[0], channel_count)),
        _ => {
            let base_index = outputs.iter().position(|o| o.default).unwrap_or(0);
            let base = output_value(node, &outputs[base_index], channel_count);
            let named = outputs
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != base_index)
                .map(|(_, o)| {
                    (
                        sanitize_port_name(&o.name),
                        output_value(node, o, channel_count),
                    )
                })
                .collect();
            FactoryOutput::Named { base, named }
        }
    }
}

/// Builds one output handle, shaped by polyphony and declared range.
fn output_value(
    node: &ModuleNode,
    descriptor: &OutputDescriptor,
    channel_count: Option<u32>,
) -> OutputValue {
    let graph = node.graph().clone();
    let poly_channels = if descriptor.poly { channel_count } else { None };
    match (poly_channels, descriptor.range()) {
        (Some(n), Some((min, max))) => OutputValue::PolyRanged(CollectionWithRange::new(
            graph,
            channel_refs(node.id(), &descriptor.name, n),
            min,
            max,
        )),
        (Some(n), None) => OutputValue::Poly(Collection::new(
            graph,
            channel_refs(node.id(), &descriptor.name, n),
        )),
        (None, Some((min, max))) => OutputValue::Ranged(ModuleOutputWithRange::new(
            graph,
            OutputRef::new(node.id(), descriptor.name.clone()),
            min,
            max,
        )),
        (None, None) => OutputValue::Single(ModuleOutput::new(
            graph,
            OutputRef::new(node.id(), descriptor.name.clone()),
        )),
    }
}

fn channel_refs(module_id: &str, port: &str, channels: u32) -> Vec<OutputRef> {
    (0..channels)
        .map(|i| OutputRef::channel(module_id, port, i as u16))
        .collect()
}

/// Encodes captured argument spans as a parameter value.
fn spans_param(spans: &[ArgSpan]) -> ParamValue {
    ParamValue::List(
        spans
            .iter()
            .map(|span| {
                let mut map = BTreeMap::new();
                map.insert(
                    "startLine".to_string(),
                    ParamValue::Number(f64::from(span.start.line)),
                );
                map.insert(
                    "startColumn".to_string(),
                    ParamValue::Number(f64::from(span.start.column)),
                );
                map.insert(
                    "endLine".to_string(),
                    ParamValue::Number(f64::from(span.end.line)),
                );
                map.insert(
                    "endColumn".to_string(),
                    ParamValue::Number(f64::from(span.end.column)),
                );
                ParamValue::Map(map)
            })
            .collect(),
    )
}

/// Serializes a module's current params as the derivation snapshot.
fn params_snapshot(node: &ModuleNode) -> Result<Value, DslError> {
    let params = node.params()?;
    Ok(Value::Object(
        params
            .iter()
            .map(|(name, value)| (name.clone(), snapshot_value(value)))
            .collect(),
    ))
}

fn snapshot_value(value: &ParamValue) -> Value {
    match value {
        ParamValue::Number(n) => serde_json::json!(n),
        ParamValue::Bool(b) => Value::Bool(*b),
        ParamValue::Text(s) => Value::String(s.clone()),
        ParamValue::Disconnected => serde_json::json!({ "type": "disconnected" }),
        ParamValue::Output(r) => {
            let mut map = serde_json::Map::new();
            map.insert("type".into(), Value::String("cable".into()));
            map.insert("module".into(), Value::String(r.module.clone()));
            map.insert("port".into(), Value::String(r.port.clone()));
            if let Some(channel) = r.channel {
                map.insert("channel".into(), serde_json::json!(channel));
            }
            Value::Object(map)
        }
        ParamValue::Deferred(id) => Value::String(id.to_string()),
        ParamValue::List(items) => Value::Array(items.iter().map(snapshot_value).collect()),
        ParamValue::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), snapshot_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- name sanitization ---

    #[test]
    fn reserved_names_grow_a_suffix() {
        assert_eq!(sanitize_port_name("gain"), "gain_");
        assert_eq!(sanitize_port_name("out"), "out_");
        assert_eq!(sanitize_port_name("sine"), "sine");
    }

    #[test]
    fn sanitization_is_stable_for_already_suffixed_names() {
        assert_eq!(sanitize_port_name("gain_"), "gain_");
    }

    // --- snapshots ---

    #[test]
    fn snapshot_encodes_references() {
        let cable = ParamValue::Output(OutputRef::channel("osc-1", "sine", 2));
        assert_eq!(
            snapshot_value(&cable),
            serde_json::json!({ "type": "cable", "module": "osc-1", "port": "sine", "channel": 2 })
        );
        assert_eq!(
            snapshot_value(&ParamValue::Disconnected),
            serde_json::json!({ "type": "disconnected" })
        );
    }
}
