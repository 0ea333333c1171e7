//! Compile-throughput benchmark: build a patch of chained voices and
//! finalize it.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use patchscript_graph::{
    CompilationConfig, GraphBuilder, StereoOutOptions, UtilityKind, UtilityRegistry,
};
use patchscript_schema::{ModuleSchema, ProcessedSchemaSet};
use serde_json::{Value, json};

fn signal_shape() -> Value {
    json!({
        "oneOf": [
            { "type": "number" },
            { "oneOf": [
                { "properties": { "type": { "const": "cable" } } },
                { "properties": { "type": { "const": "disconnected" } } }
            ] }
        ]
    })
}

fn schemas() -> ProcessedSchemaSet {
    let utility_params = json!({
        "properties": {
            "input": signal_shape(),
            "inputs": { "type": "array" },
            "scale": signal_shape(),
            "shift": signal_shape(),
            "pan": signal_shape(),
            "width": signal_shape()
        }
    });
    let schemas: Vec<ModuleSchema> = [
        json!({
            "name": "osc",
            "params": { "properties": { "frequency": signal_shape() } },
            "outputs": [{ "name": "sine", "default": true }]
        }),
        json!({
            "name": "util",
            "params": utility_params,
            "outputs": [{ "name": "output", "poly": true }]
        }),
    ]
    .into_iter()
    .map(|v| serde_json::from_value(v).unwrap())
    .collect();
    ProcessedSchemaSet::process(schemas)
}

fn utilities() -> UtilityRegistry {
    let mut registry = UtilityRegistry::new();
    for kind in [
        UtilityKind::Passthrough,
        UtilityKind::Mix,
        UtilityKind::StereoMixer,
        UtilityKind::ScaleAndShift,
        UtilityKind::Remap,
        UtilityKind::Clamp,
    ] {
        registry.register(kind, "util");
    }
    registry
}

fn build_patch(schemas: &ProcessedSchemaSet, voices: usize) {
    let graph = GraphBuilder::new(schemas.clone(), utilities(), CompilationConfig::default());
    for i in 0..voices {
        let osc = graph.add_module("osc", None, None).unwrap();
        osc.set_param("frequency", i as f64 / 12.0).unwrap();
        osc.default_output()
            .gain(0.5)
            .unwrap()
            .out((i % 8) as u16, StereoOutOptions::default())
            .unwrap();
    }
    black_box(graph.to_patch().unwrap());
}

fn bench_compile(c: &mut Criterion) {
    let schemas = schemas();
    let mut group = c.benchmark_group("compile");
    for voices in [8, 64, 256] {
        group.bench_function(format!("{voices}_voices"), |b| {
            b.iter(|| build_patch(&schemas, voices));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
