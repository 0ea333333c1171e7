//! Compiles a small scripted patch and prints the serialized graph.
//!
//! Run with `cargo run -p patchscript-dsl --example compile_patch`.
//! `RUST_LOG=debug` shows the builder's mutation trace.

use patchscript_dsl::{CallSite, DslValue, NoChannelCount, OutputValue, PatchContext};
use patchscript_graph::{StereoOutOptions, UtilityKind, UtilityRegistry};
use patchscript_schema::{ModuleSchema, ProcessedSchemaSet};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

fn signal() -> Value {
    json!({ "title": "signal" })
}

fn schemas() -> ProcessedSchemaSet {
    let raw = [
        json!({
            "name": "osc",
            "args": [{ "name": "frequency" }],
            "params": {
                "properties": {
                    "frequency": signal(),
                    "waveform": { "enum": ["sine", "saw", "square"] }
                }
            },
            "outputs": [
                { "name": "out", "default": true, "minValue": -1.0, "maxValue": 1.0 }
            ]
        }),
        json!({
            "name": "fx.delay",
            "args": [{ "name": "input" }],
            "params": {
                "properties": {
                    "input": signal(),
                    "time": { "type": "number" },
                    "feedback": signal()
                }
            },
            "outputs": [{ "name": "out", "default": true }]
        }),
        json!({
            "name": "util",
            "params": {
                "properties": {
                    "input": signal(),
                    "inputs": { "type": "array" },
                    "scale": signal(),
                    "shift": signal(),
                    "pan": signal(),
                    "width": signal()
                }
            },
            "outputs": [{ "name": "output", "poly": true }]
        }),
    ];
    ProcessedSchemaSet::process(
        raw.into_iter()
            .map(|v| serde_json::from_value::<ModuleSchema>(v).expect("static schema")),
    )
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

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let context = PatchContext::new(schemas(), utilities(), NoChannelCount)?;

    // The script this harness stands in for:
    //
    //   lead = osc(pitch("A3"), { waveform: "saw", id: "lead" })
    //   echo = fx.delay(lead, { time: 350, feedback: 0.4 })
    //   echo.gain(0.8).out(0)
    let lead = context.call(
        "osc",
        &[
            DslValue::Number(context.pitch("A3")?),
            DslValue::Config(
                [
                    ("waveform".to_string(), DslValue::from("saw")),
                    ("id".to_string(), DslValue::from("lead")),
                ]
                .into_iter()
                .collect(),
            ),
        ],
        &CallSite::at(1, 1),
    )?;
    let Some(OutputValue::Ranged(lead_out)) = lead.base().cloned() else {
        unreachable!("osc declares one ranged output");
    };

    let echo = context.call(
        "fx.delay",
        &[
            DslValue::RangedOutput(lead_out),
            DslValue::Config(
                [
                    ("time".to_string(), DslValue::Number(350.0)),
                    ("feedback".to_string(), DslValue::Number(0.4)),
                ]
                .into_iter()
                .collect(),
            ),
        ],
        &CallSite::at(2, 1),
    )?;
    let Some(OutputValue::Single(echo_out)) = echo.base().cloned() else {
        unreachable!("fx.delay declares one output");
    };
    echo_out.gain(0.8)?.out(0, StereoOutOptions::default())?;

    let patch = context.to_patch()?;
    println!("{}", serde_json::to_string_pretty(&patch)?);
    Ok(())
}
