//! Property-based tests for ID allocation and placeholder substitution.

use proptest::prelude::*;

use patchscript_graph::{
    CompilationConfig, GraphBuilder, OutputRef, PatchValue, UtilityKind, UtilityRegistry,
};
use patchscript_schema::{ModuleSchema, ProcessedSchemaSet};
use serde_json::json;

fn schemas() -> ProcessedSchemaSet {
    let osc: ModuleSchema = serde_json::from_value(json!({
        "name": "osc",
        "outputs": [{ "name": "sine", "default": true }]
    }))
    .unwrap();
    let seq: ModuleSchema = serde_json::from_value(json!({
        "name": "seq",
        "params": { "properties": { "pattern": { "type": "string" } } },
        "outputs": [{ "name": "gate" }]
    }))
    .unwrap();
    let pass: ModuleSchema = serde_json::from_value(json!({
        "name": "util.pass",
        "outputs": [{ "name": "output", "poly": true }]
    }))
    .unwrap();
    ProcessedSchemaSet::process(vec![osc, seq, pass])
}

fn builder() -> GraphBuilder {
    let mut utilities = UtilityRegistry::new();
    utilities
        .register(UtilityKind::Passthrough, "util.pass")
        .register(UtilityKind::Mix, "util.pass")
        .register(UtilityKind::StereoMixer, "util.pass")
        .register(UtilityKind::ScaleAndShift, "util.pass");
    GraphBuilder::new(schemas(), utilities, CompilationConfig::default())
}

fn suffix(id: &str) -> u32 {
    id.rsplit('-').next().unwrap().parse().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// For any set of pre-claimed explicit suffixes and any number of
    /// auto-generated modules, generated IDs are unique, skip every claimed
    /// suffix, and their numeric suffixes strictly increase.
    #[test]
    fn generated_ids_unique_and_strictly_increasing(
        explicit in prop::collection::hash_set(1u32..24, 0..8),
        autos in 1usize..24,
    ) {
        let graph = builder();
        for n in &explicit {
            graph.add_module("osc", Some(&format!("osc-{n}")), None).unwrap();
        }

        let mut generated = Vec::with_capacity(autos);
        for _ in 0..autos {
            generated.push(graph.add_module("osc", None, None).unwrap().id().to_string());
        }

        let mut seen = std::collections::HashSet::new();
        let mut last = 0u32;
        for id in &generated {
            prop_assert!(seen.insert(id.clone()), "duplicate generated id {id}");
            let n = suffix(id);
            prop_assert!(
                !explicit.contains(&n),
                "generated id {id} collides with explicit suffix {n}"
            );
            prop_assert!(n > last, "suffixes must strictly increase: {n} after {last}");
            last = n;
        }
    }

    /// Pattern strings with no placeholder pass through finalization
    /// byte-for-byte.
    #[test]
    fn placeholder_free_strings_pass_through(
        text in "[ -~]{0,40}".prop_filter("no placeholder", |s| !s.contains("DEFERRED-")),
    ) {
        let graph = builder();
        let seq = graph.add_module("seq", Some("s"), None).unwrap();
        seq.set_param("pattern", text.clone()).unwrap();

        let patch = graph.to_patch().unwrap();
        prop_assert_eq!(
            patch.module("s").unwrap().params.get("pattern"),
            Some(&PatchValue::Text(text))
        );
    }

    /// Resolved placeholders substitute every occurrence, wherever they sit
    /// in the surrounding text.
    #[test]
    fn resolved_placeholders_substitute_all_occurrences(
        prefix in "[a-z ]{0,10}",
        middle in "[a-z ]{0,10}",
    ) {
        let graph = builder();
        let deferred = graph.deferred();
        deferred.set(OutputRef::new("osc-1", "sine"));
        let seq = graph.add_module("seq", Some("s"), None).unwrap();
        seq.set_param("pattern", format!("{prefix}{deferred}{middle}{deferred}"))
            .unwrap();

        let patch = graph.to_patch().unwrap();
        let expected = format!("{prefix}osc-1/sine{middle}osc-1/sine");
        prop_assert_eq!(
            patch.module("s").unwrap().params.get("pattern"),
            Some(&PatchValue::Text(expected))
        );
    }
}
