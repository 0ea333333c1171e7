//! Schema processing: `$ref` dereference, `allOf` merge, and descriptor
//! extraction.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::kind::{ParamKind, classify};
use crate::schema::ModuleSchema;

/// Flat description of one classified module parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    /// Parameter name.
    pub name: String,
    /// Inferred kind.
    pub kind: ParamKind,
    /// Whether the parameter appears in the schema's `required` list.
    pub required: bool,
    /// Allowed values for string-enum parameters.
    pub enum_values: Option<Vec<String>>,
}

/// A module schema plus its classified parameter list.
///
/// Derived once per schema set and never mutated afterwards; safe to share
/// across factories via [`Arc`].
#[derive(Debug, Clone)]
pub struct ProcessedModuleSchema {
    /// The raw schema this was derived from.
    pub schema: ModuleSchema,
    /// Classified parameters, in schema property order.
    pub params: Vec<ParamDescriptor>,
    index: HashMap<String, usize>,
}

impl ProcessedModuleSchema {
    /// Processes one raw module schema.
    pub fn process(schema: ModuleSchema) -> Self {
        let root = schema.params.clone();
        let resolved = deref(&schema.params, &root, &mut HashSet::new());
        let merged = merge_all_of(&resolved);

        let required: HashSet<String> = merged
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut params = Vec::new();
        if let Some(properties) = merged.get("properties").and_then(Value::as_object) {
            for (name, shape) in properties {
                let merged = merge_all_of(shape);
                let (kind, enum_values) = classify(&merged);
                params.push(ParamDescriptor {
                    name: name.clone(),
                    kind,
                    required: required.contains(name),
                    enum_values,
                });
            }
        }

        let index = params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        Self {
            schema,
            params,
            index,
        }
    }

    /// Looks up a classified parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.index.get(name).map(|&i| &self.params[i])
    }
}

/// All processed schemas of one compilation, keyed by module type name.
///
/// Immutable post-construction; one set may back any number of independent
/// compilations.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSchemaSet {
    schemas: HashMap<String, Arc<ProcessedModuleSchema>>,
}

impl ProcessedSchemaSet {
    /// Processes a full schema list. Later duplicates replace earlier ones.
    pub fn process(schemas: impl IntoIterator<Item = ModuleSchema>) -> Self {
        let schemas = schemas
            .into_iter()
            .map(|s| {
                let processed = ProcessedModuleSchema::process(s);
                (processed.schema.name.clone(), Arc::new(processed))
            })
            .collect();
        Self { schemas }
    }

    /// Looks up a processed schema by module type name.
    pub fn get(&self, name: &str) -> Option<&Arc<ProcessedModuleSchema>> {
        self.schemas.get(name)
    }

    /// Returns `true` when the set knows the given module type.
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Iterates over all processed schemas in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ProcessedModuleSchema>> {
        self.schemas.values()
    }

    /// Number of schemas in the set.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns `true` when the set is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Resolves local `$ref` pointers against `root`.
///
/// Pointers already on the resolution path (the `seen` set) and pointers
/// that do not resolve pass through unchanged rather than erroring.
fn deref(value: &Value, root: &Value, seen: &mut HashSet<String>) -> Value {
    if let Some(pointer) = value.get("$ref").and_then(Value::as_str) {
        if let Some(target) = resolve_pointer(pointer, root) {
            if seen.insert(pointer.to_string()) {
                let resolved = deref(&target, root, seen);
                seen.remove(pointer);
                return resolved;
            }
        }
        return value.clone();
    }
    match value {
        Value::Object(map) => {
            let resolved: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), deref(v, root, seen)))
                .collect();
            Value::Object(resolved)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| deref(v, root, seen)).collect())
        }
        other => other.clone(),
    }
}

/// Resolves a local JSON pointer (`#/a/b`) against `root`.
fn resolve_pointer(pointer: &str, root: &Value) -> Option<Value> {
    let path = pointer.strip_prefix('#')?;
    root.pointer(path).cloned()
}

/// Merges `allOf` branches: property union, required union, first non-empty
/// description. Keys outside `allOf` are preserved; values without `allOf`
/// pass through.
///
/// Expects `$ref`s to be dereferenced already — the only refs left are
/// cycle-guarded leftovers, which merge as opaque objects.
fn merge_all_of(value: &Value) -> Value {
    let Some(branches) = value.get("allOf").and_then(Value::as_array) else {
        return value.clone();
    };

    let mut merged = match value {
        Value::Object(map) => {
            let mut base = map.clone();
            base.remove("allOf");
            base
        }
        _ => Map::new(),
    };

    let mut properties = merged
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let mut required: Vec<Value> = merged
        .get("required")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for branch in branches {
        let branch = merge_all_of(branch);
        if let Some(props) = branch.get("properties").and_then(Value::as_object) {
            for (name, shape) in props {
                properties.entry(name.clone()).or_insert_with(|| shape.clone());
            }
        }
        if let Some(names) = branch.get("required").and_then(Value::as_array) {
            for name in names {
                if !required.contains(name) {
                    required.push(name.clone());
                }
            }
        }
        if !merged.contains_key("description") {
            if let Some(desc) = branch.get("description").and_then(Value::as_str) {
                if !desc.is_empty() {
                    merged.insert("description".into(), Value::String(desc.to_string()));
                }
            }
        }
    }

    if !properties.is_empty() {
        merged.insert("properties".into(), Value::Object(properties));
    }
    if !required.is_empty() {
        merged.insert("required".into(), Value::Array(required));
    }
    Value::Object(merged)
}
