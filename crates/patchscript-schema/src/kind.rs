//! Structural parameter-kind classification.
//!
//! Every parameter shape is classified by matching its structure, never its
//! name. The check order is a documented contract: poly-signal before
//! signal (a poly-signal's signal branch would otherwise match first),
//! signal-array last among the compound checks, then primitives and string
//! enums, then [`ParamKind::Unknown`].

use serde_json::Value;

/// Typed classification of a module parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// A single voltage or cable reference.
    Signal,
    /// A signal or homogeneous array of signals (polyphonic fan-out).
    PolySignal,
    /// A fixed or homogeneous array whose elements are all signals.
    SignalArray,
    /// A plain number.
    Number,
    /// A plain string (possibly enum-constrained).
    Text,
    /// A boolean flag.
    Boolean,
    /// Anything the classifier does not recognize.
    Unknown,
}

impl ParamKind {
    /// Returns `true` for the kinds that take cable connections
    /// (signal, poly-signal, signal-array).
    pub fn is_connectable(self) -> bool {
        matches!(
            self,
            ParamKind::Signal | ParamKind::PolySignal | ParamKind::SignalArray
        )
    }
}

/// Classifies a parameter schema shape.
///
/// Returns `(kind, enum_values)`; `enum_values` is populated only for
/// string-enum parameters. Malformed shapes never error — they classify as
/// [`ParamKind::Unknown`].
pub fn classify(schema: &Value) -> (ParamKind, Option<Vec<String>>) {
    // Compound checks, in contract order.
    if is_poly_signal(schema) {
        return (ParamKind::PolySignal, None);
    }
    if is_signal(schema) {
        return (ParamKind::Signal, None);
    }
    if is_signal_array(schema) {
        return (ParamKind::SignalArray, None);
    }

    if let Some(values) = string_enum_values(schema) {
        return (ParamKind::Text, Some(values));
    }

    match schema.get("type").and_then(Value::as_str) {
        Some("number" | "integer") => (ParamKind::Number, None),
        Some("string") => (ParamKind::Text, None),
        Some("boolean") => (ParamKind::Boolean, None),
        _ => (ParamKind::Unknown, None),
    }
}

/// Union branches of a schema: `oneOf` if present, else `anyOf`.
fn union_branches(schema: &Value) -> Option<&Vec<Value>> {
    schema
        .get("oneOf")
        .or_else(|| schema.get("anyOf"))
        .and_then(Value::as_array)
}

/// A signal: a union with a numeric branch and a cable/disconnected tagged
/// branch. A `"title": "signal"` shortcut is also accepted.
pub(crate) fn is_signal(schema: &Value) -> bool {
    if schema.get("title").and_then(Value::as_str) == Some("signal") {
        return true;
    }
    let Some(branches) = union_branches(schema) else {
        return false;
    };
    let has_numeric = branches.iter().any(|b| {
        matches!(
            b.get("type").and_then(Value::as_str),
            Some("number" | "integer")
        )
    });
    has_numeric && branches.iter().any(is_cable_union)
}

/// The tagged branch of a signal: a union of object variants whose `type`
/// field tags cover both `"cable"` and `"disconnected"`.
fn is_cable_union(schema: &Value) -> bool {
    let Some(variants) = union_branches(schema) else {
        return false;
    };
    let mut has_cable = false;
    let mut has_disconnected = false;
    for variant in variants {
        for tag in type_tags(variant) {
            match tag.as_str() {
                "cable" => has_cable = true,
                "disconnected" => has_disconnected = true,
                _ => {}
            }
        }
    }
    has_cable && has_disconnected
}

/// Literal values of an object variant's `type` property (`const` or `enum`).
fn type_tags(variant: &Value) -> Vec<String> {
    let Some(tag_schema) = variant
        .get("properties")
        .and_then(|p| p.get("type"))
    else {
        return Vec::new();
    };
    if let Some(tag) = tag_schema.get("const").and_then(Value::as_str) {
        return vec![tag.to_string()];
    }
    if let Some(tags) = tag_schema.get("enum").and_then(Value::as_array) {
        return tags
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    Vec::new()
}

/// A signal array: an array type (tuple or homogeneous) whose elements are
/// all signals.
pub(crate) fn is_signal_array(schema: &Value) -> bool {
    if schema.get("type").and_then(Value::as_str) != Some("array") {
        return false;
    }
    match schema.get("items") {
        // Homogeneous: items is a single schema.
        Some(items @ Value::Object(_)) => is_signal(items),
        // Fixed tuple: items is a non-empty list of schemas.
        Some(Value::Array(items)) => !items.is_empty() && items.iter().all(is_signal),
        _ => false,
    }
}

/// A poly-signal: a two-branch union of one signal and one signal array.
pub(crate) fn is_poly_signal(schema: &Value) -> bool {
    let Some(branches) = union_branches(schema) else {
        return false;
    };
    if branches.len() != 2 {
        return false;
    }
    (is_signal(&branches[0]) && is_signal_array(&branches[1]))
        || (is_signal_array(&branches[0]) && is_signal(&branches[1]))
}

/// String-enum detection: `enum` of strings, or a union of string consts.
fn string_enum_values(schema: &Value) -> Option<Vec<String>> {
    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        let strings: Vec<String> = values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if !strings.is_empty() && strings.len() == values.len() {
            return Some(strings);
        }
        return None;
    }
    let branches = union_branches(schema)?;
    let strings: Vec<String> = branches
        .iter()
        .filter_map(|b| b.get("const").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    if !branches.is_empty() && strings.len() == branches.len() {
        Some(strings)
    } else {
        None
    }
}
