//! Marshalling values between the embedding interpreter and the factories.

use std::collections::BTreeMap;

use patchscript_graph::{
    Collection, CollectionWithRange, DeferredOutput, ModuleOutput, ModuleOutputWithRange,
    ParamValue, SourceLocation,
};

/// A value the embedding interpreter passes into (or receives from) a
/// factory call.
#[derive(Debug, Clone)]
pub enum DslValue {
    /// Absent / undefined. Skipped during parameter assignment.
    Null,
    /// A number.
    Number(f64),
    /// A boolean.
    Bool(bool),
    /// A string.
    Text(String),
    /// A single output.
    Output(ModuleOutput),
    /// A range-aware output.
    RangedOutput(ModuleOutputWithRange),
    /// A collection of outputs.
    Collection(Collection),
    /// A range-aware collection.
    RangedCollection(CollectionWithRange),
    /// A deferred output placeholder.
    Deferred(DeferredOutput),
    /// An ordered list of values.
    List(Vec<DslValue>),
    /// A trailing config object.
    Config(BTreeMap<String, DslValue>),
}

impl DslValue {
    /// Converts into the builder's parameter representation.
    ///
    /// `Null` converts to the disconnected sentinel; callers that want
    /// skip-on-null semantics (factories do) must check first.
    pub fn to_param(&self) -> ParamValue {
        match self {
            DslValue::Null => ParamValue::Disconnected,
            DslValue::Number(n) => ParamValue::Number(*n),
            DslValue::Bool(b) => ParamValue::Bool(*b),
            DslValue::Text(s) => ParamValue::Text(s.clone()),
            DslValue::Output(o) => ParamValue::Output(o.target().clone()),
            DslValue::RangedOutput(o) => ParamValue::Output(o.target().clone()),
            DslValue::Collection(c) => {
                ParamValue::List(c.iter().map(|o| ParamValue::Output(o.target().clone())).collect())
            }
            DslValue::RangedCollection(c) => ParamValue::List(
                c.collection()
                    .iter()
                    .map(|o| ParamValue::Output(o.target().clone()))
                    .collect(),
            ),
            DslValue::Deferred(d) => ParamValue::Deferred(d.id()),
            DslValue::List(items) => {
                ParamValue::List(items.iter().map(DslValue::to_param).collect())
            }
            DslValue::Config(map) => ParamValue::Map(
                map.iter().map(|(k, v)| (k.clone(), v.to_param())).collect(),
            ),
        }
    }
}

impl From<f64> for DslValue {
    fn from(v: f64) -> Self {
        DslValue::Number(v)
    }
}

impl From<bool> for DslValue {
    fn from(v: bool) -> Self {
        DslValue::Bool(v)
    }
}

impl From<&str> for DslValue {
    fn from(v: &str) -> Self {
        DslValue::Text(v.to_string())
    }
}

impl From<String> for DslValue {
    fn from(v: String) -> Self {
        DslValue::Text(v)
    }
}

impl From<ModuleOutput> for DslValue {
    fn from(v: ModuleOutput) -> Self {
        DslValue::Output(v)
    }
}

impl From<ModuleOutputWithRange> for DslValue {
    fn from(v: ModuleOutputWithRange) -> Self {
        DslValue::RangedOutput(v)
    }
}

impl From<Collection> for DslValue {
    fn from(v: Collection) -> Self {
        DslValue::Collection(v)
    }
}

impl From<DeferredOutput> for DslValue {
    fn from(v: DeferredOutput) -> Self {
        DslValue::Deferred(v)
    }
}

/// Best-effort source information for one factory call.
///
/// Interpreters that cannot determine locations (non-stack-trace execution
/// contexts) pass the default; factories tolerate the absence of both
/// fields.
#[derive(Debug, Clone, Default)]
pub struct CallSite {
    /// Position of the call itself.
    pub location: Option<SourceLocation>,
    /// Per-argument source spans, when a span registry is active.
    pub arg_spans: Option<Vec<ArgSpan>>,
}

impl CallSite {
    /// A call site with a known location and no argument spans.
    pub fn at(line: u32, column: u32) -> Self {
        Self {
            location: Some(SourceLocation { line, column }),
            arg_spans: None,
        }
    }
}

/// Source span of one argument expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpan {
    /// Span start.
    pub start: SourceLocation,
    /// Span end (inclusive).
    pub end: SourceLocation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchscript_graph::{
        CompilationConfig, GraphBuilder, OutputRef, UtilityRegistry,
    };
    use patchscript_schema::ProcessedSchemaSet;

    fn graph() -> GraphBuilder {
        GraphBuilder::new(
            ProcessedSchemaSet::default(),
            UtilityRegistry::new(),
            CompilationConfig::default(),
        )
    }

    // --- conversions ---

    #[test]
    fn primitives_convert_directly() {
        assert_eq!(DslValue::Number(1.5).to_param(), ParamValue::Number(1.5));
        assert_eq!(DslValue::Bool(true).to_param(), ParamValue::Bool(true));
        assert_eq!(
            DslValue::Text("x".into()).to_param(),
            ParamValue::Text("x".into())
        );
        assert_eq!(DslValue::Null.to_param(), ParamValue::Disconnected);
    }

    #[test]
    fn outputs_convert_to_structural_references() {
        let output = ModuleOutput::new(graph(), OutputRef::new("osc-1", "sine"));
        assert_eq!(
            DslValue::Output(output).to_param(),
            ParamValue::Output(OutputRef::new("osc-1", "sine"))
        );
    }

    #[test]
    fn collections_convert_to_lists() {
        let collection = Collection::new(
            graph(),
            vec![OutputRef::new("a", "out"), OutputRef::new("b", "out")],
        );
        assert_eq!(
            DslValue::Collection(collection).to_param(),
            ParamValue::List(vec![
                ParamValue::Output(OutputRef::new("a", "out")),
                ParamValue::Output(OutputRef::new("b", "out")),
            ])
        );
    }

    #[test]
    fn nested_lists_convert_recursively() {
        let value = DslValue::List(vec![DslValue::Number(1.0), DslValue::Null]);
        assert_eq!(
            value.to_param(),
            ParamValue::List(vec![ParamValue::Number(1.0), ParamValue::Disconnected])
        );
    }
}
