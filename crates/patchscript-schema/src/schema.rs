//! Raw module schema types as supplied by the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw module schema describing one instantiable module type.
///
/// Supplied once per compilation and treated as read-only. The `params`
/// field is a constrained JSON-Schema-like structure (objects, `oneOf` /
/// `anyOf` unions, `allOf` merges, local `$ref` pointers, `const` / `enum`
/// tags) that [`crate::process::ProcessedModuleSchema`] classifies.
///
/// # Example
///
/// ```rust
/// use patchscript_schema::ModuleSchema;
///
/// let schema: ModuleSchema = serde_json::from_value(serde_json::json!({
///     "name": "osc",
///     "args": [{ "name": "frequency" }],
///     "params": { "properties": { "frequency": { "type": "number" } } },
///     "outputs": [{ "name": "sine", "default": true }]
/// })).unwrap();
///
/// assert_eq!(schema.name, "osc");
/// assert_eq!(schema.args[0].name, "frequency");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleSchema {
    /// Module type name. Dot-separated names become nested DSL namespaces
    /// (e.g. `"fx.delay"`).
    pub name: String,

    /// Ordered positional-argument descriptors. A factory call assigns its
    /// leading arguments to these names in order.
    #[serde(default)]
    pub args: Vec<ArgDescriptor>,

    /// Structural parameter schema. `properties` maps parameter names to
    /// their shape; `required` lists mandatory ones.
    #[serde(default)]
    pub params: Value,

    /// Declared output ports, in declaration order.
    #[serde(default)]
    pub outputs: Vec<OutputDescriptor>,
}

/// One positional argument accepted by a module factory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArgDescriptor {
    /// Parameter name the positional argument is assigned to.
    pub name: String,
}

/// One output port declared by a module schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputDescriptor {
    /// Port name (e.g. `"sine"`, `"main"`).
    pub name: String,

    /// Whether the port fans out polyphonically.
    #[serde(default)]
    pub poly: bool,

    /// Declared lower bound of the port's value range, if any.
    #[serde(default)]
    pub min_value: Option<f64>,

    /// Declared upper bound of the port's value range, if any.
    #[serde(default)]
    pub max_value: Option<f64>,

    /// Marks the port a factory call returns as its base value when the
    /// schema declares several outputs.
    #[serde(default)]
    pub default: bool,
}

impl OutputDescriptor {
    /// Returns the declared (min, max) range when both bounds are present.
    pub fn range(&self) -> Option<(f64, f64)> {
        match (self.min_value, self.max_value) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }
}
