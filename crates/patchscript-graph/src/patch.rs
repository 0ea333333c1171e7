//! The finalized, serializable patch graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scope::TriggerMode;
use crate::value::PatchValue;

/// The compiled patch: module list plus scope subscriptions.
///
/// Modules appear in builder insertion order — the order is part of the
/// contract and is preserved through serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// All module instances, in insertion order.
    pub modules: Vec<PatchModule>,
    /// Scope subscriptions whose targets resolved.
    pub scopes: Vec<PatchScope>,
}

impl Patch {
    /// Looks up a module by ID.
    pub fn module(&self, id: &str) -> Option<&PatchModule> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Iterates over modules of one type.
    pub fn modules_of_type<'a>(
        &'a self,
        module_type: &'a str,
    ) -> impl Iterator<Item = &'a PatchModule> {
        self.modules
            .iter()
            .filter(move |m| m.module_type == module_type)
    }
}

/// One finalized module instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchModule {
    /// Stable module ID.
    pub id: String,
    /// Module type name from the schema set.
    pub module_type: String,
    /// Whether the ID was user-chosen.
    pub id_is_explicit: bool,
    /// Parameter values with every reference resolved.
    pub params: BTreeMap<String, PatchValue>,
}

/// One finalized scope subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchScope {
    /// The watched output.
    pub item: ScopeItem,
    /// Frame duration in milliseconds.
    pub ms_per_frame: f64,
    /// Trigger threshold and render mode, when triggered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_threshold: Option<(f64, TriggerMode)>,
    /// Display value range.
    pub range: (f64, f64),
}

/// Scope target in its serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScopeItem {
    /// A module output port.
    #[serde(rename_all = "camelCase")]
    ModuleOutput {
        /// Owning module's ID.
        module_id: String,
        /// Watched port name.
        port_name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_serializes_to_contract_shape() {
        let scope = PatchScope {
            item: ScopeItem::ModuleOutput {
                module_id: "osc-1".into(),
                port_name: "sine".into(),
            },
            ms_per_frame: 10.0,
            trigger_threshold: Some((0.0, TriggerMode::Wait)),
            range: (-1.0, 1.0),
        };
        assert_eq!(
            serde_json::to_value(&scope).unwrap(),
            json!({
                "item": { "type": "ModuleOutput", "moduleId": "osc-1", "portName": "sine" },
                "msPerFrame": 10.0,
                "triggerThreshold": [0.0, "Wait"],
                "range": [-1.0, 1.0]
            })
        );
    }

    #[test]
    fn untriggered_scope_omits_threshold() {
        let scope = PatchScope {
            item: ScopeItem::ModuleOutput {
                module_id: "a".into(),
                port_name: "b".into(),
            },
            ms_per_frame: 5.0,
            trigger_threshold: None,
            range: (0.0, 1.0),
        };
        let json = serde_json::to_value(&scope).unwrap();
        assert!(json.get("triggerThreshold").is_none());
    }

    #[test]
    fn module_serializes_camel_case() {
        let module = PatchModule {
            id: "osc-1".into(),
            module_type: "osc".into(),
            id_is_explicit: false,
            params: BTreeMap::new(),
        };
        let json = serde_json::to_value(&module).unwrap();
        assert_eq!(json["moduleType"], "osc");
        assert_eq!(json["idIsExplicit"], false);
    }

    #[test]
    fn patch_lookup_helpers() {
        let patch = Patch {
            modules: vec![
                PatchModule {
                    id: "osc-1".into(),
                    module_type: "osc".into(),
                    id_is_explicit: false,
                    params: BTreeMap::new(),
                },
                PatchModule {
                    id: "osc-2".into(),
                    module_type: "osc".into(),
                    id_is_explicit: false,
                    params: BTreeMap::new(),
                },
            ],
            scopes: Vec::new(),
        };
        assert!(patch.module("osc-2").is_some());
        assert!(patch.module("osc-3").is_none());
        assert_eq!(patch.modules_of_type("osc").count(), 2);
    }
}
