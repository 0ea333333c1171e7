//! Finalization: resolving the builder into a serializable [`Patch`].

use std::collections::{BTreeMap, HashMap};

use crate::GraphBuilder;
use crate::builder::{OutGroup, ROOT_CLOCK_ID, ROOT_OUT_ID, StereoOutOptions};
use crate::deferred::{self, DeferredId};
use crate::error::GraphError;
use crate::patch::{Patch, PatchModule, PatchScope, ScopeItem};
use crate::scope::ScopeTarget;
use crate::utility::UtilityKind;
use crate::value::{OutputRef, ParamValue, PatchValue, SignalArg};

impl GraphBuilder {
    /// Finalizes the compilation into a [`Patch`].
    ///
    /// Processes output groups in ascending base-channel order, emits the
    /// root passthrough node (always, source or not), pushes the transport
    /// signals into the root clock when it exists, resolves every deferred
    /// output, and rewrites all parameter trees into their serialized form.
    ///
    /// The builder is logically consumed: calling `to_patch` twice on one
    /// compilation is unsupported.
    pub fn to_patch(&self) -> Result<Patch, GraphError> {
        // Internal consistency check: the utilities finalization relies on
        // must have been registered at construction time.
        {
            let state = self.state.borrow();
            for kind in [
                UtilityKind::Passthrough,
                UtilityKind::Mix,
                UtilityKind::StereoMixer,
                UtilityKind::ScaleAndShift,
            ] {
                state.utilities.require(kind)?;
            }
        }

        // Ascending base-channel order comes from the BTreeMap key order.
        let groups: Vec<(u16, OutGroup)> = {
            let state = self.state.borrow();
            state
                .out_groups
                .iter()
                .flat_map(|(base, groups)| groups.iter().map(|g| (*base, g.clone())))
                .collect()
        };

        let mut mix_inputs: Vec<ParamValue> = Vec::new();
        for (base, group) in groups {
            let channels = self.mix_group(group)?;
            let mut padded = vec![ParamValue::Number(0.0); base as usize];
            padded.extend(channels);
            mix_inputs.push(ParamValue::List(padded));
        }

        let passthrough_type = {
            let state = self.state.borrow();
            state.utilities.require(UtilityKind::Passthrough)?.to_string()
        };
        if mix_inputs.is_empty() {
            // No output groups: the root node still exists, with no source.
            self.add_module(&passthrough_type, Some(ROOT_OUT_ID), None)?;
        } else {
            let output_gain = self.state.borrow().config.output_gain;
            let mixed = self.mix(mix_inputs)?;
            let gained = self.scale_and_shift(mixed.as_param(), output_gain, 0.0)?;
            let root = self.add_module(&passthrough_type, Some(ROOT_OUT_ID), None)?;
            root.set_param("input", gained.as_param())?;
        }
        tracing::debug!("graph_finalize: root node emitted");

        let (has_clock, tempo, run, reset) = {
            let state = self.state.borrow();
            (
                state.module_index.contains_key(ROOT_CLOCK_ID),
                state.config.tempo.clone(),
                state.config.run.clone(),
                state.config.reset.clone(),
            )
        };
        if has_clock {
            self.set_param(ROOT_CLOCK_ID, "tempo", tempo)?;
            self.set_param(ROOT_CLOCK_ID, "run", run)?;
            self.set_param(ROOT_CLOCK_ID, "reset", reset)?;
        }

        let resolved: Vec<Option<OutputRef>> = {
            let state = self.state.borrow();
            (0..state.deferred.len())
                .map(|i| deferred::resolve(&state.deferred, i))
                .collect::<Result<_, _>>()?
        };
        tracing::debug!(
            deferred = resolved.len(),
            "graph_finalize: deferred outputs resolved"
        );

        let mut interpolations = HashMap::new();
        let (modules, scopes) = {
            let state = self.state.borrow();

            let mut modules = Vec::with_capacity(state.modules.len());
            for module in &state.modules {
                let mut params = BTreeMap::new();
                for (name, value) in &module.params {
                    params.insert(
                        name.clone(),
                        finalize_value(value, &resolved, &mut interpolations)?,
                    );
                }
                if let Some(n) = module.channels {
                    let declared = state
                        .schemas
                        .get(&module.module_type)
                        .is_some_and(|s| s.param("channels").is_some());
                    if declared {
                        params
                            .entry("channels".to_string())
                            .or_insert_with(|| PatchValue::volts(f64::from(n)));
                    }
                }
                modules.push(PatchModule {
                    id: module.id.clone(),
                    module_type: module.module_type.clone(),
                    id_is_explicit: module.id_is_explicit,
                    params,
                });
            }

            let mut scopes = Vec::new();
            for registration in &state.scopes {
                let target = match &registration.target {
                    ScopeTarget::Output(r) => Some(r.clone()),
                    // A scope on a never-resolved deferred is dropped, not
                    // an error.
                    ScopeTarget::Deferred(id) => resolved[id.0].clone(),
                };
                let Some(target) = target else { continue };
                scopes.push(PatchScope {
                    item: ScopeItem::ModuleOutput {
                        module_id: target.module,
                        port_name: target.port,
                    },
                    ms_per_frame: registration.ms_per_frame,
                    trigger_threshold: registration.trigger,
                    range: registration.range,
                });
            }

            (modules, scopes)
        };

        self.state.borrow_mut().interpolations = interpolations;
        tracing::debug!(
            modules = modules.len(),
            scopes = scopes.len(),
            "graph_finalize: patch emitted"
        );
        Ok(Patch { modules, scopes })
    }

    /// Mixes one output group down to its channel list.
    fn mix_group(&self, group: OutGroup) -> Result<Vec<ParamValue>, GraphError> {
        match group {
            OutGroup::Stereo { sources, options } => {
                let StereoOutOptions { gain, pan, width } = options;
                let mixer = self.stereo_mix(
                    sources,
                    pan.unwrap_or(SignalArg::Volts(0.0)),
                    width.unwrap_or(SignalArg::Volts(1.0)),
                )?;
                let staged = match gain {
                    Some(g) => self.scale_and_shift(mixer.as_param(), g, 0.0)?,
                    None => mixer,
                };
                let target = staged.target();
                Ok(vec![
                    ParamValue::Output(OutputRef::channel(
                        target.module.clone(),
                        target.port.clone(),
                        0,
                    )),
                    ParamValue::Output(OutputRef::channel(
                        target.module.clone(),
                        target.port.clone(),
                        1,
                    )),
                ])
            }
            OutGroup::Mono { sources, gain } => {
                // Pin hard to one side, then collapse to the first channel.
                let mixer = self.stereo_mix(sources, -1.0, 1.0)?;
                let target = mixer.target();
                let first =
                    OutputRef::channel(target.module.clone(), target.port.clone(), 0);
                let staged = match gain {
                    Some(g) => {
                        let stage =
                            self.scale_and_shift(ParamValue::Output(first), g, 0.0)?;
                        stage.target().clone()
                    }
                    None => first,
                };
                Ok(vec![ParamValue::Output(staged)])
            }
        }
    }
}

/// Rewrites one builder-time value into its serialized form.
fn finalize_value(
    value: &ParamValue,
    resolved: &[Option<OutputRef>],
    interpolations: &mut HashMap<String, String>,
) -> Result<PatchValue, GraphError> {
    match value {
        ParamValue::Number(n) => Ok(PatchValue::volts(*n)),
        ParamValue::Bool(b) => Ok(PatchValue::Bool(*b)),
        ParamValue::Disconnected => Ok(PatchValue::disconnected()),
        ParamValue::Output(r) => Ok(PatchValue::cable(r.clone())),
        // A structural reference to a never-set deferred serializes as
        // disconnected; only string-embedded references are errors.
        ParamValue::Deferred(id) => Ok(match &resolved[id.0] {
            Some(r) => PatchValue::cable(r.clone()),
            None => PatchValue::disconnected(),
        }),
        ParamValue::Text(text) => Ok(PatchValue::Text(substitute(
            text,
            resolved,
            interpolations,
        )?)),
        ParamValue::List(items) => {
            let items = items
                .iter()
                .map(|v| finalize_value(v, resolved, interpolations))
                .collect::<Result<_, _>>()?;
            Ok(PatchValue::List(items))
        }
        ParamValue::Map(map) => {
            let map = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), finalize_value(v, resolved, interpolations)?)))
                .collect::<Result<_, GraphError>>()?;
            Ok(PatchValue::Map(map))
        }
    }
}

/// Substitutes deferred placeholders embedded in a pattern string.
///
/// String substitution has no safe null representation, so an unresolved
/// placeholder here is a hard error. Higher indices are substituted first
/// so `DEFERRED-12` is never clobbered by `DEFERRED-1`.
fn substitute(
    text: &str,
    resolved: &[Option<OutputRef>],
    interpolations: &mut HashMap<String, String>,
) -> Result<String, GraphError> {
    if !text.contains("DEFERRED-") {
        return Ok(text.to_string());
    }
    let mut out = text.to_string();
    for index in (0..resolved.len()).rev() {
        let placeholder = DeferredId(index).to_string();
        if !out.contains(&placeholder) {
            continue;
        }
        match &resolved[index] {
            Some(target) => {
                let replacement = target.to_string();
                interpolations.insert(placeholder.clone(), replacement.clone());
                out = out.replace(&placeholder, &replacement);
            }
            None => return Err(GraphError::UnsetDeferredOutput { placeholder }),
        }
    }
    Ok(out)
}
