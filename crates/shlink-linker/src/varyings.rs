//! Varying location assignment at a stage boundary and the per-stage
//! interface component limits.

use std::collections::HashMap;

use shlink_ir::{Handle, Shader, Stage, Type, Variable, VariableMode};

use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};
use crate::locations::{claim_span, find_available_slots, reserved_above};
use crate::options::Limits;
use crate::transform_feedback::TfbDecl;

const VARYING: &str = "varying";

/// A producer output that needs a slot, with its consumer input if any.
struct Varying {
    output: Handle<Variable>,
    input: Option<Handle<Variable>>,
    slots: u32,
}

fn generic(var: &Variable, mode: VariableMode) -> bool {
    var.mode == mode && !var.is_builtin()
}

/// Assigns locations to the outputs of `producer` read by `consumer` or
/// captured by transform feedback, and resolves the captures.
///
/// Both sides of a matched pair get the same location and stop being
/// unmatched. Without a consumer only captured outputs are assigned.
pub(crate) fn assign_varying_locations(
    log: &mut InfoLog,
    producer: &mut Shader,
    mut consumer: Option<&mut Shader>,
    tfeedback: &mut [TfbDecl],
    max_slots: u32,
) -> Result<(), Halt> {
    let inputs: HashMap<String, Handle<Variable>> = match consumer.as_deref() {
        Some(c) => c
            .global_variables()
            .filter(|&h| generic(&c.variables[h], VariableMode::ShaderIn))
            .map(|h| (c.variables[h].name.clone(), h))
            .collect(),
        None => HashMap::new(),
    };

    let mut used = reserved_above(max_slots);
    let mut to_assign = Vec::new();

    let outputs: Vec<_> = producer
        .global_variables()
        .filter(|&h| generic(&producer.variables[h], VariableMode::ShaderOut))
        .collect();
    for output in outputs {
        let out_var = &producer.variables[output];
        let input = inputs.get(&out_var.name).copied();
        let captured = tfeedback.iter().any(|d| d.var_name == out_var.name);
        if input.is_none() && !captured {
            continue;
        }

        let slots = out_var.ty.count_attribute_slots();
        let explicit = if out_var.explicit_location {
            out_var.location
        } else {
            input.and_then(|h| {
                let in_var = &consumer.as_deref()?.variables[h];
                in_var.explicit_location.then_some(in_var.location).flatten()
            })
        };
        let varying = Varying {
            output,
            input,
            slots,
        };
        match explicit {
            Some(location) => {
                if location >= max_slots {
                    return Err(log.error(LinkError::InvalidExplicitLocation {
                        location,
                        name: out_var.name.clone(),
                    }));
                }
                if !claim_span(&mut used, location, slots) {
                    return Err(log.error(LinkError::InsufficientLocations {
                        target: VARYING,
                        name: out_var.name.clone(),
                    }));
                }
                set_location(producer, consumer.as_deref_mut(), &varying, location);
            }
            None => to_assign.push(varying),
        }
    }

    // Largest spans first; equal spans keep declaration order.
    to_assign.sort_by(|a, b| b.slots.cmp(&a.slots));

    for varying in &to_assign {
        let Some(location) = find_available_slots(used, varying.slots) else {
            return Err(log.error(LinkError::InsufficientLocations {
                target: VARYING,
                name: producer.variables[varying.output].name.clone(),
            }));
        };
        claim_span(&mut used, location, varying.slots);
        set_location(producer, consumer.as_deref_mut(), varying, location);
    }

    for decl in tfeedback.iter_mut() {
        decl.assign_location(log, producer)?;
    }
    Ok(())
}

fn set_location(
    producer: &mut Shader,
    consumer: Option<&mut Shader>,
    varying: &Varying,
    location: u32,
) {
    let out_var = &mut producer.variables[varying.output];
    log::debug!("varying `{}' assigned location {location}", out_var.name);
    out_var.location = Some(location);
    out_var.is_unmatched_generic_inout = false;
    if let (Some(consumer), Some(input)) = (consumer, varying.input) {
        let in_var = &mut consumer.variables[input];
        in_var.location = Some(location);
        in_var.is_unmatched_generic_inout = false;
    }
}

fn located_components<'a>(
    shader: &'a Shader,
    mode: VariableMode,
    slot_type: impl Fn(&'a Type) -> &'a Type,
) -> u32 {
    shader
        .global_variables()
        .map(|h| &shader.variables[h])
        .filter(|v| generic(v, mode) && v.location.is_some())
        .map(|v| slot_type(&v.ty).count_attribute_slots() * 4)
        .sum()
}

/// Checks the generic output components of `shader` against its stage
/// limit.
pub(crate) fn check_against_output_limit(
    log: &mut InfoLog,
    shader: &Shader,
    limits: &Limits,
) -> Result<(), Halt> {
    let used = located_components(shader, VariableMode::ShaderOut, |ty| ty);
    let max = limits.max_output_components[shader.stage.index()];
    if used > max {
        return Err(log.error(LinkError::TooManyOutputComponents {
            stage: shader.stage,
            used,
            max,
        }));
    }
    Ok(())
}

/// Checks the generic input components of `shader` against its stage
/// limit. Geometry inputs count one vertex.
pub(crate) fn check_against_input_limit(
    log: &mut InfoLog,
    shader: &Shader,
    limits: &Limits,
) -> Result<(), Halt> {
    let per_vertex = shader.stage == Stage::Geometry;
    let used = located_components(shader, VariableMode::ShaderIn, |ty| {
        if per_vertex {
            ty.element_type().unwrap_or(ty)
        } else {
            ty
        }
    });
    let max = limits.max_input_components[shader.stage.index()];
    if used > max {
        return Err(log.error(LinkError::TooManyInputComponents {
            stage: shader.stage,
            used,
            max,
        }));
    }
    Ok(())
}
