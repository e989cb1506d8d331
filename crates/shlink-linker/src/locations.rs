//! Generic location allocation for vertex inputs and fragment outputs.

use std::collections::HashMap;

use shlink_ir::{Handle, Shader, Stage, Variable, VariableMode};

use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};
use crate::stage_validate::find_deref;

fn span_mask(slots: u32) -> u32 {
    if slots >= u32::BITS {
        u32::MAX
    } else {
        (1u32 << slots) - 1
    }
}

/// Mask with every slot at or above `max` set.
pub(crate) fn reserved_above(max: u32) -> u32 {
    !span_mask(max.min(u32::BITS))
}

/// Finds the lowest base of `needed` contiguous clear bits in `used`.
///
/// Returns `None` for `needed == 0`, for `needed > 32`, and when no such
/// run exists.
pub fn find_available_slots(used: u32, needed: u32) -> Option<u32> {
    if needed == 0 || needed > u32::BITS {
        return None;
    }
    let needed_mask = span_mask(needed);
    (0..=u32::BITS - needed).find(|&base| used & (needed_mask << base) == 0)
}

/// Marks the span `[location, location + slots)` in `used`.
///
/// Returns `false` if any slot is already taken or lies past bit 31.
pub(crate) fn claim_span(used: &mut u32, location: u32, slots: u32) -> bool {
    if slots == 0 {
        return true;
    }
    if location.checked_add(slots).is_none_or(|end| end > u32::BITS) {
        return false;
    }
    let span = span_mask(slots) << location;
    if *used & span != 0 {
        return false;
    }
    *used |= span;
    true
}

/// Which interface the allocator assigns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AttributeTarget {
    VertexInputs,
    FragmentOutputs,
}

impl AttributeTarget {
    fn mode(self) -> VariableMode {
        match self {
            Self::VertexInputs => VariableMode::ShaderIn,
            Self::FragmentOutputs => VariableMode::ShaderOut,
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::VertexInputs => "vertex shader input",
            Self::FragmentOutputs => "fragment shader output",
        }
    }
}

/// Application binding tables consulted for variables without an explicit
/// location.
pub(crate) struct Bindings<'a> {
    pub(crate) locations: &'a HashMap<String, u32>,
    pub(crate) indices: &'a HashMap<String, u32>,
}

/// Assigns generic locations to vertex shader inputs or fragment shader
/// outputs. Built-ins are not allocated.
pub(crate) fn assign_attribute_or_color_locations(
    log: &mut InfoLog,
    shader: &mut Shader,
    target: AttributeTarget,
    max: u32,
    bindings: Bindings<'_>,
) -> Result<(), Halt> {
    let mut used = reserved_above(max);
    let mut to_assign: Vec<(u32, Handle<Variable>)> = Vec::new();

    let globals: Vec<_> = shader.global_variables().collect();
    for h in globals {
        let var = &mut shader.variables[h];
        if var.mode != target.mode() || var.is_builtin() {
            continue;
        }

        if var.explicit_location {
            if let Some(location) = var.location.filter(|&l| l >= max) {
                return Err(log.error(LinkError::InvalidExplicitLocation {
                    location,
                    name: var.name.clone(),
                }));
            }
        } else if let Some(&binding) = bindings.locations.get(&var.name) {
            var.location = Some(binding);
            var.is_unmatched_generic_inout = false;
            if target == AttributeTarget::FragmentOutputs {
                var.index = bindings.indices.get(&var.name).copied().unwrap_or(0);
            }
        }

        let slots = var.ty.count_attribute_slots();
        match var.location {
            Some(location) => {
                // Outputs with a dual-source index share their draw buffer
                // with index 0 and are not counted again.
                if var.index == 0 && !claim_span(&mut used, location, slots) {
                    return Err(log.error(LinkError::InsufficientLocations {
                        target: target.description(),
                        name: var.name.clone(),
                    }));
                }
            }
            None => to_assign.push((slots, h)),
        }
    }

    if to_assign.is_empty() {
        return Ok(());
    }

    // Largest spans first; equal spans keep declaration order.
    to_assign.sort_by(|a, b| b.0.cmp(&a.0));

    if target == AttributeTarget::VertexInputs && find_deref(shader, "gl_Vertex") {
        used |= 1;
    }

    for (slots, h) in to_assign {
        let var = &mut shader.variables[h];
        let Some(location) = find_available_slots(used, slots) else {
            return Err(log.error(LinkError::InsufficientLocations {
                target: target.description(),
                name: var.name.clone(),
            }));
        };
        log::debug!("{} `{}' assigned location {location}", target.description(), var.name);
        var.location = Some(location);
        var.is_unmatched_generic_inout = false;
        used |= span_mask(slots) << location;
    }
    Ok(())
}

/// Resets generic locations before allocation.
///
/// Variables without an explicit location lose their location and are
/// marked unmatched; explicit locations and built-ins count as matched.
pub(crate) fn link_invalidate_variable_locations(shader: &mut Shader) {
    let globals: Vec<_> = shader.global_variables().collect();
    for h in globals {
        let var = &mut shader.variables[h];
        if !var.mode.is_interface() {
            continue;
        }
        if var.explicit_location || var.is_builtin() {
            var.is_unmatched_generic_inout = false;
        } else {
            var.location = None;
            var.is_unmatched_generic_inout = true;
        }
    }
}

/// Demotes inputs or outputs still unmatched after allocation to ordinary
/// globals so dead-code elimination can drop them.
pub(crate) fn demote_shader_inputs_and_outputs(shader: &mut Shader, mode: VariableMode) {
    let globals: Vec<_> = shader.global_variables().collect();
    for h in globals {
        let var = &mut shader.variables[h];
        if var.mode == mode && var.is_unmatched_generic_inout {
            log::debug!("demoting unmatched {} `{}'", var.mode_string(), var.name);
            var.mode = VariableMode::Auto;
        }
    }
}

/// Depth layout of the fragment shader's `gl_FragDepth` output.
pub(crate) fn frag_depth_layout(shader: &Shader) -> shlink_ir::DepthLayout {
    debug_assert_eq!(shader.stage, Stage::Fragment);
    shader
        .global_variables()
        .map(|h| &shader.variables[h])
        .find(|v| v.mode == VariableMode::ShaderOut && v.name == "gl_FragDepth")
        .map(|v| v.depth_layout)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shlink_ir::{Deref, Instruction, Rvalue, Type};

    fn no_bindings() -> HashMap<String, u32> {
        HashMap::new()
    }

    #[test]
    fn slot_search_boundaries() {
        assert_eq!(find_available_slots(0, 0), None);
        assert_eq!(find_available_slots(0, 33), None);
        assert_eq!(find_available_slots(0, 32), Some(0));
        assert_eq!(find_available_slots(1, 32), None);
        assert_eq!(find_available_slots(u32::MAX, 1), None);
        assert_eq!(find_available_slots(0b1011, 1), Some(2));
        assert_eq!(find_available_slots(0b0110, 2), Some(3));
        assert_eq!(find_available_slots(!(1 << 31), 1), Some(31));
    }

    #[test]
    fn slot_search_is_deterministic() {
        for used in [0u32, 0x0f0f_0f0f, 0xdead_beef, 0x8000_0001] {
            for needed in 1..=4 {
                assert_eq!(
                    find_available_slots(used, needed),
                    find_available_slots(used, needed)
                );
            }
        }
    }

    #[test]
    fn claim_rejects_overlap_and_overflow() {
        let mut used = 0;
        assert!(claim_span(&mut used, 2, 2));
        assert_eq!(used, 0b1100);
        assert!(!claim_span(&mut used, 3, 1));
        assert!(!claim_span(&mut used, 31, 2));
        assert!(claim_span(&mut used, 40, 0));
    }

    fn vertex_with(vars: Vec<Variable>) -> Shader {
        let mut sh = Shader::new(Stage::Vertex, 130);
        for v in vars {
            sh.declare(v);
        }
        sh.define_main(vec![]);
        link_invalidate_variable_locations(&mut sh);
        sh
    }

    fn input(name: &str, ty: Type) -> Variable {
        Variable::new(name, ty, VariableMode::ShaderIn)
    }

    fn location_of(sh: &Shader, name: &str) -> Option<u32> {
        sh.find_variable(name).and_then(|v| v.location)
    }

    #[test]
    fn largest_spans_first_then_declaration_order() {
        let mut sh = vertex_with(vec![
            input("a", Type::VEC4),
            input("m", Type::MAT4),
            input("b", Type::VEC2),
        ]);
        let mut log = InfoLog::new();
        let locations = no_bindings();
        let indices = no_bindings();
        assign_attribute_or_color_locations(
            &mut log,
            &mut sh,
            AttributeTarget::VertexInputs,
            16,
            Bindings {
                locations: &locations,
                indices: &indices,
            },
        )
        .unwrap();
        assert_eq!(location_of(&sh, "m"), Some(0));
        assert_eq!(location_of(&sh, "a"), Some(4));
        assert_eq!(location_of(&sh, "b"), Some(5));
        assert!(!sh.find_variable("a").unwrap().is_unmatched_generic_inout);
    }

    #[test]
    fn explicit_and_bound_locations() {
        let mut sh = vertex_with(vec![
            input("fixed", Type::VEC4).with_location(0),
            input("bound", Type::VEC4),
            input("free", Type::VEC4),
        ]);
        let mut locations = no_bindings();
        locations.insert("bound".into(), 1);
        let indices = no_bindings();
        let mut log = InfoLog::new();
        assign_attribute_or_color_locations(
            &mut log,
            &mut sh,
            AttributeTarget::VertexInputs,
            16,
            Bindings {
                locations: &locations,
                indices: &indices,
            },
        )
        .unwrap();
        assert_eq!(location_of(&sh, "fixed"), Some(0));
        assert_eq!(location_of(&sh, "bound"), Some(1));
        assert_eq!(location_of(&sh, "free"), Some(2));
    }

    #[test]
    fn explicit_location_out_of_range() {
        let mut sh = vertex_with(vec![input("x", Type::VEC4).with_location(16)]);
        let (locations, indices) = (no_bindings(), no_bindings());
        let mut log = InfoLog::new();
        let result = assign_attribute_or_color_locations(
            &mut log,
            &mut sh,
            AttributeTarget::VertexInputs,
            16,
            Bindings {
                locations: &locations,
                indices: &indices,
            },
        );
        assert!(result.is_err());
        assert!(log.contains("invalid explicit location 16 specified for `x'"));
    }

    #[test]
    fn exhausted_locations() {
        let mut sh = vertex_with(vec![
            input("m1", Type::MAT4),
            input("m2", Type::MAT4),
            input("v", Type::VEC4),
        ]);
        let (locations, indices) = (no_bindings(), no_bindings());
        let mut log = InfoLog::new();
        let result = assign_attribute_or_color_locations(
            &mut log,
            &mut sh,
            AttributeTarget::VertexInputs,
            8,
            Bindings {
                locations: &locations,
                indices: &indices,
            },
        );
        assert!(result.is_err());
        assert!(log.contains("insufficient contiguous locations available for vertex shader input `v'"));
    }

    #[test]
    fn gl_vertex_reserves_slot_zero() {
        let mut sh = Shader::new(Stage::Vertex, 120);
        let gl_vertex = sh.declare(input("gl_Vertex", Type::VEC4));
        sh.declare(input("attr", Type::VEC4));
        let pos = sh.declare(Variable::new("gl_Position", Type::VEC4, VariableMode::ShaderOut));
        sh.define_main(vec![Instruction::assign(
            Deref::Variable(pos),
            Rvalue::var(gl_vertex),
        )]);
        link_invalidate_variable_locations(&mut sh);
        let (locations, indices) = (no_bindings(), no_bindings());
        let mut log = InfoLog::new();
        assign_attribute_or_color_locations(
            &mut log,
            &mut sh,
            AttributeTarget::VertexInputs,
            16,
            Bindings {
                locations: &locations,
                indices: &indices,
            },
        )
        .unwrap();
        assert_eq!(location_of(&sh, "attr"), Some(1));
        assert_eq!(location_of(&sh, "gl_Vertex"), None);
    }

    #[test]
    fn dual_source_index_shares_draw_buffer() {
        let mut sh = Shader::new(Stage::Fragment, 330);
        sh.declare(Variable::new("color0", Type::VEC4, VariableMode::ShaderOut));
        sh.declare(Variable::new("color1", Type::VEC4, VariableMode::ShaderOut));
        sh.define_main(vec![]);
        link_invalidate_variable_locations(&mut sh);
        let mut locations = no_bindings();
        locations.insert("color0".into(), 0);
        locations.insert("color1".into(), 0);
        let mut indices = no_bindings();
        indices.insert("color1".into(), 1);
        let mut log = InfoLog::new();
        assign_attribute_or_color_locations(
            &mut log,
            &mut sh,
            AttributeTarget::FragmentOutputs,
            8,
            Bindings {
                locations: &locations,
                indices: &indices,
            },
        )
        .unwrap();
        assert_eq!(sh.find_variable("color1").unwrap().index, 1);
        assert_eq!(location_of(&sh, "color1"), Some(0));
    }

    #[test]
    fn demotion_and_frag_depth() {
        let mut sh = Shader::new(Stage::Fragment, 130);
        let mut depth = Variable::new("gl_FragDepth", Type::FLOAT, VariableMode::ShaderOut);
        depth.depth_layout = shlink_ir::DepthLayout::Greater;
        sh.declare(depth);
        sh.declare(input("unused", Type::VEC4));
        sh.define_main(vec![]);
        link_invalidate_variable_locations(&mut sh);
        demote_shader_inputs_and_outputs(&mut sh, VariableMode::ShaderIn);
        assert_eq!(sh.find_variable("unused").unwrap().mode, VariableMode::Auto);
        assert_eq!(
            sh.find_variable("gl_FragDepth").unwrap().mode,
            VariableMode::ShaderOut
        );
        assert_eq!(frag_depth_layout(&sh), shlink_ir::DepthLayout::Greater);
    }
}
