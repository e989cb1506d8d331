//! Merging the translation units of one stage into a stage executable.

use shlink_ir::{GeometryLayout, Instruction, Shader, Stage, VariableMode};
use shlink_opt::validate_ir_tree;

use crate::array_sizing::{resize_geometry_inputs, size_arrays};
use crate::cross_validate::cross_validate_globals;
use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};
use crate::functions::{check_multiply_defined, link_function_calls};
use crate::interface_blocks::validate_intrastage_interface_blocks;
use crate::options::Limits;
use crate::remap::IrCloner;
use crate::uniform_blocks::link_uniform_blocks;

/// Folds the geometry layout qualifiers declared by the units.
///
/// Only geometry shaders at version 150 or later carry layouts; for them
/// every qualifier must be declared by some unit, and all declarations of
/// one qualifier must agree.
fn fold_geometry_layout(
    log: &mut InfoLog,
    stage: Stage,
    version: u32,
    units: &[&Shader],
) -> GeometryLayout {
    let mut layout = GeometryLayout::default();
    if stage != Stage::Geometry || version < 150 {
        return layout;
    }

    for unit in units {
        let declared = unit.geometry;
        if let Some(input) = declared.input {
            if layout.input.is_some_and(|prev| prev != input) {
                log.error(LinkError::ConflictingGeometryInput);
                return layout;
            }
            layout.input = Some(input);
        }
        if let Some(output) = declared.output {
            if layout.output.is_some_and(|prev| prev != output) {
                log.error(LinkError::ConflictingGeometryOutput);
                return layout;
            }
            layout.output = Some(output);
        }
        if let Some(count) = declared.vertices_out {
            if let Some(prev) = layout.vertices_out.filter(|&prev| prev != count) {
                log.error(LinkError::ConflictingVerticesOut(prev, count));
                return layout;
            }
            layout.vertices_out = Some(count);
        }
    }

    if layout.input.is_none() {
        log.error(LinkError::MissingGeometryInput);
    } else if layout.output.is_none() {
        log.error(LinkError::MissingGeometryOutput);
    } else if layout.vertices_out.is_none() {
        log.error(LinkError::MissingMaxVertices);
    }
    layout
}

fn is_global_declaration(shader: &Shader, inst: &Instruction) -> bool {
    match inst {
        Instruction::Function(_) => true,
        Instruction::Declare(h) => shader.variables[*h].mode != VariableMode::Temporary,
        _ => false,
    }
}

/// Moves top-level statements (and temporaries) into the start of `main`.
///
/// The main unit's own statements come first, moved in place; those of
/// the other units follow, cloned in unit order. The symbol table is
/// rebuilt from the remaining global declarations before cloning.
fn move_non_declarations(linked: &mut Shader, main_unit: &Shader, units: &[&Shader]) {
    let Some(main) = linked.main_signature() else {
        return;
    };
    let top = std::mem::take(&mut linked.ir);
    let (decls, mut moved): (Vec<_>, Vec<_>) = top
        .into_iter()
        .partition(|inst| is_global_declaration(linked, inst));
    linked.ir = decls;
    linked.populate_symbol_table();

    for unit in units.iter().copied() {
        if std::ptr::eq(unit, main_unit) {
            continue;
        }
        let mut cloner = IrCloner::new(unit);
        for inst in &unit.ir {
            if is_global_declaration(unit, inst) {
                continue;
            }
            if let Some(cloned) = cloner.instruction(linked, inst) {
                moved.push(cloned);
            }
        }
    }

    if moved.is_empty() {
        return;
    }
    let body = &mut linked.signature_mut(main).body;
    moved.append(body);
    *body = moved;
}

/// Links the translation units of `stage` into one executable.
///
/// `version` is the program's language version.
pub(crate) fn link_intrastage_shaders(
    log: &mut InfoLog,
    stage: Stage,
    units: &[&Shader],
    version: u32,
    limits: &Limits,
) -> Result<Shader, Halt> {
    log::debug!("linking {} {stage} shader unit(s)", units.len());

    let resolutions = cross_validate_globals(log, units, false)?;
    validate_intrastage_interface_blocks(log, units)?;
    let blocks = link_uniform_blocks(log, units, limits.max_uniform_block_size)?;
    check_multiply_defined(log, units)?;

    let Some(main_unit) = units.iter().copied().find(|u| u.main_signature().is_some()) else {
        return Err(log.error(LinkError::MissingMain(stage)));
    };

    let mark = log.error_count();
    let mut linked = main_unit.clone();
    linked.builtins_to_link.clear();
    linked.uniform_blocks = blocks;
    linked.geometry = fold_geometry_layout(log, stage, version, units);
    move_non_declarations(&mut linked, main_unit, units);

    let libraries: Vec<&Shader> = units
        .iter()
        .copied()
        .chain(
            units
                .iter()
                .flat_map(|&u| u.builtins_to_link.iter().map(|b| &**b)),
        )
        .collect();
    link_function_calls(log, &mut linked, &libraries)?;
    resolutions.apply(&mut linked);

    for err in validate_ir_tree(&linked) {
        log::warn!("linked {stage} shader: {err}");
    }

    if let Some(input) = linked.geometry.input.filter(|_| stage == Stage::Geometry) {
        resize_geometry_inputs(log, &mut linked, input.vertices());
    }
    size_arrays(&mut linked);

    log.halt_if_errors_since(mark)?;
    Ok(linked)
}
