//! Validation of interface blocks shared between units and stages.

use std::collections::HashMap;

use shlink_ir::{Shader, Type, VariableMode};

use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};

/// Two block definitions match when their members agree, allowing an
/// implicitly sized member array to match a sized one.
fn definitions_match(a: &Type, b: &Type) -> bool {
    let (
        Type::Interface {
            name: name_a,
            fields: fields_a,
            packing: packing_a,
        },
        Type::Interface {
            name: name_b,
            fields: fields_b,
            packing: packing_b,
        },
    ) = (a, b)
    else {
        return false;
    };
    name_a == name_b
        && packing_a == packing_b
        && fields_a.len() == fields_b.len()
        && fields_a.iter().zip(fields_b).all(|(x, y)| {
            x.name == y.name
                && x.row_major == y.row_major
                && (x.ty == y.ty
                    || (x.ty.is_array()
                        && y.ty.is_array()
                        && x.ty.element_type() == y.ty.element_type()
                        && (x.ty.is_unsized_array() || y.ty.is_unsized_array())))
        })
}

fn block_of(mode: VariableMode, ty: &Option<Type>) -> Option<(VariableMode, &Type)> {
    match mode {
        VariableMode::ShaderIn | VariableMode::ShaderOut | VariableMode::Uniform => {
            ty.as_ref().map(|t| (mode, t))
        }
        _ => None,
    }
}

/// Checks that every unit of one stage declares same-named blocks alike.
pub(crate) fn validate_intrastage_interface_blocks(
    log: &mut InfoLog,
    units: &[&Shader],
) -> Result<(), Halt> {
    let mut seen: HashMap<(VariableMode, String), &Type> = HashMap::new();
    for unit in units {
        for h in unit.global_variables() {
            let var = &unit.variables[h];
            let Some((mode, ty)) = block_of(var.mode, &var.interface_type) else {
                continue;
            };
            let Some(name) = ty.type_name() else {
                continue;
            };
            match seen.get(&(mode, name.to_string())) {
                Some(first) if !definitions_match(first, ty) => {
                    return Err(log.error(LinkError::InterfaceBlockMismatch(name.to_string())));
                }
                Some(_) => {}
                None => {
                    seen.insert((mode, name.to_string()), ty);
                }
            }
        }
    }
    Ok(())
}

/// Checks the output blocks of `producer` against the input blocks of
/// `consumer` with the same block name.
pub(crate) fn validate_interstage_interface_blocks(
    log: &mut InfoLog,
    producer: &Shader,
    consumer: &Shader,
) -> Result<(), Halt> {
    let mut outputs: HashMap<&str, &Type> = HashMap::new();
    for h in producer.global_variables() {
        let var = &producer.variables[h];
        if var.mode != VariableMode::ShaderOut {
            continue;
        }
        if let Some(ty) = &var.interface_type {
            if let Some(name) = ty.type_name() {
                outputs.insert(name, ty);
            }
        }
    }

    for h in consumer.global_variables() {
        let var = &consumer.variables[h];
        if var.mode != VariableMode::ShaderIn {
            continue;
        }
        let Some(ty) = &var.interface_type else {
            continue;
        };
        let Some(name) = ty.type_name() else {
            continue;
        };
        if let Some(out) = outputs.get(name) {
            if !definitions_match(out, ty) {
                return Err(log.error(LinkError::InterfaceBlockMismatch(name.to_string())));
            }
        }
    }
    Ok(())
}
