//! Sizing of implicitly sized arrays after a stage is merged.

use shlink_ir::visit::{self, Node, Visit};
use shlink_ir::{
    Arena, Block, Deref, Handle, Instruction, Shader, StructField, Type, Variable, VariableMode,
};

use crate::diagnostics::InfoLog;
use crate::error::LinkError;

fn fixup_type(ty: &Type, max_access: u32) -> Option<Type> {
    ty.is_unsized_array()
        .then(|| ty.with_array_length(max_access + 1))
}

/// Rebuilds an interface type with its unsized member arrays sized from
/// the per-member maximum accesses.
fn resize_interface_members(ifc: &Type, max_access: &[u32]) -> Option<Type> {
    let Type::Interface {
        name,
        fields,
        packing,
    } = ifc
    else {
        return None;
    };
    if !fields.iter().any(|f| f.ty.is_unsized_array()) {
        return None;
    }
    let fields = fields
        .iter()
        .enumerate()
        .map(|(i, f)| StructField {
            ty: fixup_type(&f.ty, max_access.get(i).copied().unwrap_or(0))
                .unwrap_or_else(|| f.ty.clone()),
            ..f.clone()
        })
        .collect();
    Some(Type::Interface {
        name: name.clone(),
        fields,
        packing: *packing,
    })
}

fn declared_variables(shader: &Shader) -> Vec<Handle<Variable>> {
    let mut handles = Vec::new();
    let _ = visit::walk_shader(shader, &mut |node| {
        if let Node::Instruction(Instruction::Declare(h)) = node {
            handles.push(*h);
        }
        Visit::Continue
    });
    for f in shader.declared_functions() {
        for sig in &shader.functions[f].signatures {
            handles.extend(sig.parameters.iter().copied());
        }
    }
    handles
}

/// Sizes every implicitly sized array from its highest observed access.
///
/// Named block instances (and arrays of them) get their unsized members
/// sized from the per-member accesses. Members of an unnamed block are
/// grouped by block type; once all are sized, the block type is rebuilt
/// from the members' final types and stored on each of them.
pub(crate) fn size_arrays(shader: &mut Shader) {
    // (block type, member variable per field)
    let mut unnamed: Vec<(Type, Vec<Option<Handle<Variable>>>)> = Vec::new();

    for h in declared_variables(shader) {
        let var = &mut shader.variables[h];
        if let Some(sized) = fixup_type(&var.ty, var.max_array_access) {
            log::debug!("sizing `{}' as {sized}", var.name);
            var.ty = sized;
        }

        if var.ty.is_interface() {
            if let Some(new) = resize_interface_members(&var.ty, &var.max_ifc_array_access) {
                var.ty = new.clone();
                var.interface_type = Some(new);
            }
        } else if let Some(ifc) = var.ty.element_type().filter(|t| t.is_interface()) {
            if let Some(new) = resize_interface_members(ifc, &var.max_ifc_array_access) {
                let length = var.ty.array_length().unwrap_or(0);
                var.ty = Type::array(new.clone(), length);
                var.interface_type = Some(new);
            }
        } else if let Some(ifc) = &var.interface_type {
            let Some(field) = ifc.field_index(&var.name) else {
                continue;
            };
            let slot = match unnamed.iter().position(|(t, _)| t == ifc) {
                Some(i) => i,
                None => {
                    unnamed.push((ifc.clone(), vec![None; ifc.fields().len()]));
                    unnamed.len() - 1
                }
            };
            unnamed[slot].1[field] = Some(h);
        }
    }

    for (ifc, members) in unnamed {
        let Type::Interface {
            name,
            fields,
            packing,
        } = ifc
        else {
            continue;
        };
        let mut changed = false;
        let fields: Vec<StructField> = fields
            .into_iter()
            .zip(&members)
            .map(|(field, member)| match member {
                Some(h) if shader.variables[*h].ty != field.ty => {
                    changed = true;
                    StructField {
                        ty: shader.variables[*h].ty.clone(),
                        ..field
                    }
                }
                _ => field,
            })
            .collect();
        if !changed {
            continue;
        }
        let new = Type::Interface {
            name,
            fields,
            packing,
        };
        for h in members.into_iter().flatten() {
            shader.variables[h].interface_type = Some(new.clone());
        }
    }
}

/// Updates the element type recorded on array dereferences to match the
/// current variable types.
pub(crate) fn retype_array_derefs(shader: &mut Shader) {
    fn retype(block: &mut Block, variables: &Arena<Variable>) {
        visit::for_each_deref_mut(block, &mut |deref| {
            if let Deref::Array { array, ty, .. } = deref {
                if let Some(elem) = array.ty(variables).element_type() {
                    *ty = elem.clone();
                }
            }
        });
    }

    let Shader {
        variables,
        functions,
        ir,
        ..
    } = shader;
    retype(ir, variables);
    for (_, function) in functions.iter_mut() {
        for sig in &mut function.signatures {
            retype(&mut sig.body, variables);
        }
    }
}

/// Sizes geometry shader inputs to the vertex count of the input
/// primitive.
///
/// An input declared with a different size, or accessed past the vertex
/// count, is an error. Errors are logged and the remaining inputs are
/// still processed.
pub(crate) fn resize_geometry_inputs(log: &mut InfoLog, shader: &mut Shader, vertices: u32) {
    let globals: Vec<_> = shader.global_variables().collect();
    for h in globals {
        let var = &mut shader.variables[h];
        if var.mode != VariableMode::ShaderIn || !var.ty.is_array() {
            continue;
        }
        let size = var.ty.array_length().unwrap_or(0);
        if size != 0 && size != vertices {
            log.error(LinkError::GeometryInputSize {
                name: var.name.clone(),
                size,
                vertices,
            });
            continue;
        }
        if var.max_array_access >= vertices {
            log.error(LinkError::GeometryInputAccess {
                name: var.name.clone(),
                index: var.max_array_access,
                vertices,
            });
            continue;
        }
        var.ty = var.ty.with_array_length(vertices);
        var.max_array_access = vertices.saturating_sub(1);
    }
    retype_array_derefs(shader);
}

#[cfg(test)]
mod tests {
    use super::*;
    use shlink_ir::{Constant, InterfacePacking, Rvalue, Stage};

    #[test]
    fn unsized_array_sized_from_max_access() {
        let mut sh = Shader::new(Stage::Vertex, 130);
        let a = sh.declare(
            Variable::new("a", Type::unsized_array(Type::VEC4), VariableMode::Uniform)
                .with_max_access(4),
        );
        sh.define_main(vec![]);
        size_arrays(&mut sh);
        assert_eq!(sh.variables[a].ty, Type::array(Type::VEC4, 5));
    }

    #[test]
    fn named_block_members_are_sized() {
        let ifc = Type::Interface {
            name: "Block".into(),
            fields: vec![
                StructField::new("n", Type::INT),
                StructField::new("data", Type::unsized_array(Type::FLOAT)),
            ],
            packing: InterfacePacking::Std140,
        };
        let mut sh = Shader::new(Stage::Fragment, 150);
        let mut inst = Variable::new("blk", ifc.clone(), VariableMode::Uniform);
        inst.interface_type = Some(ifc);
        inst.max_ifc_array_access = vec![0, 7];
        let h = sh.declare(inst);
        size_arrays(&mut sh);
        let var = &sh.variables[h];
        assert_eq!(var.ty.fields()[1].ty, Type::array(Type::FLOAT, 8));
        assert_eq!(var.interface_type.as_ref(), Some(&var.ty));
    }

    #[test]
    fn unnamed_block_type_is_rebuilt_once() {
        let ifc = Type::Interface {
            name: "Unnamed".into(),
            fields: vec![
                StructField::new("xs", Type::unsized_array(Type::FLOAT)),
                StructField::new("y", Type::VEC4),
            ],
            packing: InterfacePacking::Std140,
        };
        let mut sh = Shader::new(Stage::Vertex, 150);
        let mut xs = Variable::new("xs", Type::unsized_array(Type::FLOAT), VariableMode::Uniform)
            .with_max_access(2);
        xs.interface_type = Some(ifc.clone());
        let mut y = Variable::new("y", Type::VEC4, VariableMode::Uniform);
        y.interface_type = Some(ifc);
        let xs = sh.declare(xs);
        let y = sh.declare(y);
        size_arrays(&mut sh);

        let new_ifc = sh.variables[xs].interface_type.clone().unwrap();
        assert_eq!(new_ifc.fields()[0].ty, Type::array(Type::FLOAT, 3));
        assert_eq!(sh.variables[y].interface_type.as_ref(), Some(&new_ifc));
    }

    #[test]
    fn geometry_inputs_resized() {
        let mut sh = Shader::new(Stage::Geometry, 150);
        let color = sh.declare(Variable::new(
            "color",
            Type::unsized_array(Type::VEC4),
            VariableMode::ShaderIn,
        ));
        let out = sh.declare(Variable::new("c", Type::VEC4, VariableMode::ShaderOut));
        sh.define_main(vec![Instruction::assign(
            Deref::Variable(out),
            Rvalue::Deref(Deref::Array {
                array: Box::new(Deref::Variable(color)),
                index: Box::new(Rvalue::Constant(Constant::int(1))),
                ty: Type::Void,
            }),
        )]);
        let mut log = InfoLog::new();
        resize_geometry_inputs(&mut log, &mut sh, 3);
        assert!(!log.has_errors());
        assert_eq!(sh.variables[color].ty, Type::array(Type::VEC4, 3));
        assert_eq!(sh.variables[color].max_array_access, 2);
        let main = sh.main_signature().unwrap();
        let Instruction::Assign { rhs: Rvalue::Deref(Deref::Array { ty, .. }), .. } =
            &sh.signature(main).body[0]
        else {
            panic!("expected an array read");
        };
        assert_eq!(*ty, Type::VEC4);
    }

    #[test]
    fn geometry_input_size_conflicts() {
        let mut sh = Shader::new(Stage::Geometry, 150);
        sh.declare(Variable::new("a", Type::array(Type::VEC4, 2), VariableMode::ShaderIn));
        sh.declare(
            Variable::new("b", Type::unsized_array(Type::VEC4), VariableMode::ShaderIn)
                .with_max_access(5),
        );
        let mut log = InfoLog::new();
        resize_geometry_inputs(&mut log, &mut sh, 3);
        assert!(log.contains("size of array a declared as 2, but number of input vertices is 3"));
        assert!(log.contains("geometry shader accesses element 5 of b, but only 3 input vertices"));
    }
}
