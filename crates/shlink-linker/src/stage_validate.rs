//! Per-stage semantic rules checked on linked executables.

use shlink_ir::visit::{self, Node, Visit};
use shlink_ir::{Deref, Instruction, PrimitiveType, Rvalue, Shader, Stage};

use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};
use crate::program::{GeometryInfo, VertexInfo};

/// The dereference an lvalue-shaped argument writes through, if any.
fn referenced_deref(value: &Rvalue) -> Option<&Deref> {
    match value {
        Rvalue::Deref(d) => Some(d),
        Rvalue::Swizzle { value, .. } => referenced_deref(value),
        _ => None,
    }
}

/// Returns `true` if `shader` statically writes the variable `name`.
///
/// Writes are assignments, `out`/`inout` call arguments and call return
/// slots.
pub fn find_assignment(shader: &Shader, name: &str) -> bool {
    let named = |d: &Deref| shader.variables[d.variable_referenced()].name == name;
    visit::walk_shader(shader, &mut |node| match node {
        Node::Instruction(Instruction::Assign { lhs, .. }) => {
            if named(lhs) {
                Visit::Stop
            } else {
                Visit::SkipChildren
            }
        }
        Node::Instruction(Instruction::Call {
            callee,
            arguments,
            result,
        }) => {
            let params = &shader.signature(*callee).parameters;
            let through_param = arguments.iter().zip(params).any(|(arg, &p)| {
                shader.variables[p].mode.is_writable_parameter()
                    && referenced_deref(arg).is_some_and(|d| named(d))
            });
            if through_param || result.as_ref().is_some_and(|d| named(d)) {
                Visit::Stop
            } else {
                Visit::SkipChildren
            }
        }
        _ => Visit::Continue,
    })
    .is_break()
}

/// Returns `true` if `shader` dereferences the variable `name` anywhere.
pub fn find_deref(shader: &Shader, name: &str) -> bool {
    visit::walk_shader(shader, &mut |node| match node {
        Node::Deref(Deref::Variable(h)) if shader.variables[*h].name == name => Visit::Stop,
        _ => Visit::Continue,
    })
    .is_break()
}

fn find_end_primitive(shader: &Shader) -> bool {
    visit::walk_shader(shader, &mut |node| match node {
        Node::Instruction(Instruction::EndPrimitive) => Visit::Stop,
        _ => Visit::Continue,
    })
    .is_break()
}

/// Clip distance usage and array size of a vertex or geometry shader.
fn analyze_clip_usage(
    log: &mut InfoLog,
    shader: &Shader,
    version: u32,
    is_es: bool,
) -> Result<(bool, u32), Halt> {
    if is_es || version < 130 {
        return Ok((false, 0));
    }
    let clip_vertex = find_assignment(shader, "gl_ClipVertex");
    let clip_distance = find_assignment(shader, "gl_ClipDistance");
    if clip_vertex && clip_distance {
        return Err(log.error(LinkError::ClipVertexAndDistance(shader.stage)));
    }
    let size = shader
        .find_variable("gl_ClipDistance")
        .and_then(|v| v.ty.array_length())
        .unwrap_or(0);
    Ok((clip_distance, size))
}

/// Below version 140 (ES: 300) a vertex shader must write `gl_Position`.
pub(crate) fn validate_vertex_shader(
    log: &mut InfoLog,
    shader: &Shader,
    version: u32,
    is_es: bool,
) -> Result<VertexInfo, Halt> {
    let required_below = if is_es { 300 } else { 140 };
    if version < required_below && !find_assignment(shader, "gl_Position") {
        return Err(log.error(LinkError::MissingPositionWrite));
    }
    let (uses_clip_distance, clip_distance_array_size) =
        analyze_clip_usage(log, shader, version, is_es)?;
    Ok(VertexInfo {
        uses_clip_distance,
        clip_distance_array_size,
    })
}

pub(crate) fn validate_fragment_shader(log: &mut InfoLog, shader: &Shader) -> Result<(), Halt> {
    if find_assignment(shader, "gl_FragColor") && find_assignment(shader, "gl_FragData") {
        return Err(log.error(LinkError::FragColorAndData));
    }
    Ok(())
}

pub(crate) fn validate_geometry_shader(
    log: &mut InfoLog,
    shader: &Shader,
    version: u32,
    is_es: bool,
) -> Result<GeometryInfo, Halt> {
    let layout = shader.geometry;
    let (uses_clip_distance, clip_distance_array_size) =
        analyze_clip_usage(log, shader, version, is_es)?;
    Ok(GeometryInfo {
        vertices_in: layout.input.map(PrimitiveType::vertices).unwrap_or(0),
        input_type: layout.input,
        output_type: layout.output,
        vertices_out: layout.vertices_out,
        uses_clip_distance,
        clip_distance_array_size,
        uses_end_primitive: find_end_primitive(shader),
    })
}

/// Dispatches to the validator of the shader's stage.
pub(crate) fn validate_stage(
    log: &mut InfoLog,
    shader: &Shader,
    version: u32,
    is_es: bool,
) -> Result<StageInfo, Halt> {
    Ok(match shader.stage {
        Stage::Vertex => StageInfo::Vertex(validate_vertex_shader(log, shader, version, is_es)?),
        Stage::Geometry => {
            StageInfo::Geometry(validate_geometry_shader(log, shader, version, is_es)?)
        }
        Stage::Fragment => {
            validate_fragment_shader(log, shader)?;
            StageInfo::Fragment
        }
    })
}

pub(crate) enum StageInfo {
    Vertex(VertexInfo),
    Geometry(GeometryInfo),
    Fragment,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shlink_ir::{Constant, Rvalue, Signature, Type, Variable, VariableMode};

    fn vec4_zero() -> Rvalue {
        Rvalue::Constant(Constant::floats(Type::VEC4, vec![0.0; 4]))
    }

    fn fragment_writing(names: &[&str]) -> Shader {
        let mut sh = Shader::new(Stage::Fragment, 120);
        let mut body = Vec::new();
        for name in names {
            let h = sh.declare(Variable::new(*name, Type::VEC4, VariableMode::ShaderOut));
            body.push(Instruction::assign(Deref::Variable(h), vec4_zero()));
        }
        sh.define_main(body);
        sh
    }

    #[test]
    fn missing_position_write() {
        let mut sh = Shader::new(Stage::Vertex, 130);
        sh.declare(Variable::new("gl_Position", Type::VEC4, VariableMode::ShaderOut));
        sh.define_main(vec![]);
        let mut log = InfoLog::new();
        assert!(validate_vertex_shader(&mut log, &sh, 130, false).is_err());
        assert!(log.contains("vertex shader does not write to `gl_Position'"));

        let mut log = InfoLog::new();
        assert!(validate_vertex_shader(&mut log, &sh, 140, false).is_ok());
        assert!(validate_vertex_shader(&mut log, &sh, 100, true).is_err());
    }

    #[test]
    fn frag_color_and_frag_data() {
        let sh = fragment_writing(&["gl_FragColor", "gl_FragData"]);
        let mut log = InfoLog::new();
        assert!(validate_fragment_shader(&mut log, &sh).is_err());
        assert!(log.contains("fragment shader writes to both `gl_FragColor' and `gl_FragData'"));
        let ok = fragment_writing(&["gl_FragColor"]);
        assert!(validate_fragment_shader(&mut log, &ok).is_ok());
    }

    #[test]
    fn write_through_out_parameter() {
        let mut sh = Shader::new(Stage::Vertex, 120);
        let pos = sh.declare(Variable::new("gl_Position", Type::VEC4, VariableMode::ShaderOut));
        let f = sh.declare_function("set");
        let p = sh.add_variable(Variable::new("p", Type::VEC4, VariableMode::FunctionOut));
        let sig = sh.add_signature(f, Signature::defined(Type::Void, vec![p], vec![]));
        sh.define_main(vec![Instruction::Call {
            callee: sig,
            arguments: vec![Rvalue::var(pos)],
            result: None,
        }]);
        assert!(find_assignment(&sh, "gl_Position"));
        assert!(find_deref(&sh, "gl_Position"));
        assert!(!find_assignment(&sh, "p"));
    }

    #[test]
    fn write_through_swizzled_out_parameter() {
        let mut sh = Shader::new(Stage::Vertex, 120);
        let pos = sh.declare(Variable::new("gl_Position", Type::VEC4, VariableMode::ShaderOut));
        let f = sh.declare_function("set");
        let p = sh.add_variable(Variable::new("p", Type::VEC4, VariableMode::FunctionOut));
        let sig = sh.add_signature(f, Signature::defined(Type::Void, vec![p], vec![]));
        sh.define_main(vec![Instruction::Call {
            callee: sig,
            arguments: vec![Rvalue::Swizzle {
                value: Box::new(Rvalue::var(pos)),
                components: vec![0, 1, 2, 3],
                ty: Type::VEC4,
            }],
            result: None,
        }]);
        assert!(find_assignment(&sh, "gl_Position"));
        let mut log = InfoLog::new();
        assert!(validate_vertex_shader(&mut log, &sh, 120, false).is_ok());
    }

    #[test]
    fn clip_distance_size_comes_from_declaration() {
        let mut sh = Shader::new(Stage::Vertex, 130);
        sh.declare(Variable::new(
            "gl_ClipDistance",
            Type::array(Type::FLOAT, 6),
            VariableMode::ShaderOut,
        ));
        sh.define_main(vec![]);
        let mut log = InfoLog::new();
        let info = validate_vertex_shader(&mut log, &sh, 140, false).unwrap();
        assert!(!info.uses_clip_distance);
        assert_eq!(info.clip_distance_array_size, 6);
    }

    #[test]
    fn clip_vertex_and_distance() {
        let mut sh = Shader::new(Stage::Vertex, 130);
        let cv = sh.declare(Variable::new("gl_ClipVertex", Type::VEC4, VariableMode::ShaderOut));
        let cd = sh.declare(Variable::new(
            "gl_ClipDistance",
            Type::array(Type::FLOAT, 4),
            VariableMode::ShaderOut,
        ));
        let elem = Deref::Variable(cd).element(
            Rvalue::Constant(Constant::int(0)),
            &Type::array(Type::FLOAT, 4),
        );
        sh.define_main(vec![Instruction::assign(
            elem.clone(),
            Rvalue::Constant(Constant::float(1.0)),
        )]);
        let mut log = InfoLog::new();
        let info = validate_vertex_shader(&mut log, &sh, 140, false).unwrap();
        assert!(info.uses_clip_distance);
        assert_eq!(info.clip_distance_array_size, 4);

        let main = sh.main_signature().unwrap();
        sh.signature_mut(main)
            .body
            .push(Instruction::assign(Deref::Variable(cv), vec4_zero()));
        assert!(validate_vertex_shader(&mut log, &sh, 140, false).is_err());
        assert!(log.contains("vertex shader writes to both `gl_ClipVertex' and `gl_ClipDistance'"));
    }

    #[test]
    fn geometry_info() {
        let mut sh = Shader::new(Stage::Geometry, 150);
        sh.geometry.input = Some(PrimitiveType::LinesAdjacency);
        sh.define_main(vec![Instruction::EmitVertex, Instruction::EndPrimitive]);
        let mut log = InfoLog::new();
        let info = validate_geometry_shader(&mut log, &sh, 150, false).unwrap();
        assert_eq!(info.vertices_in, 4);
        assert!(info.uses_end_primitive);
    }
}
