use shlink_ir::{
    Constant, Deref, Handle, Instruction, PrimitiveType, Rvalue, Shader, Stage, Type, Variable,
    VariableMode,
};
use shlink_linker::{LinkOptions, Program, link_program};

/// `lhs = rhs;`
#[allow(dead_code)]
pub fn write(lhs: Handle<Variable>, rhs: Rvalue) -> Instruction {
    Instruction::assign(Deref::Variable(lhs), rhs)
}

#[allow(dead_code)]
pub fn vec4_splat(v: f32) -> Rvalue {
    Rvalue::Constant(Constant::floats(Type::VEC4, vec![v; 4]))
}

/// A vertex shader copying attribute `position` to `gl_Position` and to
/// every named `vec4` output.
#[allow(dead_code)]
pub fn passthrough_vertex(version: u32, outputs: &[&str]) -> Shader {
    let mut vs = Shader::new(Stage::Vertex, version);
    let position = vs.declare(Variable::new("position", Type::VEC4, VariableMode::ShaderIn));
    let gl_position = vs.declare(Variable::new("gl_Position", Type::VEC4, VariableMode::ShaderOut));
    let mut body = vec![write(gl_position, Rvalue::var(position))];
    for name in outputs {
        let out = vs.declare(Variable::new(*name, Type::VEC4, VariableMode::ShaderOut));
        body.push(write(out, Rvalue::var(position)));
    }
    vs.define_main(body);
    vs
}

/// A fragment shader writing each named `vec4` input to output `frag`.
#[allow(dead_code)]
pub fn reading_fragment(version: u32, inputs: &[&str]) -> Shader {
    let mut fs = Shader::new(Stage::Fragment, version);
    let frag = fs.declare(Variable::new("frag", Type::VEC4, VariableMode::ShaderOut));
    let mut body = vec![write(frag, vec4_splat(0.0))];
    for name in inputs {
        let input = fs.declare(Variable::new(*name, Type::VEC4, VariableMode::ShaderIn));
        body.push(write(frag, Rvalue::var(input)));
    }
    fs.define_main(body);
    fs
}

/// A `triangles` in, `triangle_strip` out geometry shader forwarding
/// `input[0]` to `output` for each of its three vertices.
#[allow(dead_code)]
pub fn forwarding_geometry(input: &str, input_ty: Type, output: &str) -> Shader {
    let mut gs = Shader::new(Stage::Geometry, 150);
    gs.geometry.input = Some(PrimitiveType::Triangles);
    gs.geometry.output = Some(PrimitiveType::TriangleStrip);
    gs.geometry.vertices_out = Some(3);

    let array_ty = input_ty.clone();
    let src = gs.declare(Variable::new(input, input_ty, VariableMode::ShaderIn).with_max_access(0));
    let dst = gs.declare(Variable::new(output, Type::VEC4, VariableMode::ShaderOut));
    let elem = Deref::Variable(src).element(Rvalue::Constant(Constant::int(0)), &array_ty);
    let mut body = Vec::new();
    for _ in 0..3 {
        body.push(write(dst, Rvalue::Deref(elem.clone())));
        body.push(Instruction::EmitVertex);
    }
    body.push(Instruction::EndPrimitive);
    gs.define_main(body);
    gs
}

/// Links with default options and returns the program.
#[allow(dead_code)]
pub fn link(shaders: Vec<Shader>) -> Program {
    link_with(shaders, &LinkOptions::default())
}

#[allow(dead_code)]
pub fn link_with(shaders: Vec<Shader>, options: &LinkOptions) -> Program {
    let mut prog = Program::new();
    for shader in shaders {
        prog.attach(shader);
    }
    link_program(&mut prog, options);
    prog
}
