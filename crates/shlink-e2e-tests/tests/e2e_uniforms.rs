mod common;

use common::{link, passthrough_vertex, reading_fragment, write};
use shlink_ir::{
    Constant, Deref, InterfacePacking, Rvalue, Shader, Stage, StructField, Type, UniformBlock,
    Variable, VariableMode,
};
use shlink_linker::ErrorKind;

/// Appends `target = value;` to the end of `main`.
fn append_write(shader: &mut Shader, target: &str, value: Rvalue) {
    let target = shader.symbols.get_variable(target).unwrap();
    let main = shader.main_signature().unwrap();
    shader.signature_mut(main).body.push(write(target, value));
}

fn uniform(name: &str, ty: Type) -> Variable {
    Variable::new(name, ty, VariableMode::Uniform)
}

fn params_type() -> Type {
    Type::Interface {
        name: "Params".into(),
        fields: vec![
            StructField::new("tint", Type::VEC4),
            StructField::new("gain", Type::FLOAT),
        ],
        packing: InterfacePacking::Std140,
    }
}

/// Declares the unnamed block `Params { vec4 tint; float gain; }`.
fn declare_params(shader: &mut Shader) {
    for (name, ty) in [("tint", Type::VEC4), ("gain", Type::FLOAT)] {
        let mut member = uniform(name, ty);
        member.interface_type = Some(params_type());
        shader.declare(member);
    }
    shader.uniform_blocks.push(UniformBlock::new(
        "Params",
        vec![("tint".into(), Type::VEC4), ("gain".into(), Type::FLOAT)],
    ));
}

#[test]
fn uniforms_shared_between_stages() {
    let mut vs = passthrough_vertex(140, &["color"]);
    let tint = vs.declare(uniform("tint", Type::VEC4));
    append_write(&mut vs, "gl_Position", Rvalue::var(tint));

    let mut fs = reading_fragment(140, &["color"]);
    let tint = fs.declare(uniform("tint", Type::VEC4));
    let tex = fs.declare(uniform("tex", Type::SAMPLER_2D));
    fs.declare(uniform("gamma", Type::FLOAT).with_initializer(Constant::float(2.2)));
    append_write(&mut fs, "frag", Rvalue::var(tint));
    append_write(
        &mut fs,
        "frag",
        Rvalue::Texture {
            sampler: Deref::Variable(tex),
            coordinate: Box::new(Rvalue::Constant(Constant::floats(Type::VEC2, vec![0.5; 2]))),
            ty: Type::VEC4,
        },
    );

    let prog = link(vec![vs, fs]);
    assert!(prog.link_status, "{}", prog.info_log);

    let tint = prog.uniform("tint").unwrap();
    assert_eq!(tint.location, Some(0));
    assert_eq!(tint.stages, [true, false, true]);
    let tex = prog.uniform("tex").unwrap();
    assert_eq!(tex.location, Some(1));
    assert_eq!(tex.sampler_unit, Some(0));
    assert_eq!(tex.stages, [false, false, true]);
    // Unreferenced, but kept for its initializer.
    let gamma = prog.uniform("gamma").unwrap();
    assert_eq!(gamma.initializer, Some(Constant::float(2.2)));

    assert_eq!(prog.resources[Stage::Vertex.index()].uniform_components, 4);
    assert_eq!(prog.resources[Stage::Fragment.index()].samplers, 1);
}

#[test]
fn uniform_array_shrinks_to_highest_access() {
    let weights_ty = Type::array(Type::FLOAT, 8);
    let mut vs = passthrough_vertex(130, &[]);
    let weights = vs.declare(uniform("weights", weights_ty.clone()).with_max_access(2));
    let elem = Deref::Variable(weights).element(Rvalue::Constant(Constant::int(2)), &weights_ty);
    append_write(
        &mut vs,
        "gl_Position",
        Rvalue::Compose {
            ty: Type::VEC4,
            components: vec![Rvalue::Deref(elem)],
        },
    );

    let prog = link(vec![vs]);
    assert!(prog.link_status, "{}", prog.info_log);
    assert_eq!(prog.uniform("weights").unwrap().array_elements, 3);
    let vs = prog.linked_shader(Stage::Vertex).unwrap();
    assert_eq!(vs.find_variable("weights").unwrap().ty, Type::array(Type::FLOAT, 3));
}

#[test]
fn uniform_block_shared_between_stages() {
    let mut vs = passthrough_vertex(140, &[]);
    declare_params(&mut vs);
    let tint = vs.symbols.get_variable("tint").unwrap();
    append_write(&mut vs, "gl_Position", Rvalue::var(tint));

    let mut fs = reading_fragment(140, &[]);
    declare_params(&mut fs);
    let tint = fs.symbols.get_variable("tint").unwrap();
    append_write(&mut fs, "frag", Rvalue::var(tint));

    let prog = link(vec![vs, fs]);
    assert!(prog.link_status, "{}", prog.info_log);

    assert_eq!(prog.uniform_blocks.len(), 1);
    let block = &prog.uniform_blocks[0];
    assert_eq!(block.name, "Params");
    assert_eq!(block.members[1].offset, 16);
    assert_eq!(block.data_size, 32);
    assert_eq!(prog.uniform_block_stage_index[Stage::Vertex.index()], [Some(0)]);
    assert_eq!(prog.uniform_block_stage_index[Stage::Geometry.index()], [None]);
    assert_eq!(prog.uniform_block_stage_index[Stage::Fragment.index()], [Some(0)]);

    let tint = prog.uniform("tint").unwrap();
    assert_eq!(tint.location, None);
    assert_eq!(tint.block.as_deref(), Some("Params"));
    assert_eq!(tint.stages, [true, false, true]);

    let fs_res = prog.resources[Stage::Fragment.index()];
    assert_eq!(fs_res.uniform_components, 0);
    assert_eq!(fs_res.combined_uniform_components, 8);
}

#[test]
fn uniform_block_definitions_must_match_across_stages() {
    let mut vs = passthrough_vertex(140, &[]);
    vs.uniform_blocks
        .push(UniformBlock::new("Params", vec![("x".into(), Type::VEC4)]));
    let mut fs = reading_fragment(140, &[]);
    fs.uniform_blocks
        .push(UniformBlock::new("Params", vec![("x".into(), Type::VEC3)]));

    let prog = link(vec![vs, fs]);
    assert!(!prog.link_status);
    assert!(prog.info_log.contains("uniform block `Params' has mismatching definitions"));
    assert_eq!(prog.info_log.entries()[0].kind, ErrorKind::CrossDeclaration);
}

#[test]
fn uniform_initializers_must_agree() {
    let mut a = passthrough_vertex(130, &[]);
    a.declare(uniform("k", Type::FLOAT).with_initializer(Constant::float(1.0)));
    let mut b = Shader::new(Stage::Vertex, 130);
    b.declare(uniform("k", Type::FLOAT).with_initializer(Constant::float(2.0)));

    let prog = link(vec![a, b]);
    assert!(!prog.link_status);
    assert!(prog.info_log.contains("initializers for uniform `k' have differing values"));
}
