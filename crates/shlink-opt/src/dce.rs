//! Dead code elimination pass.
//!
//! A variable whose every reference is the target of an assignment is dead:
//! those assignments are removed (unless the variable is an output), and a
//! declaration with no references left is removed. Running the pass to a
//! fixed point cascades through chains of values feeding only dead stores.

use shlink_ir::visit::{self, Node, Visit};
use shlink_ir::{Deref, Handle, Instruction, Shader, Variable, VariableMode};

use crate::Pass;

/// Removes dead assignments and unreferenced variable declarations.
#[derive(Debug, Default)]
pub struct DeadCodeElimination {
    /// Uniforms have locations assigned and must keep their declarations.
    pub uniform_locations_assigned: bool,
}

#[derive(Clone, Copy, Default)]
struct RefCount {
    referenced: u32,
    assigned: u32,
    declared: bool,
}

fn count_references(shader: &Shader) -> Vec<RefCount> {
    let mut counts = vec![RefCount::default(); shader.variables.len()];
    let _ = visit::walk_shader(shader, &mut |node| {
        match node {
            Node::Deref(Deref::Variable(h)) => {
                if let Some(c) = counts.get_mut(h.index()) {
                    c.referenced += 1;
                }
            }
            Node::Instruction(Instruction::Assign { lhs, .. }) => {
                if let Some(c) = counts.get_mut(lhs.variable_referenced().index()) {
                    c.assigned += 1;
                }
            }
            Node::Instruction(Instruction::Declare(h)) => {
                if let Some(c) = counts.get_mut(h.index()) {
                    c.declared = true;
                }
            }
            _ => {}
        }
        Visit::Continue
    });
    counts
}

fn keeps_assignments(var: &Variable) -> bool {
    matches!(
        var.mode,
        VariableMode::ShaderOut | VariableMode::FunctionOut | VariableMode::FunctionInout
    )
}

impl DeadCodeElimination {
    fn keeps_declaration(&self, var: &Variable) -> bool {
        var.mode == VariableMode::Uniform
            && (self.uniform_locations_assigned || var.constant_initializer.is_some())
    }
}

impl Pass for DeadCodeElimination {
    fn name(&self) -> &str {
        "dce"
    }

    fn run(&self, shader: &mut Shader) -> bool {
        let counts = count_references(shader);

        let mut dead_stores: Vec<Handle<Variable>> = Vec::new();
        let mut dead_decls: Vec<Handle<Variable>> = Vec::new();
        for (h, var) in shader.variables.iter() {
            let c = counts[h.index()];
            if !c.declared || c.referenced > c.assigned {
                continue;
            }
            if c.assigned > 0 {
                if !keeps_assignments(var) {
                    dead_stores.push(h);
                }
            } else if !self.keeps_declaration(var) {
                dead_decls.push(h);
            }
        }

        if dead_stores.is_empty() && dead_decls.is_empty() {
            return false;
        }

        for &h in &dead_decls {
            let name = shader.variables[h].name.clone();
            if shader.symbols.get_variable(&name) == Some(h) {
                shader.symbols.remove_variable(&name);
            }
            log::debug!("dce: removing declaration of `{name}'");
        }

        let mut changed = false;
        shader.for_each_body_mut(|block| {
            visit::for_each_block_mut(block, &mut |b| {
                let before = b.len();
                b.retain(|inst| match inst {
                    Instruction::Assign { lhs, .. } => {
                        !dead_stores.contains(&lhs.variable_referenced())
                    }
                    Instruction::Declare(h) => !dead_decls.contains(h),
                    _ => true,
                });
                changed |= b.len() != before;
            });
        });
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shlink_ir::{BinaryOp, Constant, Rvalue, Stage, Type};

    fn assign(h: Handle<Variable>, rhs: Rvalue) -> Instruction {
        Instruction::assign(Deref::Variable(h), rhs)
    }

    fn run_to_fixed_point(shader: &mut Shader) {
        let dce = DeadCodeElimination::default();
        while dce.run(shader) {}
    }

    #[test]
    fn removes_store_only_chain() {
        let mut sh = Shader::new(Stage::Vertex, 130);
        let a = sh.declare(Variable::new("a", Type::FLOAT, VariableMode::Auto));
        let b = sh.declare(Variable::new("b", Type::FLOAT, VariableMode::Auto));
        sh.define_main(vec![
            assign(a, Rvalue::Constant(Constant::float(1.0))),
            assign(
                b,
                Rvalue::binary(BinaryOp::Add, Rvalue::var(a), Rvalue::var(a), Type::FLOAT),
            ),
        ]);
        run_to_fixed_point(&mut sh);
        assert_eq!(sh.global_variables().count(), 0);
        let main = sh.main_signature().unwrap();
        assert!(sh.signature(main).body.is_empty());
        assert!(sh.symbols.get_variable("a").is_none());
    }

    #[test]
    fn keeps_output_stores_and_their_inputs() {
        let mut sh = Shader::new(Stage::Vertex, 130);
        let a = sh.declare(Variable::new("a", Type::VEC4, VariableMode::Auto));
        let out = sh.declare(Variable::new("v", Type::VEC4, VariableMode::ShaderOut));
        sh.define_main(vec![
            assign(a, Rvalue::Constant(Constant::floats(Type::VEC4, vec![1.0; 4]))),
            assign(out, Rvalue::var(a)),
        ]);
        run_to_fixed_point(&mut sh);
        assert_eq!(sh.global_variables().count(), 2);
        let main = sh.main_signature().unwrap();
        assert_eq!(sh.signature(main).body.len(), 2);
    }

    #[test]
    fn demoted_output_is_eliminated() {
        let mut sh = Shader::new(Stage::Vertex, 130);
        let out = sh.declare(Variable::new("unused", Type::VEC4, VariableMode::ShaderOut));
        sh.define_main(vec![assign(
            out,
            Rvalue::Constant(Constant::floats(Type::VEC4, vec![0.0; 4])),
        )]);
        run_to_fixed_point(&mut sh);
        assert_eq!(sh.global_variables().count(), 1);

        sh.variables[out].mode = VariableMode::Auto;
        run_to_fixed_point(&mut sh);
        assert_eq!(sh.global_variables().count(), 0);
    }

    #[test]
    fn uniform_with_initializer_survives() {
        let mut sh = Shader::new(Stage::Fragment, 130);
        sh.declare(
            Variable::new("k", Type::FLOAT, VariableMode::Uniform)
                .with_initializer(Constant::float(2.0)),
        );
        sh.declare(Variable::new("unused_uniform", Type::FLOAT, VariableMode::Uniform));
        sh.define_main(vec![]);
        run_to_fixed_point(&mut sh);
        let names: Vec<_> = sh
            .global_variables()
            .map(|h| sh.variables[h].name.clone())
            .collect();
        assert_eq!(names, vec!["k".to_string()]);
    }

    #[test]
    fn uniform_locations_assigned_keeps_all_uniforms() {
        let mut sh = Shader::new(Stage::Fragment, 130);
        sh.declare(Variable::new("u", Type::FLOAT, VariableMode::Uniform));
        sh.define_main(vec![]);
        let dce = DeadCodeElimination {
            uniform_locations_assigned: true,
        };
        assert!(!dce.run(&mut sh));
    }

    #[test]
    fn locals_in_function_bodies_are_candidates() {
        let mut sh = Shader::new(Stage::Fragment, 130);
        let tmp = sh.add_variable(Variable::new("t", Type::FLOAT, VariableMode::Temporary));
        sh.define_main(vec![
            Instruction::Declare(tmp),
            assign(tmp, Rvalue::Constant(Constant::float(3.0))),
        ]);
        run_to_fixed_point(&mut sh);
        let main = sh.main_signature().unwrap();
        assert!(sh.signature(main).body.is_empty());
    }
}
