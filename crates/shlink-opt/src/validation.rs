//! IR validation pass.
//!
//! Checks structural invariants of a shader's instruction tree and logs
//! warnings for problems found. This pass never modifies the shader.

use std::collections::HashSet;

use shlink_ir::visit::{self, Node, Visit};
use shlink_ir::{Deref, Handle, Instruction, IrError, Shader, Variable};

use crate::Pass;

/// Validates IR structural invariants. Returns `false` (never modifies the shader).
#[derive(Debug)]
pub struct IrValidation;

impl Pass for IrValidation {
    fn name(&self) -> &str {
        "ir-validation"
    }

    fn run(&self, shader: &mut Shader) -> bool {
        for err in validate_ir_tree(shader) {
            log::warn!("{} shader: {err}", shader.stage);
        }
        false
    }
}

/// Returns every structural problem found in `shader`.
///
/// Checked invariants:
/// - every handle is in bounds for its arena;
/// - every dereferenced variable is declared somewhere in the shader or is
///   a parameter of a declared function;
/// - no variable is declared twice;
/// - every call targets an existing signature;
/// - `break` and `continue` only appear inside loops.
pub fn validate_ir_tree(shader: &Shader) -> Vec<IrError> {
    let mut errors = Vec::new();
    let var_count = shader.variables.len();
    let func_count = shader.functions.len();

    let mut declared: HashSet<Handle<Variable>> = HashSet::new();
    let _ = visit::walk_shader(shader, &mut |node| {
        if let Node::Instruction(Instruction::Declare(h)) = node {
            if h.index() >= var_count {
                errors.push(IrError::BadHandle {
                    index: h.index(),
                    size: var_count,
                });
            } else if !declared.insert(*h) {
                errors.push(IrError::DuplicateDeclaration {
                    name: shader.variables[*h].name.clone(),
                });
            }
        }
        Visit::Continue
    });
    for h in shader.declared_functions() {
        let Some(function) = shader.functions.try_get(h) else {
            errors.push(IrError::BadHandle {
                index: h.index(),
                size: func_count,
            });
            continue;
        };
        for sig in &function.signatures {
            declared.extend(sig.parameters.iter().copied());
        }
    }

    let mut reported: HashSet<Handle<Variable>> = HashSet::new();
    let _ = visit::walk_shader(shader, &mut |node| {
        match node {
            Node::Deref(Deref::Variable(h)) => {
                if h.index() >= var_count {
                    errors.push(IrError::BadHandle {
                        index: h.index(),
                        size: var_count,
                    });
                } else if !declared.contains(h) && reported.insert(*h) {
                    errors.push(IrError::UndeclaredVariable {
                        name: shader.variables[*h].name.clone(),
                    });
                }
            }
            Node::Instruction(Instruction::Call { callee, .. }) => {
                match shader.functions.try_get(callee.function) {
                    None => errors.push(IrError::BadHandle {
                        index: callee.function.index(),
                        size: func_count,
                    }),
                    Some(f) if callee.signature >= f.signatures.len() => {
                        errors.push(IrError::BadSignature {
                            function: f.name.clone(),
                            signature: callee.signature,
                        })
                    }
                    Some(_) => {}
                }
            }
            _ => {}
        }
        Visit::Continue
    });

    check_jumps(&shader.ir, false, &mut errors);
    for h in shader.declared_functions() {
        if let Some(function) = shader.functions.try_get(h) {
            for sig in &function.signatures {
                check_jumps(&sig.body, false, &mut errors);
            }
        }
    }
    errors
}

fn check_jumps(block: &[Instruction], in_loop: bool, errors: &mut Vec<IrError>) {
    for inst in block {
        match inst {
            Instruction::Break if !in_loop => errors.push(IrError::OrphanedJump("break")),
            Instruction::Continue if !in_loop => errors.push(IrError::OrphanedJump("continue")),
            Instruction::If { accept, reject, .. } => {
                check_jumps(accept, in_loop, errors);
                check_jumps(reject, in_loop, errors);
            }
            Instruction::Loop { body } => check_jumps(body, true, errors),
            _ => {}
        }
    }
}
