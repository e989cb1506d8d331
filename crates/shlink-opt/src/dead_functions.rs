//! Dead function elimination pass.
//!
//! Removes signatures that are never called, other than `void main()`.
//! A function left without signatures loses its top-level declaration; the
//! arena slot itself is reclaimed by [`Shader::compact`].

use std::collections::HashSet;

use shlink_ir::visit::{self, Node, Visit};
use shlink_ir::{Callee, Instruction, Shader};

use crate::Pass;

/// Removes uncalled functions and signatures.
#[derive(Debug)]
pub struct DeadFunctionElimination;

fn called_signatures(shader: &Shader) -> HashSet<Callee> {
    let mut called = HashSet::new();
    let _ = visit::walk_shader(shader, &mut |node| {
        if let Node::Instruction(Instruction::Call { callee, .. }) = node {
            called.insert(*callee);
        }
        Visit::Continue
    });
    called
}

impl Pass for DeadFunctionElimination {
    fn name(&self) -> &str {
        "dead-functions"
    }

    fn run(&self, shader: &mut Shader) -> bool {
        let called = called_signatures(shader);
        let main = shader.main_signature();

        // remap[func][old signature] = new signature index
        let mut remap: Vec<Vec<Option<usize>>> = vec![Vec::new(); shader.functions.len()];
        let mut emptied = Vec::new();
        let mut changed = false;

        for (h, function) in shader.functions.iter_mut() {
            let mut next = 0;
            let mut kept = Vec::with_capacity(function.signatures.len());
            let sigs = std::mem::take(&mut function.signatures);
            let map = &mut remap[h.index()];
            for (i, sig) in sigs.into_iter().enumerate() {
                let callee = Callee {
                    function: h,
                    signature: i,
                };
                if Some(callee) == main || called.contains(&callee) {
                    map.push(Some(next));
                    next += 1;
                    kept.push(sig);
                } else {
                    log::debug!("removing unused signature {i} of `{}'", function.name);
                    map.push(None);
                    changed = true;
                }
            }
            if kept.is_empty() && !map.is_empty() {
                emptied.push(h);
            }
            function.signatures = kept;
        }

        if !changed {
            return false;
        }

        for &h in &emptied {
            let name = shader.functions[h].name.clone();
            if shader.symbols.get_function(&name) == Some(h) {
                shader.symbols.remove_function(&name);
            }
        }
        shader
            .ir
            .retain(|inst| !matches!(inst, Instruction::Function(h) if emptied.contains(h)));

        shader.for_each_body_mut(|block| {
            visit::for_each_instruction_mut(block, &mut |inst| {
                if let Instruction::Call { callee, .. } = inst {
                    if let Some(Some(new)) = remap
                        .get(callee.function.index())
                        .and_then(|m| m.get(callee.signature))
                    {
                        callee.signature = *new;
                    }
                }
            });
        });
        true
    }
}
