//! IR passes for shlink.
//!
//! Provides a [`Pass`] trait, a [`PassManager`] with fixed-point iteration,
//! and the passes the linker relies on (constant folding, dead-code and
//! dead-function elimination, IR tree validation).

mod const_fold;
mod dce;
mod dead_functions;
mod validation;

pub use const_fold::ConstantFolding;
pub use dce::DeadCodeElimination;
pub use dead_functions::DeadFunctionElimination;
pub use validation::{IrValidation, validate_ir_tree};

use std::fmt::Debug;

use shlink_ir::Shader;

/// A pass that transforms a shader's IR.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Run the pass on a shader. Returns `true` if anything was modified.
    fn run(&self, shader: &mut Shader) -> bool;
}

/// Optimization level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptLevel {
    /// No optimizations.
    O0,
    /// Constant folding and dead-code elimination.
    O1,
    /// O1 plus dead-function elimination.
    O2,
}

/// Maximum number of fixed-point iterations before giving up.
const MAX_ITERATIONS: usize = 10;

/// Runs passes in sequence with fixed-point iteration.
#[derive(Debug)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Creates an empty pass manager with no passes.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Creates a pass manager with passes appropriate for the given level.
    pub fn for_level(level: OptLevel) -> Self {
        let mut pm = Self::new();
        match level {
            OptLevel::O0 => {}
            OptLevel::O1 => {
                pm.add_pass(Box::new(ConstantFolding));
                pm.add_pass(Box::new(DeadCodeElimination::default()));
            }
            OptLevel::O2 => {
                pm.add_pass(Box::new(ConstantFolding));
                pm.add_pass(Box::new(DeadFunctionElimination));
                pm.add_pass(Box::new(DeadCodeElimination::default()));
            }
        }
        pm
    }

    /// Adds a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Runs all passes until a fixed point is reached or the iteration limit.
    ///
    /// Returns `true` if any pass changed the shader.
    pub fn run(&self, shader: &mut Shader) -> bool {
        let mut any = false;
        for iteration in 0..MAX_ITERATIONS {
            let mut changed = false;
            for pass in &self.passes {
                let pass_changed = pass.run(shader);
                if pass_changed {
                    log::debug!(
                        "pass {} changed {} shader (iteration {iteration})",
                        pass.name(),
                        shader.stage
                    );
                }
                changed |= pass_changed;
            }
            any |= changed;
            if !changed {
                break;
            }
        }
        any
    }
}

/// Convenience function: runs O1 passes on a shader.
pub fn optimize(shader: &mut Shader) -> bool {
    PassManager::for_level(OptLevel::O1).run(shader)
}

/// Runs dead-code elimination until nothing more is removed.
///
/// Unlike [`PassManager::run`] this is not bounded by an iteration limit;
/// every round removes at least one instruction, so it terminates.
pub fn eliminate_dead_code(shader: &mut Shader) -> bool {
    let dce = DeadCodeElimination::default();
    let mut any = false;
    while dce.run(shader) {
        any = true;
    }
    any
}
