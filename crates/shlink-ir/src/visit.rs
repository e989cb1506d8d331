//! Tree traversal over instruction lists.
//!
//! Read-only walks are pre-order with a tri-state [`Visit`] signal returned
//! by the visitor for every node. Mutable walks are plain closures over one
//! node kind.

use std::ops::ControlFlow;

use crate::arena::Arena;
use crate::function::Function;
use crate::ir::{Block, Deref, Instruction, Rvalue};
use crate::shader::Shader;

/// Traversal signal returned by a visitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    /// Descend into the children of this node.
    Continue,
    /// Do not descend into this node's children, but keep walking siblings.
    SkipChildren,
    /// Abort the whole traversal.
    Stop,
}

/// A node presented to a visitor.
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    Instruction(&'a Instruction),
    Rvalue(&'a Rvalue),
    Deref(&'a Deref),
}

struct Walker<'a, 'f, F> {
    functions: Option<&'a Arena<Function>>,
    visitor: &'f mut F,
}

impl<'a, F> Walker<'a, '_, F>
where
    F: FnMut(Node<'a>) -> Visit,
{
    fn enter(&mut self, node: Node<'a>) -> ControlFlow<(), bool> {
        match (self.visitor)(node) {
            Visit::Continue => ControlFlow::Continue(true),
            Visit::SkipChildren => ControlFlow::Continue(false),
            Visit::Stop => ControlFlow::Break(()),
        }
    }

    fn block(&mut self, block: &'a [Instruction]) -> ControlFlow<()> {
        for inst in block {
            self.instruction(inst)?;
        }
        ControlFlow::Continue(())
    }

    fn instruction(&mut self, inst: &'a Instruction) -> ControlFlow<()> {
        if !self.enter(Node::Instruction(inst))? {
            return ControlFlow::Continue(());
        }
        match inst {
            Instruction::Declare(_)
            | Instruction::Break
            | Instruction::Continue
            | Instruction::Discard
            | Instruction::EmitVertex
            | Instruction::EndPrimitive
            | Instruction::Return(None) => {}
            Instruction::Function(h) => {
                if let Some(function) = self.functions.and_then(|f| f.try_get(*h)) {
                    for sig in &function.signatures {
                        self.block(&sig.body)?;
                    }
                }
            }
            Instruction::Assign {
                lhs,
                rhs,
                condition,
            } => {
                self.deref(lhs)?;
                self.rvalue(rhs)?;
                if let Some(c) = condition {
                    self.rvalue(c)?;
                }
            }
            Instruction::Call {
                arguments, result, ..
            } => {
                for arg in arguments {
                    self.rvalue(arg)?;
                }
                if let Some(r) = result {
                    self.deref(r)?;
                }
            }
            Instruction::If {
                condition,
                accept,
                reject,
            } => {
                self.rvalue(condition)?;
                self.block(accept)?;
                self.block(reject)?;
            }
            Instruction::Loop { body } => self.block(body)?,
            Instruction::Return(Some(value)) => self.rvalue(value)?,
        }
        ControlFlow::Continue(())
    }

    fn deref(&mut self, deref: &'a Deref) -> ControlFlow<()> {
        if !self.enter(Node::Deref(deref))? {
            return ControlFlow::Continue(());
        }
        match deref {
            Deref::Variable(_) => {}
            Deref::Array { array, index, .. } => {
                self.deref(array)?;
                self.rvalue(index)?;
            }
            Deref::Record { record, .. } => self.deref(record)?,
        }
        ControlFlow::Continue(())
    }

    fn rvalue(&mut self, rvalue: &'a Rvalue) -> ControlFlow<()> {
        if !self.enter(Node::Rvalue(rvalue))? {
            return ControlFlow::Continue(());
        }
        match rvalue {
            Rvalue::Constant(_) => {}
            Rvalue::Deref(d) => self.deref(d)?,
            Rvalue::Unary { operand, .. } => self.rvalue(operand)?,
            Rvalue::Binary { left, right, .. } => {
                self.rvalue(left)?;
                self.rvalue(right)?;
            }
            Rvalue::Swizzle { value, .. } => self.rvalue(value)?,
            Rvalue::Compose { components, .. } => {
                for c in components {
                    self.rvalue(c)?;
                }
            }
            Rvalue::Texture {
                sampler,
                coordinate,
                ..
            } => {
                self.deref(sampler)?;
                self.rvalue(coordinate)?;
            }
        }
        ControlFlow::Continue(())
    }
}

/// Walks `block` without descending into function declarations.
///
/// Returns `ControlFlow::Break` if the visitor stopped the walk.
pub fn walk_block<'a, F>(block: &'a [Instruction], visitor: &mut F) -> ControlFlow<()>
where
    F: FnMut(Node<'a>) -> Visit,
{
    Walker {
        functions: None,
        visitor,
    }
    .block(block)
}

/// Walks the top-level instruction list of `shader`, descending into the
/// bodies of every function it declares.
pub fn walk_shader<'a, F>(shader: &'a Shader, visitor: &mut F) -> ControlFlow<()>
where
    F: FnMut(Node<'a>) -> Visit,
{
    Walker {
        functions: Some(&shader.functions),
        visitor,
    }
    .block(&shader.ir)
}

/// Calls `f` on every instruction of `block`, parents before children.
pub fn for_each_instruction_mut(block: &mut Block, f: &mut impl FnMut(&mut Instruction)) {
    for inst in block.iter_mut() {
        f(inst);
        match inst {
            Instruction::If { accept, reject, .. } => {
                for_each_instruction_mut(accept, f);
                for_each_instruction_mut(reject, f);
            }
            Instruction::Loop { body } => for_each_instruction_mut(body, f),
            _ => {}
        }
    }
}

/// Calls `f` on `block` and every nested block, children first.
pub fn for_each_block_mut(block: &mut Block, f: &mut impl FnMut(&mut Block)) {
    for inst in block.iter_mut() {
        match inst {
            Instruction::If { accept, reject, .. } => {
                for_each_block_mut(accept, f);
                for_each_block_mut(reject, f);
            }
            Instruction::Loop { body } => for_each_block_mut(body, f),
            _ => {}
        }
    }
    f(block);
}

/// Calls `f` on every dereference reachable from `block`, innermost first.
pub fn for_each_deref_mut(block: &mut Block, f: &mut impl FnMut(&mut Deref)) {
    for_each_instruction_mut(block, &mut |inst| match inst {
        Instruction::Assign {
            lhs,
            rhs,
            condition,
        } => {
            deref_mut(lhs, f);
            rvalue_derefs_mut(rhs, f);
            if let Some(c) = condition {
                rvalue_derefs_mut(c, f);
            }
        }
        Instruction::Call {
            arguments, result, ..
        } => {
            for arg in arguments {
                rvalue_derefs_mut(arg, f);
            }
            if let Some(r) = result {
                deref_mut(r, f);
            }
        }
        Instruction::If { condition, .. } => rvalue_derefs_mut(condition, f),
        Instruction::Return(Some(value)) => rvalue_derefs_mut(value, f),
        _ => {}
    });
}

fn deref_mut(deref: &mut Deref, f: &mut impl FnMut(&mut Deref)) {
    match deref {
        Deref::Variable(_) => {}
        Deref::Array { array, index, .. } => {
            deref_mut(array, f);
            rvalue_derefs_mut(index, f);
        }
        Deref::Record { record, .. } => deref_mut(record, f),
    }
    f(deref);
}

fn rvalue_derefs_mut(rvalue: &mut Rvalue, f: &mut impl FnMut(&mut Deref)) {
    match rvalue {
        Rvalue::Constant(_) => {}
        Rvalue::Deref(d) => deref_mut(d, f),
        Rvalue::Unary { operand, .. } => rvalue_derefs_mut(operand, f),
        Rvalue::Binary { left, right, .. } => {
            rvalue_derefs_mut(left, f);
            rvalue_derefs_mut(right, f);
        }
        Rvalue::Swizzle { value, .. } => rvalue_derefs_mut(value, f),
        Rvalue::Compose { components, .. } => {
            for c in components {
                rvalue_derefs_mut(c, f);
            }
        }
        Rvalue::Texture {
            sampler,
            coordinate,
            ..
        } => {
            deref_mut(sampler, f);
            rvalue_derefs_mut(coordinate, f);
        }
    }
}
