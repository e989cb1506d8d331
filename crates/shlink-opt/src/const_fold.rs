//! Constant folding pass.
//!
//! Evaluates unary and binary operations on constant scalar or vector
//! operands, and replaces `if` statements with a constant condition by the
//! taken branch.

use shlink_ir::visit;
use shlink_ir::{
    BinaryOp, Block, Constant, ConstantValue, Deref, Instruction, Rvalue, Shader, Type, UnaryOp,
};

use crate::Pass;

/// Folds constant expressions at compile time.
#[derive(Debug)]
pub struct ConstantFolding;

impl Pass for ConstantFolding {
    fn name(&self) -> &str {
        "const-fold"
    }

    fn run(&self, shader: &mut Shader) -> bool {
        let mut changed = false;
        shader.for_each_body_mut(|block| {
            changed |= fold_block(block);
        });
        changed
    }
}

fn fold_block(block: &mut Block) -> bool {
    let mut changed = false;
    visit::for_each_instruction_mut(block, &mut |inst| {
        changed |= fold_instruction(inst);
    });
    visit::for_each_block_mut(block, &mut |b| {
        changed |= splice_constant_branches(b);
    });
    changed
}

fn fold_instruction(inst: &mut Instruction) -> bool {
    match inst {
        Instruction::Assign {
            lhs,
            rhs,
            condition,
        } => {
            let mut changed = fold_deref(lhs) | fold_rvalue(rhs);
            if let Some(c) = condition {
                changed |= fold_rvalue(c);
                // An always-false guard is handled by the splice.
                if c.as_constant().and_then(Constant::as_bool) == Some(true) {
                    *condition = None;
                    changed = true;
                }
            }
            changed
        }
        Instruction::Call {
            arguments, result, ..
        } => {
            let mut changed = false;
            for arg in arguments {
                changed |= fold_rvalue(arg);
            }
            if let Some(r) = result {
                changed |= fold_deref(r);
            }
            changed
        }
        Instruction::If { condition, .. } => fold_rvalue(condition),
        Instruction::Return(Some(value)) => fold_rvalue(value),
        _ => false,
    }
}

/// Replaces `if (true)`/`if (false)` by the taken branch and drops
/// assignments guarded by a constant `false`.
fn splice_constant_branches(block: &mut Block) -> bool {
    let needs_splice = block.iter().any(|inst| match inst {
        Instruction::If { condition, .. } => constant_bool(condition).is_some(),
        Instruction::Assign {
            condition: Some(c), ..
        } => constant_bool(c) == Some(false),
        _ => false,
    });
    if !needs_splice {
        return false;
    }
    let old = std::mem::take(block);
    for inst in old {
        match inst {
            Instruction::If {
                condition,
                accept,
                reject,
            } if constant_bool(&condition).is_some() => {
                if constant_bool(&condition) == Some(true) {
                    block.extend(accept);
                } else {
                    block.extend(reject);
                }
            }
            Instruction::Assign {
                condition: Some(ref c),
                ..
            } if constant_bool(c) == Some(false) => {}
            other => block.push(other),
        }
    }
    true
}

fn constant_bool(rvalue: &Rvalue) -> Option<bool> {
    rvalue.as_constant().and_then(Constant::as_bool)
}

fn fold_deref(deref: &mut Deref) -> bool {
    match deref {
        Deref::Variable(_) => false,
        Deref::Array { array, index, .. } => fold_deref(array) | fold_rvalue(index),
        Deref::Record { record, .. } => fold_deref(record),
    }
}

fn fold_rvalue(rvalue: &mut Rvalue) -> bool {
    let mut changed = match rvalue {
        Rvalue::Constant(_) => false,
        Rvalue::Deref(d) => fold_deref(d),
        Rvalue::Unary { operand, .. } => fold_rvalue(operand),
        Rvalue::Binary { left, right, .. } => fold_rvalue(left) | fold_rvalue(right),
        Rvalue::Swizzle { value, .. } => fold_rvalue(value),
        Rvalue::Compose { components, .. } => {
            let mut changed = false;
            for c in components {
                changed |= fold_rvalue(c);
            }
            changed
        }
        Rvalue::Texture { coordinate, .. } => fold_rvalue(coordinate),
    };

    let replacement = match rvalue {
        Rvalue::Unary { op, operand, ty } => operand
            .as_constant()
            .and_then(|c| fold_unary(*op, c, ty)),
        Rvalue::Binary {
            op,
            left,
            right,
            ty,
        } => match (left.as_constant(), right.as_constant()) {
            (Some(l), Some(r)) => fold_binary(*op, l, r, ty),
            _ => None,
        },
        Rvalue::Swizzle {
            value,
            components,
            ty,
        } => value
            .as_constant()
            .and_then(|c| fold_swizzle(c, components, ty)),
        _ => None,
    };
    if let Some(c) = replacement {
        *rvalue = Rvalue::Constant(c);
        changed = true;
    }
    changed
}

fn is_componentwise(ty: &Type) -> bool {
    matches!(ty, Type::Scalar(_) | Type::Vector { .. })
}

/// Pairs up operand components, broadcasting a scalar operand.
fn zip_components<T: Copy, U>(l: &[T], r: &[T], f: impl Fn(T, T) -> Option<U>) -> Option<Vec<U>> {
    let n = l.len().max(r.len());
    if !(l.len() == n || l.len() == 1) || !(r.len() == n || r.len() == 1) {
        return None;
    }
    (0..n)
        .map(|i| {
            let a = if l.len() == 1 { l[0] } else { l[i] };
            let b = if r.len() == 1 { r[0] } else { r[i] };
            f(a, b)
        })
        .collect()
}

fn fold_binary(op: BinaryOp, left: &Constant, right: &Constant, ty: &Type) -> Option<Constant> {
    if !is_componentwise(&left.ty) || !is_componentwise(&right.ty) || !is_componentwise(ty) {
        return None;
    }
    let value = match (&left.value, &right.value) {
        (ConstantValue::Float(l), ConstantValue::Float(r)) if op == BinaryOp::Dot => {
            if l.len() != r.len() {
                return None;
            }
            ConstantValue::Float(vec![l.iter().zip(r).map(|(a, b)| a * b).sum()])
        }
        (ConstantValue::Float(l), ConstantValue::Float(r)) => {
            if let Some(v) = zip_components(l, r, |a, b| fold_f32(op, a, b)) {
                ConstantValue::Float(v)
            } else {
                ConstantValue::Bool(zip_components(l, r, |a, b| compare(op, a, b))?)
            }
        }
        (ConstantValue::Int(l), ConstantValue::Int(r)) => {
            if let Some(v) = zip_components(l, r, |a, b| fold_i32(op, a, b)) {
                ConstantValue::Int(v)
            } else {
                ConstantValue::Bool(zip_components(l, r, |a, b| compare(op, a, b))?)
            }
        }
        (ConstantValue::Uint(l), ConstantValue::Uint(r)) => {
            if let Some(v) = zip_components(l, r, |a, b| fold_u32(op, a, b)) {
                ConstantValue::Uint(v)
            } else {
                ConstantValue::Bool(zip_components(l, r, |a, b| compare(op, a, b))?)
            }
        }
        (ConstantValue::Bool(l), ConstantValue::Bool(r)) => {
            ConstantValue::Bool(zip_components(l, r, |a, b| fold_bool(op, a, b))?)
        }
        _ => return None,
    };
    let folded = Constant {
        ty: ty.clone(),
        value,
    };
    (folded_len(&folded) == ty.components() as usize).then_some(folded)
}

fn folded_len(c: &Constant) -> usize {
    match &c.value {
        ConstantValue::Bool(v) => v.len(),
        ConstantValue::Int(v) => v.len(),
        ConstantValue::Uint(v) => v.len(),
        ConstantValue::Float(v) => v.len(),
        ConstantValue::Composite(v) => v.len(),
    }
}

fn fold_f32(op: BinaryOp, l: f32, r: f32) -> Option<f32> {
    match op {
        BinaryOp::Add => Some(l + r),
        BinaryOp::Subtract => Some(l - r),
        BinaryOp::Multiply => Some(l * r),
        BinaryOp::Divide => Some(l / r),
        _ => None,
    }
}

fn fold_i32(op: BinaryOp, l: i32, r: i32) -> Option<i32> {
    match op {
        BinaryOp::Add => Some(l.wrapping_add(r)),
        BinaryOp::Subtract => Some(l.wrapping_sub(r)),
        BinaryOp::Multiply => Some(l.wrapping_mul(r)),
        BinaryOp::Divide if r != 0 => Some(l.wrapping_div(r)),
        _ => None,
    }
}

fn fold_u32(op: BinaryOp, l: u32, r: u32) -> Option<u32> {
    match op {
        BinaryOp::Add => Some(l.wrapping_add(r)),
        BinaryOp::Subtract => Some(l.wrapping_sub(r)),
        BinaryOp::Multiply => Some(l.wrapping_mul(r)),
        BinaryOp::Divide if r != 0 => Some(l / r),
        _ => None,
    }
}

fn compare<T: PartialOrd>(op: BinaryOp, l: T, r: T) -> Option<bool> {
    match op {
        BinaryOp::Less => Some(l < r),
        BinaryOp::Greater => Some(l > r),
        BinaryOp::LessEqual => Some(l <= r),
        BinaryOp::GreaterEqual => Some(l >= r),
        BinaryOp::Equal => Some(l == r),
        BinaryOp::NotEqual => Some(l != r),
        _ => None,
    }
}

fn fold_bool(op: BinaryOp, l: bool, r: bool) -> Option<bool> {
    match op {
        BinaryOp::Equal => Some(l == r),
        BinaryOp::NotEqual => Some(l != r),
        BinaryOp::LogicalAnd => Some(l && r),
        BinaryOp::LogicalOr => Some(l || r),
        _ => None,
    }
}

fn fold_unary(op: UnaryOp, operand: &Constant, ty: &Type) -> Option<Constant> {
    if !is_componentwise(&operand.ty) {
        return None;
    }
    let value = match (op, &operand.value) {
        (UnaryOp::Negate, ConstantValue::Float(v)) => {
            ConstantValue::Float(v.iter().map(|x| -x).collect())
        }
        (UnaryOp::Negate, ConstantValue::Int(v)) => {
            ConstantValue::Int(v.iter().map(|x| x.wrapping_neg()).collect())
        }
        (UnaryOp::Abs, ConstantValue::Float(v)) => {
            ConstantValue::Float(v.iter().map(|x| x.abs()).collect())
        }
        (UnaryOp::Abs, ConstantValue::Int(v)) => {
            ConstantValue::Int(v.iter().map(|x| x.wrapping_abs()).collect())
        }
        (UnaryOp::Floor, ConstantValue::Float(v)) => {
            ConstantValue::Float(v.iter().map(|x| x.floor()).collect())
        }
        (UnaryOp::Sqrt, ConstantValue::Float(v)) => {
            ConstantValue::Float(v.iter().map(|x| x.sqrt()).collect())
        }
        (UnaryOp::Rsq, ConstantValue::Float(v)) => {
            ConstantValue::Float(v.iter().map(|x| 1.0 / x.sqrt()).collect())
        }
        (UnaryOp::LogicalNot, ConstantValue::Bool(v)) => {
            ConstantValue::Bool(v.iter().map(|x| !x).collect())
        }
        _ => return None,
    };
    Some(Constant {
        ty: ty.clone(),
        value,
    })
}

fn fold_swizzle(value: &Constant, components: &[u8], ty: &Type) -> Option<Constant> {
    fn pick<T: Copy>(v: &[T], components: &[u8]) -> Option<Vec<T>> {
        components.iter().map(|&i| v.get(i as usize).copied()).collect()
    }
    if !is_componentwise(&value.ty) {
        return None;
    }
    let value = match &value.value {
        ConstantValue::Bool(v) => ConstantValue::Bool(pick(v, components)?),
        ConstantValue::Int(v) => ConstantValue::Int(pick(v, components)?),
        ConstantValue::Uint(v) => ConstantValue::Uint(pick(v, components)?),
        ConstantValue::Float(v) => ConstantValue::Float(pick(v, components)?),
        ConstantValue::Composite(_) => return None,
    };
    Some(Constant {
        ty: ty.clone(),
        value,
    })
}
