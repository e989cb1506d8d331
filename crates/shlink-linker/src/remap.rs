//! Cloning IR from one shader into another.
//!
//! Handles are only meaningful inside the shader that owns them, so moving
//! instructions between shaders means rebuilding them against the target's
//! arenas. Locals are remapped through a scratch table; globals are
//! resolved by name in the target's symbol table, and a missing global
//! declaration is cloned to the head of the target.

use std::collections::HashMap;

use shlink_ir::{Block, Callee, Deref, Handle, Instruction, Rvalue, Shader, Signature, Variable};

pub(crate) struct IrCloner<'s> {
    src: &'s Shader,
    locals: HashMap<Handle<Variable>, Handle<Variable>>,
}

impl<'s> IrCloner<'s> {
    pub(crate) fn new(src: &'s Shader) -> Self {
        Self {
            src,
            locals: HashMap::new(),
        }
    }

    /// Routes references to `from` in the source to `to` in the target.
    pub(crate) fn map_local(&mut self, from: Handle<Variable>, to: Handle<Variable>) {
        self.locals.insert(from, to);
    }

    /// Copies a local variable into the target's arena without declaring it.
    pub(crate) fn clone_local(&mut self, dst: &mut Shader, h: Handle<Variable>) -> Handle<Variable> {
        let new = dst.add_variable(self.src.variables[h].clone());
        self.locals.insert(h, new);
        new
    }

    fn variable(&mut self, dst: &mut Shader, h: Handle<Variable>) -> Handle<Variable> {
        if let Some(&mapped) = self.locals.get(&h) {
            return mapped;
        }
        let var = &self.src.variables[h];
        if let Some(existing) = dst.symbols.get_variable(&var.name) {
            return existing;
        }
        log::debug!("cloning declaration of `{}' into {} shader", var.name, dst.stage);
        let new = dst.add_variable(var.clone());
        dst.ir.insert(0, Instruction::Declare(new));
        dst.symbols.add_variable(&var.name, new);
        new
    }

    /// Finds or creates, in the target, the function and signature matching
    /// `callee` by name and parameter types.
    ///
    /// A signature the target does not have yet is added as a prototype;
    /// function linking fills in its body later.
    pub(crate) fn callee(&mut self, dst: &mut Shader, callee: Callee) -> Callee {
        let src = self.src;
        let name = src.functions[callee.function].name.clone();
        let types = src.parameter_types(callee);
        let function = dst.declare_function(&name);
        if let Some(signature) = dst.find_signature(function, &types) {
            return Callee {
                function,
                signature,
            };
        }
        let src_sig = src.signature(callee);
        let parameters = src_sig
            .parameters
            .iter()
            .map(|&p| dst.add_variable(src.variables[p].clone()))
            .collect();
        let mut prototype = Signature::prototype(src_sig.return_type.clone(), parameters);
        prototype.is_builtin = src_sig.is_builtin;
        dst.add_signature(function, prototype)
    }

    pub(crate) fn block(&mut self, dst: &mut Shader, block: &[Instruction]) -> Block {
        block
            .iter()
            .filter_map(|inst| self.instruction(dst, inst))
            .collect()
    }

    /// Clones one instruction. Function declarations are not cloned.
    pub(crate) fn instruction(&mut self, dst: &mut Shader, inst: &Instruction) -> Option<Instruction> {
        let cloned = match inst {
            Instruction::Declare(h) => Instruction::Declare(self.clone_local(dst, *h)),
            Instruction::Function(_) => return None,
            Instruction::Assign {
                lhs,
                rhs,
                condition,
            } => Instruction::Assign {
                lhs: self.deref(dst, lhs),
                rhs: self.rvalue(dst, rhs),
                condition: condition.as_ref().map(|c| self.rvalue(dst, c)),
            },
            Instruction::Call {
                callee,
                arguments,
                result,
            } => Instruction::Call {
                callee: self.callee(dst, *callee),
                arguments: arguments.iter().map(|a| self.rvalue(dst, a)).collect(),
                result: result.as_ref().map(|r| self.deref(dst, r)),
            },
            Instruction::If {
                condition,
                accept,
                reject,
            } => Instruction::If {
                condition: self.rvalue(dst, condition),
                accept: self.block(dst, accept),
                reject: self.block(dst, reject),
            },
            Instruction::Loop { body } => Instruction::Loop {
                body: self.block(dst, body),
            },
            Instruction::Return(value) => {
                Instruction::Return(value.as_ref().map(|v| self.rvalue(dst, v)))
            }
            Instruction::Break => Instruction::Break,
            Instruction::Continue => Instruction::Continue,
            Instruction::Discard => Instruction::Discard,
            Instruction::EmitVertex => Instruction::EmitVertex,
            Instruction::EndPrimitive => Instruction::EndPrimitive,
        };
        Some(cloned)
    }

    fn deref(&mut self, dst: &mut Shader, deref: &Deref) -> Deref {
        match deref {
            Deref::Variable(h) => Deref::Variable(self.variable(dst, *h)),
            Deref::Array { array, index, ty } => Deref::Array {
                array: Box::new(self.deref(dst, array)),
                index: Box::new(self.rvalue(dst, index)),
                ty: ty.clone(),
            },
            Deref::Record { record, field, ty } => Deref::Record {
                record: Box::new(self.deref(dst, record)),
                field: field.clone(),
                ty: ty.clone(),
            },
        }
    }

    fn rvalue(&mut self, dst: &mut Shader, rvalue: &Rvalue) -> Rvalue {
        match rvalue {
            Rvalue::Constant(c) => Rvalue::Constant(c.clone()),
            Rvalue::Deref(d) => Rvalue::Deref(self.deref(dst, d)),
            Rvalue::Unary { op, operand, ty } => Rvalue::Unary {
                op: *op,
                operand: Box::new(self.rvalue(dst, operand)),
                ty: ty.clone(),
            },
            Rvalue::Binary {
                op,
                left,
                right,
                ty,
            } => Rvalue::Binary {
                op: *op,
                left: Box::new(self.rvalue(dst, left)),
                right: Box::new(self.rvalue(dst, right)),
                ty: ty.clone(),
            },
            Rvalue::Swizzle {
                value,
                components,
                ty,
            } => Rvalue::Swizzle {
                value: Box::new(self.rvalue(dst, value)),
                components: components.clone(),
                ty: ty.clone(),
            },
            Rvalue::Compose { ty, components } => Rvalue::Compose {
                ty: ty.clone(),
                components: components.iter().map(|c| self.rvalue(dst, c)).collect(),
            },
            Rvalue::Texture {
                sampler,
                coordinate,
                ty,
            } => Rvalue::Texture {
                sampler: self.deref(dst, sampler),
                coordinate: Box::new(self.rvalue(dst, coordinate)),
                ty: ty.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shlink_ir::{Constant, Stage, Type, VariableMode};

    #[test]
    fn globals_resolve_by_name() {
        let mut src = Shader::new(Stage::Vertex, 130);
        let u = src.declare(Variable::new("scale", Type::FLOAT, VariableMode::Uniform));
        let x = src.declare(Variable::new("x", Type::FLOAT, VariableMode::Auto));
        let stmt = Instruction::assign(Deref::Variable(x), Rvalue::var(u));

        let mut dst = Shader::new(Stage::Vertex, 130);
        let dst_x = dst.declare(Variable::new("x", Type::FLOAT, VariableMode::Auto));

        let mut cloner = IrCloner::new(&src);
        let cloned = cloner.instruction(&mut dst, &stmt).unwrap();
        let dst_scale = dst.symbols.get_variable("scale").unwrap();
        assert_eq!(dst.ir[0], Instruction::Declare(dst_scale));
        assert_eq!(
            cloned,
            Instruction::assign(Deref::Variable(dst_x), Rvalue::var(dst_scale))
        );
    }

    #[test]
    fn locals_are_copied_not_shared() {
        let mut src = Shader::new(Stage::Fragment, 130);
        let t = src.add_variable(Variable::new("t", Type::FLOAT, VariableMode::Temporary));
        let body = vec![
            Instruction::Declare(t),
            Instruction::assign(Deref::Variable(t), Rvalue::Constant(Constant::float(1.0))),
        ];
        let mut dst = Shader::new(Stage::Fragment, 130);
        dst.declare(Variable::new("other", Type::INT, VariableMode::Auto));

        let mut cloner = IrCloner::new(&src);
        let cloned = cloner.block(&mut dst, &body);
        let Instruction::Declare(new_t) = cloned[0] else {
            panic!("expected a declaration");
        };
        assert_eq!(dst.variables[new_t].name, "t");
        assert!(dst.symbols.get_variable("t").is_none());
        match &cloned[1] {
            Instruction::Assign { lhs, .. } => assert_eq!(lhs.variable_referenced(), new_t),
            other => panic!("unexpected instruction: {other:?}"),
        }
    }

    #[test]
    fn calls_create_prototypes() {
        let mut src = Shader::new(Stage::Vertex, 130);
        let f = src.declare_function("helper");
        let p = src.add_variable(Variable::new("p", Type::VEC4, VariableMode::FunctionIn));
        let sig = src.add_signature(f, Signature::defined(Type::VEC4, vec![p], vec![]));
        let call = Instruction::Call {
            callee: sig,
            arguments: vec![Rvalue::Constant(Constant::floats(Type::VEC4, vec![0.0; 4]))],
            result: None,
        };

        let mut dst = Shader::new(Stage::Vertex, 130);
        let mut cloner = IrCloner::new(&src);
        let Some(Instruction::Call { callee, .. }) = cloner.instruction(&mut dst, &call) else {
            panic!("expected a call");
        };
        let target = dst.signature(callee);
        assert!(!target.is_defined);
        assert_eq!(dst.parameter_types(callee), vec![Type::VEC4]);
        assert_eq!(dst.symbols.get_function("helper"), Some(callee.function));
    }
}
