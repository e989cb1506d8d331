//! Instruction trees, rvalues and dereferences.

use crate::arena::{Arena, Handle};
use crate::constant::Constant;
use crate::function::Function;
use crate::types::Type;
use crate::variable::Variable;

/// Unary operators.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Negate,
    LogicalNot,
    Abs,
    Sqrt,
    Rsq,
    Floor,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    LogicalAnd,
    LogicalOr,
    Dot,
}

/// An lvalue-capable reference to storage.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Deref {
    /// The whole variable. Its type is the variable's type.
    Variable(Handle<Variable>),
    /// One element of an array, matrix column or vector component.
    Array {
        array: Box<Deref>,
        index: Box<Rvalue>,
        ty: Type,
    },
    /// A named field of a struct or interface block instance.
    Record {
        record: Box<Deref>,
        field: String,
        ty: Type,
    },
}

impl Deref {
    /// Element `index` of this array. The element type is taken from
    /// `array_ty`, the type of `self`.
    pub fn element(self, index: Rvalue, array_ty: &Type) -> Deref {
        let ty = array_ty.element_type().cloned().unwrap_or(Type::Void);
        Deref::Array {
            array: Box::new(self),
            index: Box::new(index),
            ty,
        }
    }

    /// Field `name` of this record, with `record_ty` the type of `self`.
    pub fn field(self, name: impl Into<String>, record_ty: &Type) -> Deref {
        let name = name.into();
        let ty = record_ty
            .field_index(&name)
            .map(|i| record_ty.fields()[i].ty.clone())
            .unwrap_or(Type::Void);
        Deref::Record {
            record: Box::new(self),
            field: name,
            ty,
        }
    }

    /// The variable at the root of this dereference chain.
    pub fn variable_referenced(&self) -> Handle<Variable> {
        match self {
            Self::Variable(h) => *h,
            Self::Array { array, .. } => array.variable_referenced(),
            Self::Record { record, .. } => record.variable_referenced(),
        }
    }

    /// Type of the dereferenced value.
    pub fn ty<'a>(&'a self, variables: &'a Arena<Variable>) -> &'a Type {
        match self {
            Self::Variable(h) => &variables[*h].ty,
            Self::Array { ty, .. } | Self::Record { ty, .. } => ty,
        }
    }

    /// Index expression, if this is a constant-indexed array deref.
    pub fn constant_index(&self) -> Option<u32> {
        match self {
            Self::Array { index, .. } => match index.as_ref() {
                Rvalue::Constant(c) => c.as_index(),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A value-producing expression tree.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rvalue {
    Constant(Constant),
    Deref(Deref),
    Unary {
        op: UnaryOp,
        operand: Box<Rvalue>,
        ty: Type,
    },
    Binary {
        op: BinaryOp,
        left: Box<Rvalue>,
        right: Box<Rvalue>,
        ty: Type,
    },
    Swizzle {
        value: Box<Rvalue>,
        components: Vec<u8>,
        ty: Type,
    },
    /// Constructor call such as `vec4(a, b)`.
    Compose {
        ty: Type,
        components: Vec<Rvalue>,
    },
    Texture {
        sampler: Deref,
        coordinate: Box<Rvalue>,
        ty: Type,
    },
}

impl Rvalue {
    pub fn var(handle: Handle<Variable>) -> Self {
        Self::Deref(Deref::Variable(handle))
    }

    pub fn binary(op: BinaryOp, left: Rvalue, right: Rvalue, ty: Type) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        }
    }

    pub fn unary(op: UnaryOp, operand: Rvalue, ty: Type) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
            ty,
        }
    }

    /// Type of the produced value.
    pub fn ty<'a>(&'a self, variables: &'a Arena<Variable>) -> &'a Type {
        match self {
            Self::Constant(c) => &c.ty,
            Self::Deref(d) => d.ty(variables),
            Self::Unary { ty, .. }
            | Self::Binary { ty, .. }
            | Self::Swizzle { ty, .. }
            | Self::Compose { ty, .. }
            | Self::Texture { ty, .. } => ty,
        }
    }

    /// The variable referenced if this rvalue is a plain dereference.
    pub fn variable_referenced(&self) -> Option<Handle<Variable>> {
        match self {
            Self::Deref(d) => Some(d.variable_referenced()),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Self::Constant(c) => Some(c),
            _ => None,
        }
    }
}

/// Target of a call: one signature of a function in the same shader.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Callee {
    pub function: Handle<Function>,
    pub signature: usize,
}

/// A node of an instruction list.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instruction {
    /// Declares a variable in the enclosing scope.
    Declare(Handle<Variable>),
    /// Declares a function (top level only).
    Function(Handle<Function>),
    Assign {
        lhs: Deref,
        rhs: Rvalue,
        condition: Option<Rvalue>,
    },
    Call {
        callee: Callee,
        arguments: Vec<Rvalue>,
        /// Where the return value is stored.
        result: Option<Deref>,
    },
    If {
        condition: Rvalue,
        accept: Block,
        reject: Block,
    },
    Loop {
        body: Block,
    },
    Break,
    Continue,
    Return(Option<Rvalue>),
    Discard,
    EmitVertex,
    EndPrimitive,
}

impl Instruction {
    /// Unconditional assignment.
    pub fn assign(lhs: Deref, rhs: Rvalue) -> Self {
        Self::Assign {
            lhs,
            rhs,
            condition: None,
        }
    }

    /// Returns `true` for variable and function declarations.
    pub fn is_declaration(&self) -> bool {
        matches!(self, Self::Declare(_) | Self::Function(_))
    }
}

/// An ordered instruction list.
pub type Block = Vec<Instruction>;
