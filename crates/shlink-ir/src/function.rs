//! Functions and their overloaded signatures.

use crate::arena::Handle;
use crate::ir::Block;
use crate::types::Type;
use crate::variable::Variable;

/// One overload of a function.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Signature {
    pub return_type: Type,
    /// Parameter variables, in declaration order.
    pub parameters: Vec<Handle<Variable>>,
    pub body: Block,
    /// `false` for a prototype without a body.
    pub is_defined: bool,
    /// Stub provided by the built-in function library.
    pub is_builtin: bool,
}

impl Signature {
    /// A prototype with no body.
    pub fn prototype(return_type: Type, parameters: Vec<Handle<Variable>>) -> Self {
        Self {
            return_type,
            parameters,
            ..Default::default()
        }
    }

    /// A defined signature.
    pub fn defined(return_type: Type, parameters: Vec<Handle<Variable>>, body: Block) -> Self {
        Self {
            return_type,
            parameters,
            body,
            is_defined: true,
            is_builtin: false,
        }
    }
}

/// A named function with one or more signatures.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    pub name: String,
    pub signatures: Vec<Signature>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signatures: Vec::new(),
        }
    }
}
