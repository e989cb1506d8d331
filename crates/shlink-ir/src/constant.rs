//! Compile-time constant values.

use crate::types::Type;

/// Payload of a [`Constant`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstantValue {
    Bool(Vec<bool>),
    Int(Vec<i32>),
    Uint(Vec<u32>),
    /// Scalar, vector or column-major matrix components.
    Float(Vec<f32>),
    /// Array elements or struct fields, in order.
    Composite(Vec<Constant>),
}

/// A typed constant, used for initializers and folded expressions.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constant {
    pub ty: Type,
    pub value: ConstantValue,
}

impl Constant {
    pub fn float(v: f32) -> Self {
        Self {
            ty: Type::FLOAT,
            value: ConstantValue::Float(vec![v]),
        }
    }

    pub fn int(v: i32) -> Self {
        Self {
            ty: Type::INT,
            value: ConstantValue::Int(vec![v]),
        }
    }

    pub fn uint(v: u32) -> Self {
        Self {
            ty: Type::UINT,
            value: ConstantValue::Uint(vec![v]),
        }
    }

    pub fn bool(v: bool) -> Self {
        Self {
            ty: Type::BOOL,
            value: ConstantValue::Bool(vec![v]),
        }
    }

    /// A float vector or matrix constant of type `ty`.
    pub fn floats(ty: Type, components: Vec<f32>) -> Self {
        Self {
            ty,
            value: ConstantValue::Float(components),
        }
    }

    /// Returns `true` if both constants have the same type and value.
    ///
    /// Float components compare bitwise so that `-0.0` and `0.0` differ and
    /// identical NaNs match.
    pub fn has_value(&self, other: &Constant) -> bool {
        if self.ty != other.ty {
            return false;
        }
        match (&self.value, &other.value) {
            (ConstantValue::Float(a), ConstantValue::Float(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (ConstantValue::Composite(a), ConstantValue::Composite(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.has_value(y))
            }
            (a, b) => a == b,
        }
    }

    /// Returns the value as a single boolean, if it is a scalar bool.
    pub fn as_bool(&self) -> Option<bool> {
        match &self.value {
            ConstantValue::Bool(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// Returns the value as a non-negative index, if it is an integer scalar.
    pub fn as_index(&self) -> Option<u32> {
        match &self.value {
            ConstantValue::Int(v) if v.len() == 1 => u32::try_from(v[0]).ok(),
            ConstantValue::Uint(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }
}
