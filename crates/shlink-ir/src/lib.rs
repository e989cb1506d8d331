//! shlink intermediate representation.
//!
//! A tree IR for shader translation units and linked stage executables.
//! Each [`Shader`] owns its variables and functions in arenas; instruction
//! trees refer to them by [`Handle`]. Handles never cross shaders: IR moved
//! between shaders is cloned and remapped.

pub mod arena;
mod constant;
mod display;
mod error;
mod function;
mod ir;
mod shader;
mod types;
mod variable;
pub mod visit;

pub use arena::{Arena, Handle};
pub use constant::{Constant, ConstantValue};
pub use display::dump_shader;
pub use error::IrError;
pub use function::{Function, Signature};
pub use ir::{BinaryOp, Block, Callee, Deref, Instruction, Rvalue, UnaryOp};
pub use shader::{
    GeometryLayout, PrimitiveType, Shader, Stage, SymbolTable, UniformBlock, UniformBlockMember,
};
pub use types::{ArraySize, InterfacePacking, SamplerDim, ScalarKind, StructField, Type, VectorSize};
pub use variable::{DepthLayout, Interpolation, Variable, VariableMode};
