//! Error types for the shlink IR.

/// Structural problems found in an instruction tree.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IrError {
    /// A handle index is out of bounds for its arena.
    #[error("handle index {index} out of bounds (arena size: {size})")]
    BadHandle { index: usize, size: usize },

    /// A variable is dereferenced but not declared in any enclosing scope.
    #[error("variable `{name}' referenced but not declared")]
    UndeclaredVariable { name: String },

    /// A callee points at a signature that does not exist.
    #[error("call to `{function}' references missing signature {signature}")]
    BadSignature { function: String, signature: usize },

    /// `break` or `continue` outside of a loop.
    #[error("`{0}' outside of a loop")]
    OrphanedJump(&'static str),

    /// A variable is declared twice within one executable.
    #[error("variable `{name}' declared more than once")]
    DuplicateDeclaration { name: String },
}
