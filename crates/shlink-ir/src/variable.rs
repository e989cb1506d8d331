//! Variable declarations.

use crate::constant::Constant;
use crate::types::Type;

/// Storage mode of a variable.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariableMode {
    /// Ordinary global or local storage.
    #[default]
    Auto,
    Uniform,
    ShaderIn,
    ShaderOut,
    FunctionIn,
    FunctionOut,
    FunctionInout,
    /// Function parameter declared `const in`.
    ConstIn,
    SystemValue,
    /// Compiler-generated temporary.
    Temporary,
}

impl VariableMode {
    /// Returns `true` for modes that belong to a stage interface.
    pub fn is_interface(self) -> bool {
        matches!(self, Self::ShaderIn | Self::ShaderOut)
    }

    /// Returns `true` for function parameter modes.
    pub fn is_parameter(self) -> bool {
        matches!(
            self,
            Self::FunctionIn | Self::FunctionOut | Self::FunctionInout | Self::ConstIn
        )
    }

    /// Returns `true` if a call writes through a parameter of this mode.
    pub fn is_writable_parameter(self) -> bool {
        matches!(self, Self::FunctionOut | Self::FunctionInout)
    }
}

/// Interpolation qualifier of a stage input or output.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interpolation {
    Smooth,
    Flat,
    NoPerspective,
}

/// Conservative depth layout of `gl_FragDepth`.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DepthLayout {
    #[default]
    None,
    Any,
    Greater,
    Less,
    Unchanged,
}

/// A variable declaration.
///
/// Variables live in the [`Arena`](crate::Arena) of the shader that
/// declares them and are referenced by handle.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub mode: VariableMode,
    pub interpolation: Option<Interpolation>,
    pub centroid: bool,
    pub invariant: bool,
    pub read_only: bool,
    /// Location was set by a layout qualifier or is fixed for a built-in.
    pub explicit_location: bool,
    /// Generic slot relative to the first generic location of the target.
    pub location: Option<u32>,
    /// Fragment output index for dual-source blending.
    pub index: u32,
    pub explicit_binding: bool,
    pub binding: u32,
    pub atomic_offset: u32,
    pub depth_layout: DepthLayout,
    pub constant_initializer: Option<Constant>,
    pub has_initializer: bool,
    /// The variable is statically written somewhere in the shader.
    pub used: bool,
    /// Highest constant array index observed by the front end.
    pub max_array_access: u32,
    /// Per-member highest array index for interface block instances.
    pub max_ifc_array_access: Vec<u32>,
    /// Block type of an unnamed-block member or a named block instance.
    pub interface_type: Option<Type>,
    /// Set while a generic input or output has no counterpart in the
    /// adjacent stage.
    pub is_unmatched_generic_inout: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: Type, mode: VariableMode) -> Self {
        Self {
            name: name.into(),
            ty,
            mode,
            ..Default::default()
        }
    }

    /// Returns `true` for `gl_`-prefixed built-in variables.
    pub fn is_builtin(&self) -> bool {
        self.name.starts_with("gl_")
    }

    /// Member of a uniform block (named or unnamed).
    pub fn is_in_uniform_block(&self) -> bool {
        self.mode == VariableMode::Uniform && self.interface_type.is_some()
    }

    /// Human-readable storage description used in link diagnostics.
    pub fn mode_string(&self) -> &'static str {
        match self.mode {
            VariableMode::Auto => {
                if self.read_only {
                    "global constant"
                } else {
                    "global variable"
                }
            }
            VariableMode::Uniform => "uniform",
            VariableMode::ShaderIn => "shader input",
            VariableMode::ShaderOut => "shader output",
            VariableMode::FunctionIn | VariableMode::ConstIn => "function input",
            VariableMode::FunctionOut => "function output",
            VariableMode::FunctionInout => "function inout",
            VariableMode::SystemValue => "shader input",
            VariableMode::Temporary => "compiler temporary",
        }
    }

    /// Builder: explicit location.
    pub fn with_location(mut self, location: u32) -> Self {
        self.explicit_location = true;
        self.location = Some(location);
        self
    }

    /// Builder: constant initializer.
    pub fn with_initializer(mut self, value: Constant) -> Self {
        self.constant_initializer = Some(value);
        self.has_initializer = true;
        self
    }

    /// Builder: highest constant array index observed.
    pub fn with_max_access(mut self, max: u32) -> Self {
        self.max_array_access = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_strings() {
        let mut v = Variable::new("x", Type::FLOAT, VariableMode::Auto);
        assert_eq!(v.mode_string(), "global variable");
        v.read_only = true;
        assert_eq!(v.mode_string(), "global constant");
        v.mode = VariableMode::Uniform;
        assert_eq!(v.mode_string(), "uniform");
        v.mode = VariableMode::ShaderOut;
        assert_eq!(v.mode_string(), "shader output");
    }

    #[test]
    fn builtin_detection() {
        assert!(Variable::new("gl_Position", Type::VEC4, VariableMode::ShaderOut).is_builtin());
        assert!(!Variable::new("color", Type::VEC4, VariableMode::ShaderOut).is_builtin());
    }

    #[test]
    fn builders() {
        let v = Variable::new("a", Type::VEC4, VariableMode::ShaderIn)
            .with_location(3)
            .with_max_access(2);
        assert!(v.explicit_location);
        assert_eq!(v.location, Some(3));
        assert_eq!(v.max_array_access, 2);

        let u = Variable::new("k", Type::FLOAT, VariableMode::Uniform)
            .with_initializer(Constant::float(0.5));
        assert!(u.has_initializer);
        assert!(u.constant_initializer.is_some());
    }
}
