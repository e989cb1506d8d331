//! Type system for shlink IR.
//!
//! Types are plain values compared structurally, so a type produced by one
//! translation unit can be compared with, or moved into, any other shader.

/// The kind of a scalar type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    Float,
}

/// Number of components in a vector, or columns/rows of a matrix.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VectorSize {
    /// 2 components.
    Bi = 2,
    /// 3 components.
    Tri = 3,
    /// 4 components.
    Quad = 4,
}

/// Size of an array.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArraySize {
    /// Explicitly (or link-time) sized array.
    Constant(u32),
    /// Implicitly sized; the length is inferred from the accesses at link time.
    Unsized,
}

/// Dimensionality of a sampler type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SamplerDim {
    D1,
    D2,
    D3,
    Cube,
    Rect,
    Buffer,
    D1Array,
    D2Array,
    CubeArray,
    D2Multisample,
}

/// Packing rule of an interface block.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterfacePacking {
    #[default]
    Std140,
    Shared,
    Packed,
}

/// A field of a struct or interface block type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    #[cfg_attr(feature = "serde", serde(default))]
    pub row_major: bool,
}

impl StructField {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            row_major: false,
        }
    }
}

/// A shading language type.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    #[default]
    Void,
    Scalar(ScalarKind),
    Vector {
        size: VectorSize,
        kind: ScalarKind,
    },
    /// A float matrix of column vectors.
    Matrix {
        columns: VectorSize,
        rows: VectorSize,
    },
    Sampler {
        dim: SamplerDim,
        kind: ScalarKind,
        shadow: bool,
    },
    AtomicUint,
    Array {
        base: Box<Type>,
        size: ArraySize,
    },
    Struct {
        name: String,
        fields: Vec<StructField>,
    },
    Interface {
        name: String,
        fields: Vec<StructField>,
        packing: InterfacePacking,
    },
}

impl Type {
    pub const BOOL: Self = Self::Scalar(ScalarKind::Bool);
    pub const INT: Self = Self::Scalar(ScalarKind::Int);
    pub const UINT: Self = Self::Scalar(ScalarKind::Uint);
    pub const FLOAT: Self = Self::Scalar(ScalarKind::Float);
    pub const VEC2: Self = Self::vec(VectorSize::Bi);
    pub const VEC3: Self = Self::vec(VectorSize::Tri);
    pub const VEC4: Self = Self::vec(VectorSize::Quad);
    pub const MAT3: Self = Self::Matrix {
        columns: VectorSize::Tri,
        rows: VectorSize::Tri,
    };
    pub const MAT4: Self = Self::Matrix {
        columns: VectorSize::Quad,
        rows: VectorSize::Quad,
    };
    pub const SAMPLER_2D: Self = Self::Sampler {
        dim: SamplerDim::D2,
        kind: ScalarKind::Float,
        shadow: false,
    };

    /// A float vector of the given size.
    pub const fn vec(size: VectorSize) -> Self {
        Self::Vector {
            size,
            kind: ScalarKind::Float,
        }
    }

    /// An explicitly sized array of `base`.
    pub fn array(base: Type, length: u32) -> Self {
        Self::Array {
            base: Box::new(base),
            size: ArraySize::Constant(length),
        }
    }

    /// An implicitly sized array of `base`.
    pub fn unsized_array(base: Type) -> Self {
        Self::Array {
            base: Box::new(base),
            size: ArraySize::Unsized,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    pub fn is_unsized_array(&self) -> bool {
        matches!(
            self,
            Self::Array {
                size: ArraySize::Unsized,
                ..
            }
        )
    }

    pub fn is_interface(&self) -> bool {
        matches!(self, Self::Interface { .. })
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self, Self::Sampler { .. })
    }

    /// Length of an array type; `Some(0)` for an unsized array, `None` for
    /// non-arrays.
    pub fn array_length(&self) -> Option<u32> {
        match *self {
            Self::Array {
                size: ArraySize::Constant(n),
                ..
            } => Some(n),
            Self::Array {
                size: ArraySize::Unsized,
                ..
            } => Some(0),
            _ => None,
        }
    }

    /// Element type of an array type.
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Self::Array { base, .. } => Some(base),
            _ => None,
        }
    }

    /// Returns this array type with its length replaced.
    ///
    /// Non-array types are returned unchanged.
    pub fn with_array_length(&self, length: u32) -> Type {
        match self {
            Self::Array { base, .. } => Self::array((**base).clone(), length),
            other => other.clone(),
        }
    }

    /// Fields of a struct or interface type.
    pub fn fields(&self) -> &[StructField] {
        match self {
            Self::Struct { fields, .. } | Self::Interface { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Index of the named field of a struct or interface type.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    /// Type name of a struct or interface type.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Struct { name, .. } | Self::Interface { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Number of scalar components in a scalar, vector or matrix type.
    pub fn components(&self) -> u32 {
        match *self {
            Self::Scalar(_) => 1,
            Self::Vector { size, .. } => size as u32,
            Self::Matrix { columns, rows } => columns as u32 * rows as u32,
            _ => 0,
        }
    }

    /// Number of uniform components (scalar slots) occupied by values of
    /// this type. Samplers and atomic counters occupy none.
    pub fn component_slots(&self) -> u32 {
        match self {
            Self::Scalar(_) | Self::Vector { .. } | Self::Matrix { .. } => self.components(),
            Self::Array { base, .. } => {
                self.array_length().unwrap_or(0) * base.component_slots()
            }
            Self::Struct { fields, .. } | Self::Interface { fields, .. } => {
                fields.iter().map(|f| f.ty.component_slots()).sum()
            }
            Self::Void | Self::Sampler { .. } | Self::AtomicUint => 0,
        }
    }

    /// Number of generic attribute / draw buffer / varying slots consumed
    /// by a variable of this type. Matrices take one slot per column.
    pub fn count_attribute_slots(&self) -> u32 {
        match self {
            Self::Scalar(_) | Self::Vector { .. } => 1,
            Self::Matrix { columns, .. } => *columns as u32,
            Self::Array { base, .. } => {
                self.array_length().unwrap_or(0) * base.count_attribute_slots()
            }
            Self::Struct { fields, .. } | Self::Interface { fields, .. } => {
                fields.iter().map(|f| f.ty.count_attribute_slots()).sum()
            }
            Self::Void | Self::Sampler { .. } | Self::AtomicUint => 0,
        }
    }

    /// Number of sampler units consumed.
    pub fn sampler_count(&self) -> u32 {
        match self {
            Self::Sampler { .. } => 1,
            Self::Array { base, .. } => self.array_length().unwrap_or(0) * base.sampler_count(),
            Self::Struct { fields, .. } => fields.iter().map(|f| f.ty.sampler_count()).sum(),
            _ => 0,
        }
    }

    pub fn contains_atomic(&self) -> bool {
        match self {
            Self::AtomicUint => true,
            Self::Array { base, .. } => base.contains_atomic(),
            Self::Struct { fields, .. } => fields.iter().any(|f| f.ty.contains_atomic()),
            _ => false,
        }
    }

    pub fn contains_sampler(&self) -> bool {
        self.sampler_count() > 0 || matches!(self, Self::Array { base, .. } if base.contains_sampler())
    }

    /// Interface block type contained in this type, looking through one
    /// level of array.
    pub fn interface(&self) -> Option<&Type> {
        match self {
            Self::Interface { .. } => Some(self),
            Self::Array { base, .. } if base.is_interface() => Some(base),
            _ => None,
        }
    }
}
