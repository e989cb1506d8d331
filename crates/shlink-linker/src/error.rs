//! Link errors.
//!
//! Every variant's `Display` is the exact line written to the program's
//! info log.

use shlink_ir::{Stage, Type};

/// Broad category of a link diagnostic.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ErrorKind {
    /// Conflicting declarations of the same global.
    CrossDeclaration,
    /// No `main`, or a stage required by the dialect is absent.
    MissingEntryPoint,
    /// The same function signature is defined in two units.
    MultiplyDefined,
    /// A per-stage rule is violated.
    StageSemantic,
    /// A stage output disagrees with the matching input of the next stage.
    InterfaceMismatch,
    /// A location allocation failed or a counted resource is over its limit.
    ResourceExhausted,
    /// A called function is defined nowhere.
    UnresolvedReference,
    /// A function calls itself, directly or indirectly.
    Recursion,
    /// A transform feedback request cannot be satisfied.
    TransformFeedback,
    /// Units disagree on dialect or version.
    Version,
}

fn has(flag: bool) -> &'static str {
    if flag { "has" } else { "lacks" }
}

/// A single link diagnostic.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LinkError {
    #[error("{mode} `{name}' declared as type `{new}' and type `{existing}'")]
    TypeMismatch {
        mode: &'static str,
        name: String,
        new: Type,
        existing: Type,
    },

    #[error("explicit locations for {mode} `{name}' have differing values")]
    LocationMismatch { mode: &'static str, name: String },

    #[error("explicit bindings for {mode} `{name}' have differing values")]
    BindingMismatch { mode: &'static str, name: String },

    #[error("offset specifications for {mode} `{name}' have differing values")]
    AtomicOffsetMismatch { mode: &'static str, name: String },

    #[error(
        "All redeclarations of gl_FragDepth in all fragment shaders in a single program must have the same set of qualifiers."
    )]
    FragDepthRedeclared,

    #[error(
        "If gl_FragDepth is redeclared with a layout qualifier in any fragment shader, it must be redeclared with the same layout qualifier in all fragment shaders that have assignments to gl_FragDepth"
    )]
    FragDepthLayoutDiffers,

    #[error("initializers for {mode} `{name}' have differing values")]
    InitializerMismatch { mode: &'static str, name: String },

    #[error("shared global variable `{0}' has multiple non-constant initializers.")]
    MultipleNonConstantInitializers(String),

    #[error("declarations for {mode} `{name}' have mismatching invariant qualifiers")]
    InvariantMismatch { mode: &'static str, name: String },

    #[error("declarations for {mode} `{name}' have mismatching centroid qualifiers")]
    CentroidMismatch { mode: &'static str, name: String },

    #[error("definitions of interface block `{0}' do not match")]
    InterfaceBlockMismatch(String),

    #[error("uniform block `{0}' has mismatching definitions")]
    UniformBlockMismatch(String),

    #[error("uniform block `{name}' too big ({size}/{max})")]
    UniformBlockTooBig { name: String, size: u32, max: u32 },

    #[error("function `{0}' is multiply defined")]
    MultiplyDefined(String),

    #[error("{0} shader lacks `main'")]
    MissingMain(Stage),

    #[error("unresolved reference to function `{0}'")]
    UnresolvedFunction(String),

    #[error("function `{0}' has static recursion")]
    StaticRecursion(String),

    #[error("geometry shader defined with conflicting input types")]
    ConflictingGeometryInput,

    #[error("geometry shader defined with conflicting output types")]
    ConflictingGeometryOutput,

    #[error("geometry shader defined with conflicting output vertex count ({0} and {1})")]
    ConflictingVerticesOut(u32, u32),

    #[error("geometry shader didn't declare primitive input type")]
    MissingGeometryInput,

    #[error("geometry shader didn't declare primitive output type")]
    MissingGeometryOutput,

    #[error("geometry shader didn't declare max_vertices")]
    MissingMaxVertices,

    #[error("size of array {name} declared as {size}, but number of input vertices is {vertices}")]
    GeometryInputSize {
        name: String,
        size: u32,
        vertices: u32,
    },

    #[error("geometry shader accesses element {index} of {name}, but only {vertices} input vertices")]
    GeometryInputAccess {
        name: String,
        index: u32,
        vertices: u32,
    },

    #[error("vertex shader does not write to `gl_Position'")]
    MissingPositionWrite,

    #[error("{0} shader writes to both `gl_ClipVertex' and `gl_ClipDistance'")]
    ClipVertexAndDistance(Stage),

    #[error("fragment shader writes to both `gl_FragColor' and `gl_FragData'")]
    FragColorAndData,

    #[error(
        "{producer} shader output `{name}' declared as type `{output}', but {consumer} shader input declared as type `{input}'"
    )]
    InterfaceTypeMismatch {
        producer: Stage,
        consumer: Stage,
        name: String,
        output: Type,
        input: Type,
    },

    #[error(
        "{producer} shader output `{name}' {} centroid qualifier, but {consumer} shader input {} centroid qualifier",
        has(*.output),
        has(*.input)
    )]
    InterfaceCentroidMismatch {
        producer: Stage,
        consumer: Stage,
        name: String,
        output: bool,
        input: bool,
    },

    #[error(
        "{producer} shader output `{name}' {} invariant qualifier, but {consumer} shader input {} invariant qualifier",
        has(*.output),
        has(*.input)
    )]
    InterfaceInvariantMismatch {
        producer: Stage,
        consumer: Stage,
        name: String,
        output: bool,
        input: bool,
    },

    #[error(
        "{producer} shader output `{name}' specifies {output} interpolation qualifier, but {consumer} shader input specifies {input} interpolation qualifier"
    )]
    InterpolationMismatch {
        producer: Stage,
        consumer: Stage,
        name: String,
        output: &'static str,
        input: &'static str,
    },

    #[error("invalid explicit location {location} specified for `{name}'")]
    InvalidExplicitLocation { location: u32, name: String },

    /// `target` is "vertex shader input", "fragment shader output" or
    /// "varying".
    #[error("insufficient contiguous locations available for {target} `{name}'")]
    InsufficientLocations { target: &'static str, name: String },

    #[error("{stage} shader uses too many output components ({used} > {max})")]
    TooManyOutputComponents { stage: Stage, used: u32, max: u32 },

    #[error("{stage} shader uses too many input components ({used} > {max})")]
    TooManyInputComponents { stage: Stage, used: u32, max: u32 },

    #[error("Too many {0} shader texture samplers")]
    TooManySamplers(Stage),

    #[error("Too many {0} shader default uniform block components")]
    TooManyDefaultUniformComponents(Stage),

    #[error(
        "Too many {0} shader default uniform block components, but the driver will try to optimize them out; this is non-portable out-of-spec behavior"
    )]
    DefaultUniformComponentsOverLimit(Stage),

    #[error("Too many {0} shader uniform components")]
    TooManyUniformComponents(Stage),

    #[error(
        "Too many {0} shader uniform components, but the driver will try to optimize them out; this is non-portable out-of-spec behavior"
    )]
    UniformComponentsOverLimit(Stage),

    #[error("Too many combined uniform blocks ({count}/{max})")]
    TooManyCombinedUniformBlocks { count: usize, max: u32 },

    #[error("Too many {stage} uniform blocks ({count}/{max})")]
    TooManyUniformBlocks { stage: Stage, count: u32, max: u32 },

    #[error("all shaders must use same shading language version")]
    VersionMismatch,

    #[error("Geometry shader must be linked with vertex shader")]
    GeometryWithoutVertex,

    #[error("program lacks a vertex shader")]
    MissingVertexShader,

    #[error("program lacks a fragment shader")]
    MissingFragmentShader,

    #[error("Transform feedback varyings specified, but no vertex or geometry shader is present.")]
    FeedbackWithoutVertexStage,

    #[error("Transform feedback varying {0} specified more than once.")]
    FeedbackDuplicate(String),

    #[error("Transform feedback varying {0} undefined.")]
    FeedbackUndefined(String),

    #[error("Transform feedback varying {name} has index {index}, but the array size is {size}.")]
    FeedbackIndexOutOfRange { name: String, index: u32, size: u32 },

    #[error("Transform feedback varying {0} is not an array, but an index was specified.")]
    FeedbackIndexOnNonArray(String),

    #[error("Too many feedback components in interleaved mode ({used}/{max})")]
    TooManyInterleavedComponents { used: u32, max: u32 },

    #[error("Transform feedback varying {name} exceeds the separate mode component limit ({used}/{max})")]
    TooManySeparateComponents { name: String, used: u32, max: u32 },

    #[error("Too many feedback buffers in separate mode ({used}/{max})")]
    TooManyFeedbackBuffers { used: usize, max: u32 },
}

impl LinkError {
    /// Category of this diagnostic.
    pub fn kind(&self) -> ErrorKind {
        use LinkError::*;
        match self {
            TypeMismatch { .. }
            | LocationMismatch { .. }
            | BindingMismatch { .. }
            | AtomicOffsetMismatch { .. }
            | FragDepthRedeclared
            | FragDepthLayoutDiffers
            | InitializerMismatch { .. }
            | MultipleNonConstantInitializers(_)
            | InvariantMismatch { .. }
            | CentroidMismatch { .. }
            | InterfaceBlockMismatch(_)
            | UniformBlockMismatch(_) => ErrorKind::CrossDeclaration,
            MissingMain(_) | MissingVertexShader | MissingFragmentShader => {
                ErrorKind::MissingEntryPoint
            }
            MultiplyDefined(_) => ErrorKind::MultiplyDefined,
            UnresolvedFunction(_) => ErrorKind::UnresolvedReference,
            StaticRecursion(_) => ErrorKind::Recursion,
            ConflictingGeometryInput
            | ConflictingGeometryOutput
            | ConflictingVerticesOut(..)
            | MissingGeometryInput
            | MissingGeometryOutput
            | MissingMaxVertices
            | GeometryInputSize { .. }
            | GeometryInputAccess { .. }
            | MissingPositionWrite
            | ClipVertexAndDistance(_)
            | FragColorAndData
            | GeometryWithoutVertex => ErrorKind::StageSemantic,
            InterfaceTypeMismatch { .. }
            | InterfaceCentroidMismatch { .. }
            | InterfaceInvariantMismatch { .. }
            | InterpolationMismatch { .. } => ErrorKind::InterfaceMismatch,
            UniformBlockTooBig { .. }
            | InvalidExplicitLocation { .. }
            | InsufficientLocations { .. }
            | TooManyOutputComponents { .. }
            | TooManyInputComponents { .. }
            | TooManySamplers(_)
            | TooManyDefaultUniformComponents(_)
            | DefaultUniformComponentsOverLimit(_)
            | TooManyUniformComponents(_)
            | UniformComponentsOverLimit(_)
            | TooManyCombinedUniformBlocks { .. }
            | TooManyUniformBlocks { .. } => ErrorKind::ResourceExhausted,
            FeedbackWithoutVertexStage
            | FeedbackDuplicate(_)
            | FeedbackUndefined(_)
            | FeedbackIndexOutOfRange { .. }
            | FeedbackIndexOnNonArray(_)
            | TooManyInterleavedComponents { .. }
            | TooManySeparateComponents { .. }
            | TooManyFeedbackBuffers { .. } => ErrorKind::TransformFeedback,
            VersionMismatch => ErrorKind::Version,
        }
    }
}

/// A link phase stopped early. The reason is already in the info log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Halt;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_names_both_types() {
        let err = LinkError::TypeMismatch {
            mode: "uniform",
            name: "color".into(),
            new: Type::VEC3,
            existing: Type::VEC4,
        };
        assert_eq!(
            err.to_string(),
            "uniform `color' declared as type `vec3' and type `vec4'"
        );
        assert_eq!(err.kind(), ErrorKind::CrossDeclaration);
    }

    #[test]
    fn centroid_mismatch_wording() {
        let err = LinkError::InterfaceCentroidMismatch {
            producer: Stage::Vertex,
            consumer: Stage::Fragment,
            name: "uv".into(),
            output: true,
            input: false,
        };
        assert_eq!(
            err.to_string(),
            "vertex shader output `uv' has centroid qualifier, but fragment shader input lacks centroid qualifier"
        );
        assert_eq!(err.kind(), ErrorKind::InterfaceMismatch);
    }

    #[test]
    fn missing_main_names_stage() {
        assert_eq!(
            LinkError::MissingMain(Stage::Geometry).to_string(),
            "geometry shader lacks `main'"
        );
    }
}
