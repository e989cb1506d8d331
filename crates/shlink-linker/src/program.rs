//! Program objects: link inputs and link results.

use std::collections::HashMap;
use std::sync::Arc;

use shlink_ir::{Constant, DepthLayout, PrimitiveType, Shader, Stage, Type, UniformBlock};

use crate::diagnostics::InfoLog;

/// How captured varyings are laid out in transform feedback buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TransformFeedbackMode {
    /// All varyings packed into buffer 0.
    #[default]
    Interleaved,
    /// One buffer per varying.
    Separate,
}

/// Varyings the application asked to capture.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformFeedbackRequest {
    /// `name` or `name[index]`.
    pub varyings: Vec<String>,
    pub mode: TransformFeedbackMode,
}

/// Capture layout of one transform feedback varying.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedVarying {
    /// The name as requested.
    pub name: String,
    pub buffer: u32,
    /// Offset within the buffer, in components.
    pub offset: u32,
    /// Varying slot of the captured value; `None` for built-ins.
    pub location: Option<u32>,
    pub components: u32,
    pub ty: Type,
}

/// One active uniform in the program's default or named blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformStorage {
    pub name: String,
    pub ty: Type,
    /// Base location; `None` for uniform block members.
    pub location: Option<u32>,
    /// 0 for non-arrays.
    pub array_elements: u32,
    /// First texture unit of a sampler uniform.
    pub sampler_unit: Option<u32>,
    /// Owning uniform block.
    pub block: Option<String>,
    pub initializer: Option<Constant>,
    /// Stages whose executable declares the uniform.
    pub stages: [bool; Stage::COUNT],
}

/// Uniform resource usage of one linked stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageResources {
    pub samplers: u32,
    /// Components in the default uniform block.
    pub uniform_components: u32,
    /// Default block plus the components of every referenced uniform block.
    pub combined_uniform_components: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VertexInfo {
    pub uses_clip_distance: bool,
    pub clip_distance_array_size: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeometryInfo {
    pub vertices_in: u32,
    pub input_type: Option<PrimitiveType>,
    pub output_type: Option<PrimitiveType>,
    pub vertices_out: Option<u32>,
    pub uses_clip_distance: bool,
    pub clip_distance_array_size: u32,
    pub uses_end_primitive: bool,
}

/// A shader program.
///
/// The application fills in the shaders and binding tables; every other
/// field is written by [`link_program`](crate::link_program).
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub shaders: Vec<Arc<Shader>>,
    pub attribute_bindings: HashMap<String, u32>,
    pub frag_data_bindings: HashMap<String, u32>,
    pub frag_data_index_bindings: HashMap<String, u32>,
    pub transform_feedback: TransformFeedbackRequest,

    pub link_status: bool,
    pub info_log: InfoLog,
    pub version: u32,
    pub is_es: bool,
    pub linked: [Option<Shader>; Stage::COUNT],
    /// Program-wide uniform blocks, in first-seen stage order.
    pub uniform_blocks: Vec<UniformBlock>,
    /// `uniform_block_stage_index[stage][program block]` is the block's
    /// index within that stage's executable.
    pub uniform_block_stage_index: [Vec<Option<usize>>; Stage::COUNT],
    pub uniforms: Vec<UniformStorage>,
    pub resources: [StageResources; Stage::COUNT],
    pub vertex: VertexInfo,
    pub geometry: GeometryInfo,
    /// Clip distance array size of the last stage before rasterization.
    pub last_clip_distance_array_size: u32,
    pub frag_depth_layout: DepthLayout,
    pub captured_varyings: Vec<CapturedVarying>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, shader: impl Into<Arc<Shader>>) {
        self.shaders.push(shader.into());
    }

    /// Builder form of [`Program::attach`].
    pub fn with_shader(mut self, shader: impl Into<Arc<Shader>>) -> Self {
        self.attach(shader);
        self
    }

    pub fn bind_attrib_location(&mut self, name: &str, location: u32) {
        self.attribute_bindings.insert(name.to_string(), location);
    }

    pub fn bind_frag_data_location(&mut self, name: &str, location: u32) {
        self.frag_data_bindings.insert(name.to_string(), location);
    }

    /// Binds a fragment output to a draw buffer and dual-source index.
    pub fn bind_frag_data_location_indexed(&mut self, name: &str, location: u32, index: u32) {
        self.bind_frag_data_location(name, location);
        self.frag_data_index_bindings.insert(name.to_string(), index);
    }

    pub fn set_transform_feedback_varyings<S: Into<String>>(
        &mut self,
        varyings: impl IntoIterator<Item = S>,
        mode: TransformFeedbackMode,
    ) {
        self.transform_feedback = TransformFeedbackRequest {
            varyings: varyings.into_iter().map(Into::into).collect(),
            mode,
        };
    }

    pub fn linked_shader(&self, stage: Stage) -> Option<&Shader> {
        self.linked[stage.index()].as_ref()
    }

    /// Looks up an entry of the uniform storage list.
    pub fn uniform(&self, name: &str) -> Option<&UniformStorage> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    /// Clears every link output.
    pub(crate) fn reset_link_outputs(&mut self) {
        self.link_status = false;
        self.info_log.clear();
        self.version = 0;
        self.is_es = false;
        self.linked = Default::default();
        self.uniform_blocks.clear();
        self.uniform_block_stage_index = Default::default();
        self.uniforms.clear();
        self.resources = Default::default();
        self.vertex = VertexInfo::default();
        self.geometry = GeometryInfo::default();
        self.last_clip_distance_array_size = 0;
        self.frag_depth_layout = DepthLayout::None;
        self.captured_varyings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_and_shaders() {
        let mut prog = Program::new().with_shader(Shader::new(Stage::Vertex, 130));
        prog.bind_attrib_location("position", 3);
        prog.bind_frag_data_location_indexed("color", 0, 1);
        assert_eq!(prog.shaders.len(), 1);
        assert_eq!(prog.attribute_bindings["position"], 3);
        assert_eq!(prog.frag_data_bindings["color"], 0);
        assert_eq!(prog.frag_data_index_bindings["color"], 1);
    }

    #[test]
    fn reset_clears_outputs() {
        let mut prog = Program::new();
        prog.link_status = true;
        prog.linked[0] = Some(Shader::new(Stage::Vertex, 130));
        prog.version = 150;
        prog.reset_link_outputs();
        assert!(!prog.link_status);
        assert!(prog.linked_shader(Stage::Vertex).is_none());
        assert_eq!(prog.version, 0);
    }
}
