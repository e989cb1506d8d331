//! Implementation limits and link options.

use std::fmt;

use shlink_ir::Stage;

/// Implementation limits checked while linking.
///
/// Per-stage arrays are indexed by [`Stage::index`]. The defaults are the
/// GL 3.x minimums.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Limits {
    pub max_vertex_attribs: u32,
    pub max_draw_buffers: u32,
    pub max_dual_source_draw_buffers: u32,
    /// Components available for generic varyings at each stage boundary.
    pub max_varying_components: u32,
    pub max_output_components: [u32; Stage::COUNT],
    pub max_input_components: [u32; Stage::COUNT],
    pub max_texture_image_units: [u32; Stage::COUNT],
    pub max_uniform_components: [u32; Stage::COUNT],
    pub max_combined_uniform_components: [u32; Stage::COUNT],
    pub max_uniform_blocks: [u32; Stage::COUNT],
    pub max_combined_uniform_blocks: u32,
    /// Bytes.
    pub max_uniform_block_size: u32,
    pub max_transform_feedback_interleaved_components: u32,
    pub max_transform_feedback_separate_components: u32,
    pub max_transform_feedback_buffers: u32,
}

impl Default for Limits {
    fn default() -> Self {
        let block_components = 12 * 16384 / 4;
        Self {
            max_vertex_attribs: 16,
            max_draw_buffers: 8,
            max_dual_source_draw_buffers: 1,
            max_varying_components: 64,
            max_output_components: [64, 128, 0],
            max_input_components: [0, 64, 128],
            max_texture_image_units: [16; Stage::COUNT],
            max_uniform_components: [1024; Stage::COUNT],
            max_combined_uniform_components: [1024 + block_components; Stage::COUNT],
            max_uniform_blocks: [12; Stage::COUNT],
            max_combined_uniform_blocks: 36,
            max_uniform_block_size: 16384,
            max_transform_feedback_interleaved_components: 64,
            max_transform_feedback_separate_components: 4,
            max_transform_feedback_buffers: 4,
        }
    }
}

impl Limits {
    /// Generic vec4 varying slots at a stage boundary, at most 32.
    pub fn max_varying_slots(&self) -> u32 {
        (self.max_varying_components / 4).min(u32::BITS)
    }

    /// Fragment output slots: whichever of the draw buffer limits is larger.
    pub fn max_color_outputs(&self) -> u32 {
        self.max_draw_buffers.max(self.max_dual_source_draw_buffers)
    }
}

/// Options for [`link_program`](crate::link_program).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkOptions {
    pub limits: Limits,
    /// Report uniform component overruns as warnings instead of errors.
    pub skip_strict_max_uniform_limit_check: bool,
    /// The API itself is ES 2: vertex and fragment stages are both required.
    pub api_es2: bool,
}

impl fmt::Display for LinkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LinkOptions {{ vertex_attribs: {}, draw_buffers: {}, varying_components: {}, strict_uniform_limits: {}, api_es2: {} }}",
            self.limits.max_vertex_attribs,
            self.limits.max_draw_buffers,
            self.limits.max_varying_components,
            !self.skip_strict_max_uniform_limit_check,
            self.api_es2
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_vertex_attribs, 16);
        assert_eq!(limits.max_varying_slots(), 16);
        assert_eq!(limits.max_color_outputs(), 8);
        assert_eq!(limits.max_uniform_blocks[Stage::Fragment.index()], 12);
    }

    #[test]
    fn varying_slots_are_capped() {
        let limits = Limits {
            max_varying_components: 4096,
            ..Limits::default()
        };
        assert_eq!(limits.max_varying_slots(), 32);
    }

    #[test]
    fn display_options() {
        let opts = LinkOptions::default();
        assert_eq!(
            opts.to_string(),
            "LinkOptions { vertex_attribs: 16, draw_buffers: 8, varying_components: 64, strict_uniform_limits: true, api_es2: false }"
        );
    }
}
