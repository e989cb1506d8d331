//! The program link driver.

use std::collections::HashMap;

use shlink_ir::{Shader, Stage, VariableMode};
use shlink_opt::{OptLevel, PassManager, eliminate_dead_code};

use crate::cross_validate::cross_validate_globals;
use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};
use crate::functions::detect_recursion;
use crate::interface_blocks::validate_interstage_interface_blocks;
use crate::interstage::cross_validate_outputs_to_inputs;
use crate::intrastage::link_intrastage_shaders;
use crate::locations::{
    AttributeTarget, Bindings, assign_attribute_or_color_locations,
    demote_shader_inputs_and_outputs, frag_depth_layout, link_invalidate_variable_locations,
};
use crate::options::LinkOptions;
use crate::program::Program;
use crate::resources::check_resources;
use crate::stage_validate::{StageInfo, validate_stage};
use crate::transform_feedback::{TfbDecl, parse_tfeedback_decls, store_tfeedback_info};
use crate::uniform_blocks::interstage_cross_validate_uniform_blocks;
use crate::uniforms::{assign_uniform_locations, update_array_sizes};
use crate::varyings::{
    assign_varying_locations, check_against_input_limit, check_against_output_limit,
};

/// Order in which stages are merged and validated.
const LINK_ORDER: [Stage; Stage::COUNT] = [Stage::Vertex, Stage::Fragment, Stage::Geometry];

/// Links the shaders attached to `prog`.
///
/// All previous link outputs are discarded first. On return
/// `prog.link_status` is `true` iff no error was logged, and every
/// executable that was produced is stored compacted, even on failure.
pub fn link_program(prog: &mut Program, options: &LinkOptions) {
    prog.reset_link_outputs();
    log::debug!(
        "linking program with {} shader unit(s), {options}",
        prog.shaders.len()
    );

    let mut linker = Linker {
        options,
        log: InfoLog::new(),
        tfeedback: Vec::new(),
    };
    let _ = linker.link(prog);

    for shader in prog.linked.iter_mut().flatten() {
        shader.compact();
    }
    prog.info_log = linker.log;
    prog.link_status = !prog.info_log.has_errors();
    log::info!(
        "link {} ({} error(s), {} warning(s))",
        if prog.link_status { "succeeded" } else { "failed" },
        prog.info_log.error_count(),
        prog.info_log.warnings().count()
    );
}

/// Scratch state of one link.
struct Linker<'o> {
    options: &'o LinkOptions,
    log: InfoLog,
    tfeedback: Vec<TfbDecl>,
}

fn present_stages(linked: &[Option<Shader>; Stage::COUNT]) -> Vec<Stage> {
    Stage::ALL
        .into_iter()
        .filter(|s| linked[s.index()].is_some())
        .collect()
}

/// Mutable access to two different stages' executables.
fn stage_pair(
    linked: &mut [Option<Shader>; Stage::COUNT],
    producer: Stage,
    consumer: Stage,
) -> Option<(&mut Shader, &mut Shader)> {
    debug_assert!(producer.index() < consumer.index());
    let (head, tail) = linked.split_at_mut(consumer.index());
    Some((head[producer.index()].as_mut()?, tail[0].as_mut()?))
}

impl Linker<'_> {
    fn link(&mut self, prog: &mut Program) -> Result<(), Halt> {
        self.check_versions(prog)?;
        self.link_stages(prog)?;
        self.link_interfaces(prog)?;
        self.optimize(prog)?;
        self.assign_locations(prog)?;
        self.assign_uniforms(prog)?;
        self.check_required_stages(prog);
        Ok(())
    }

    /// Dialect and version agreement, and the geometry-needs-vertex rule.
    fn check_versions(&mut self, prog: &mut Program) -> Result<(), Halt> {
        let is_es = prog.shaders.first().is_some_and(|s| s.is_es);
        if prog.shaders.iter().any(|s| s.is_es != is_es) {
            return Err(self.log.error(LinkError::VersionMismatch));
        }
        let min = prog.shaders.iter().map(|s| s.version).min().unwrap_or(0);
        let max = prog.shaders.iter().map(|s| s.version).max().unwrap_or(0);
        if is_es && min != max {
            return Err(self.log.error(LinkError::VersionMismatch));
        }
        prog.version = max;
        prog.is_es = is_es;

        let has = |stage| prog.shaders.iter().any(|s| s.stage == stage);
        if has(Stage::Geometry) && !has(Stage::Vertex) {
            return Err(self.log.error(LinkError::GeometryWithoutVertex));
        }
        Ok(())
    }

    fn link_stages(&mut self, prog: &mut Program) -> Result<(), Halt> {
        for stage in LINK_ORDER {
            let units: Vec<&Shader> = prog
                .shaders
                .iter()
                .filter(|s| s.stage == stage)
                .map(|s| &**s)
                .collect();
            if units.is_empty() {
                continue;
            }

            let linked = link_intrastage_shaders(
                &mut self.log,
                stage,
                &units,
                prog.version,
                &self.options.limits,
            )?;
            match validate_stage(&mut self.log, &linked, prog.version, prog.is_es)? {
                StageInfo::Vertex(info) => {
                    prog.vertex = info;
                    prog.last_clip_distance_array_size = info.clip_distance_array_size;
                }
                StageInfo::Geometry(info) => {
                    prog.geometry = info;
                    prog.last_clip_distance_array_size = info.clip_distance_array_size;
                }
                StageInfo::Fragment => {}
            }
            prog.linked[stage.index()] = Some(linked);
        }
        Ok(())
    }

    /// Uniforms across all stages, then each stage against the next
    /// present one, then uniform blocks program-wide.
    fn link_interfaces(&mut self, prog: &mut Program) -> Result<(), Halt> {
        let executables: Vec<&Shader> = prog.linked.iter().flatten().collect();
        let resolutions = cross_validate_globals(&mut self.log, &executables, true)?;
        for shader in prog.linked.iter_mut().flatten() {
            resolutions.apply(shader);
        }

        let present = present_stages(&prog.linked);
        for pair in present.windows(2) {
            let (Some(producer), Some(consumer)) =
                (&prog.linked[pair[0].index()], &prog.linked[pair[1].index()])
            else {
                continue;
            };
            validate_interstage_interface_blocks(&mut self.log, producer, consumer)?;
            cross_validate_outputs_to_inputs(&mut self.log, producer, consumer)?;
        }

        let (blocks, stage_index) =
            interstage_cross_validate_uniform_blocks(&mut self.log, &prog.linked)?;
        prog.uniform_blocks = blocks;
        prog.uniform_block_stage_index = stage_index;
        Ok(())
    }

    fn optimize(&mut self, prog: &mut Program) -> Result<(), Halt> {
        let passes = PassManager::for_level(OptLevel::O2);
        for shader in prog.linked.iter_mut().flatten() {
            detect_recursion(&mut self.log, shader)?;
            while passes.run(shader) {}
        }
        Ok(())
    }

    /// Attributes, fragment outputs, then varyings from the last stage
    /// back to the first so outputs dead in a later stage are dropped
    /// before the earlier stage is allocated.
    fn assign_locations(&mut self, prog: &mut Program) -> Result<(), Halt> {
        let limits = &self.options.limits;
        for shader in prog.linked.iter_mut().flatten() {
            link_invalidate_variable_locations(shader);
        }

        if let Some(vs) = &mut prog.linked[Stage::Vertex.index()] {
            assign_attribute_or_color_locations(
                &mut self.log,
                vs,
                AttributeTarget::VertexInputs,
                limits.max_vertex_attribs,
                Bindings {
                    locations: &prog.attribute_bindings,
                    indices: &HashMap::new(),
                },
            )?;
        }
        if let Some(fs) = &mut prog.linked[Stage::Fragment.index()] {
            assign_attribute_or_color_locations(
                &mut self.log,
                fs,
                AttributeTarget::FragmentOutputs,
                limits.max_color_outputs(),
                Bindings {
                    locations: &prog.frag_data_bindings,
                    indices: &prog.frag_data_index_bindings,
                },
            )?;
        }

        let present = present_stages(&prog.linked);
        let (Some(&first), Some(&last)) = (present.first(), present.last()) else {
            return Ok(());
        };

        if !prog.transform_feedback.varyings.is_empty() {
            if first == Stage::Fragment {
                return Err(self.log.error(LinkError::FeedbackWithoutVertexStage));
            }
            self.tfeedback =
                parse_tfeedback_decls(&mut self.log, &prog.transform_feedback.varyings)?;
        }

        let max_slots = limits.max_varying_slots();
        if let Some(shader) = prog.linked[last.index()].as_mut() {
            if last != Stage::Fragment {
                if !self.tfeedback.is_empty() {
                    assign_varying_locations(
                        &mut self.log,
                        shader,
                        None,
                        &mut self.tfeedback,
                        max_slots,
                    )?;
                }
                demote_shader_inputs_and_outputs(shader, VariableMode::ShaderOut);
                eliminate_dead_code(shader);
            } else if first == Stage::Fragment {
                demote_shader_inputs_and_outputs(shader, VariableMode::ShaderIn);
                eliminate_dead_code(shader);
            }
        }

        for pair in present.windows(2).rev() {
            let (producer_stage, consumer_stage) = (pair[0], pair[1]);
            let Some((producer, consumer)) =
                stage_pair(&mut prog.linked, producer_stage, consumer_stage)
            else {
                continue;
            };
            log::debug!("assigning {producer_stage} -> {consumer_stage} varyings");

            let tfeedback: &mut [TfbDecl] = if consumer_stage == Stage::Fragment {
                self.tfeedback.as_mut_slice()
            } else {
                Default::default()
            };
            assign_varying_locations(
                &mut self.log,
                producer,
                Some(&mut *consumer),
                tfeedback,
                max_slots,
            )?;

            demote_shader_inputs_and_outputs(producer, VariableMode::ShaderOut);
            demote_shader_inputs_and_outputs(consumer, VariableMode::ShaderIn);
            eliminate_dead_code(producer);
            eliminate_dead_code(consumer);

            check_against_output_limit(&mut self.log, producer, limits)?;
            check_against_input_limit(&mut self.log, consumer, limits)?;
        }

        prog.captured_varyings = store_tfeedback_info(
            &mut self.log,
            &self.tfeedback,
            prog.transform_feedback.mode,
            limits,
        )?;
        Ok(())
    }

    fn assign_uniforms(&mut self, prog: &mut Program) -> Result<(), Halt> {
        update_array_sizes(&mut prog.linked);
        let (uniforms, resources) = assign_uniform_locations(&prog.linked);
        prog.uniforms = uniforms;
        prog.resources = resources;
        if let Some(fs) = &prog.linked[Stage::Fragment.index()] {
            prog.frag_depth_layout = frag_depth_layout(fs);
        }

        let present = Stage::ALL.map(|s| prog.linked[s.index()].is_some());
        check_resources(
            &mut self.log,
            present,
            &prog.resources,
            &prog.uniform_block_stage_index,
            self.options,
        );
        if self.log.has_errors() {
            return Err(Halt);
        }
        Ok(())
    }

    /// ES programs need both a vertex and a fragment stage.
    fn check_required_stages(&mut self, prog: &Program) {
        if !(self.options.api_es2 || prog.is_es) {
            return;
        }
        if prog.linked[Stage::Vertex.index()].is_none() {
            self.log.error(LinkError::MissingVertexShader);
        } else if prog.linked[Stage::Fragment.index()].is_none() {
            self.log.error(LinkError::MissingFragmentShader);
        }
    }
}
