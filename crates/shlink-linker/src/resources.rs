//! Per-stage and program-wide resource limits.

use shlink_ir::Stage;

use crate::diagnostics::InfoLog;
use crate::error::LinkError;
use crate::options::LinkOptions;
use crate::program::StageResources;

/// Checks sampler, uniform component and uniform block usage.
///
/// Errors are logged; uniform component overruns are logged as warnings
/// instead when `skip_strict_max_uniform_limit_check` is set.
pub(crate) fn check_resources(
    log: &mut InfoLog,
    present: [bool; Stage::COUNT],
    resources: &[StageResources; Stage::COUNT],
    stage_block_index: &[Vec<Option<usize>>; Stage::COUNT],
    options: &LinkOptions,
) {
    let limits = &options.limits;
    let lenient = options.skip_strict_max_uniform_limit_check;

    for stage in Stage::ALL {
        let i = stage.index();
        if !present[i] {
            continue;
        }
        let res = &resources[i];

        if res.samplers > limits.max_texture_image_units[i] {
            log.error(LinkError::TooManySamplers(stage));
        }

        if res.uniform_components > limits.max_uniform_components[i] {
            if lenient {
                log.warning(LinkError::DefaultUniformComponentsOverLimit(stage));
            } else {
                log.error(LinkError::TooManyDefaultUniformComponents(stage));
            }
        }

        if res.combined_uniform_components > limits.max_combined_uniform_components[i] {
            if lenient {
                log.warning(LinkError::UniformComponentsOverLimit(stage));
            } else {
                log.error(LinkError::TooManyUniformComponents(stage));
            }
        }
    }

    let program_blocks = stage_block_index
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0);
    let mut per_stage = [0u32; Stage::COUNT];
    for (i, table) in stage_block_index.iter().enumerate() {
        per_stage[i] = table.iter().filter(|slot| slot.is_some()).count() as u32;
    }
    let total: u32 = per_stage.iter().sum();

    if total > limits.max_combined_uniform_blocks {
        log.error(LinkError::TooManyCombinedUniformBlocks {
            count: program_blocks,
            max: limits.max_combined_uniform_blocks,
        });
    }
    for stage in Stage::ALL {
        let count = per_stage[stage.index()];
        let max = limits.max_uniform_blocks[stage.index()];
        if count > max {
            log.error(LinkError::TooManyUniformBlocks { stage, count, max });
        }
    }
}
