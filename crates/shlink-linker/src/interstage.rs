//! Matching one stage's outputs against the next stage's inputs.

use std::collections::HashMap;

use shlink_ir::{Interpolation, Shader, Stage, Variable, VariableMode};

use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};

fn interpolation_string(interpolation: Option<Interpolation>) -> &'static str {
    match interpolation {
        None => "no",
        Some(Interpolation::Smooth) => "smooth",
        Some(Interpolation::Flat) => "flat",
        Some(Interpolation::NoPerspective) => "noperspective",
    }
}

fn validate_pair(
    log: &mut InfoLog,
    producer: Stage,
    consumer: Stage,
    output: &Variable,
    input: &Variable,
) {
    // Geometry inputs are per-vertex arrays of the producer's output type.
    let input_ty = if consumer == Stage::Geometry {
        input.ty.element_type().unwrap_or(&input.ty)
    } else {
        &input.ty
    };

    // Built-in arrays such as gl_ClipDistance may be sized differently on
    // each side.
    let builtin_array = output.is_builtin() && output.ty.is_array() && input_ty.is_array();
    if *input_ty != output.ty && !builtin_array {
        log.error(LinkError::InterfaceTypeMismatch {
            producer,
            consumer,
            name: output.name.clone(),
            output: output.ty.clone(),
            input: input.ty.clone(),
        });
        return;
    }

    if input.centroid != output.centroid {
        log.error(LinkError::InterfaceCentroidMismatch {
            producer,
            consumer,
            name: output.name.clone(),
            output: output.centroid,
            input: input.centroid,
        });
        return;
    }

    if input.invariant != output.invariant {
        log.error(LinkError::InterfaceInvariantMismatch {
            producer,
            consumer,
            name: output.name.clone(),
            output: output.invariant,
            input: input.invariant,
        });
        return;
    }

    if input.interpolation != output.interpolation {
        log.error(LinkError::InterpolationMismatch {
            producer,
            consumer,
            name: output.name.clone(),
            output: interpolation_string(output.interpolation),
            input: interpolation_string(input.interpolation),
        });
    }
}

/// Checks every input of `consumer` that has a same-named output in
/// `producer`. All mismatches are logged before failing.
pub(crate) fn cross_validate_outputs_to_inputs(
    log: &mut InfoLog,
    producer: &Shader,
    consumer: &Shader,
) -> Result<(), Halt> {
    let outputs: HashMap<&str, &Variable> = producer
        .global_variables()
        .map(|h| &producer.variables[h])
        .filter(|v| v.mode == VariableMode::ShaderOut)
        .map(|v| (v.name.as_str(), v))
        .collect();

    let mark = log.error_count();
    for h in consumer.global_variables() {
        let input = &consumer.variables[h];
        if input.mode != VariableMode::ShaderIn {
            continue;
        }
        if let Some(output) = outputs.get(input.name.as_str()) {
            validate_pair(log, producer.stage, consumer.stage, output, input);
        }
    }
    log.halt_if_errors_since(mark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shlink_ir::Type;

    fn pair(out: Variable, input: Variable, consumer: Stage) -> (Shader, Shader) {
        let mut vs = Shader::new(Stage::Vertex, 150);
        vs.declare(out);
        let mut next = Shader::new(consumer, 150);
        next.declare(input);
        (vs, next)
    }

    #[test]
    fn type_mismatch_is_reported() {
        let (vs, fs) = pair(
            Variable::new("uv", Type::VEC2, VariableMode::ShaderOut),
            Variable::new("uv", Type::VEC3, VariableMode::ShaderIn),
            Stage::Fragment,
        );
        let mut log = InfoLog::new();
        assert!(cross_validate_outputs_to_inputs(&mut log, &vs, &fs).is_err());
        assert!(log.contains(
            "vertex shader output `uv' declared as type `vec2', but fragment shader input declared as type `vec3'"
        ));
    }

    #[test]
    fn geometry_inputs_are_arrays_of_outputs() {
        let (vs, gs) = pair(
            Variable::new("color", Type::VEC4, VariableMode::ShaderOut),
            Variable::new("color", Type::array(Type::VEC4, 3), VariableMode::ShaderIn),
            Stage::Geometry,
        );
        let mut log = InfoLog::new();
        assert!(cross_validate_outputs_to_inputs(&mut log, &vs, &gs).is_ok());
    }

    #[test]
    fn qualifier_mismatches() {
        let mut out = Variable::new("n", Type::VEC3, VariableMode::ShaderOut);
        out.interpolation = Some(Interpolation::Flat);
        let input = Variable::new("n", Type::VEC3, VariableMode::ShaderIn);
        let (vs, fs) = pair(out, input, Stage::Fragment);
        let mut log = InfoLog::new();
        assert!(cross_validate_outputs_to_inputs(&mut log, &vs, &fs).is_err());
        assert!(log.contains(
            "specifies flat interpolation qualifier, but fragment shader input specifies no interpolation qualifier"
        ));

        let mut out = Variable::new("p", Type::VEC4, VariableMode::ShaderOut);
        out.invariant = true;
        let (vs, fs) = pair(
            out,
            Variable::new("p", Type::VEC4, VariableMode::ShaderIn),
            Stage::Fragment,
        );
        let mut log = InfoLog::new();
        assert!(cross_validate_outputs_to_inputs(&mut log, &vs, &fs).is_err());
        assert!(log.contains("has invariant qualifier, but fragment shader input lacks invariant"));
    }

    #[test]
    fn unmatched_inputs_are_ignored() {
        let (vs, fs) = pair(
            Variable::new("a", Type::VEC2, VariableMode::ShaderOut),
            Variable::new("b", Type::VEC3, VariableMode::ShaderIn),
            Stage::Fragment,
        );
        let mut log = InfoLog::new();
        assert!(cross_validate_outputs_to_inputs(&mut log, &vs, &fs).is_ok());
        assert!(log.is_empty());
    }
}
