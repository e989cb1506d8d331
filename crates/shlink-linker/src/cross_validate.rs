//! Cross-validation of same-named globals declared by several shaders.
//!
//! Translation units are shared and never modified. Validation resolves
//! each global into a scratch declaration (adopted array sizes, explicit
//! locations and bindings, initializers) which is then copied onto the
//! linked executables with [`Resolutions::apply`].

use std::collections::HashMap;

use shlink_ir::{Shader, Variable, VariableMode};

use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};

/// Resolved declarations of the globals seen during cross-validation.
#[derive(Debug, Default)]
pub(crate) struct Resolutions {
    globals: HashMap<String, Variable>,
}

impl Resolutions {
    pub(crate) fn get(&self, name: &str) -> Option<&Variable> {
        self.globals.get(name)
    }

    /// Copies the resolved properties onto the matching globals of `shader`.
    pub(crate) fn apply(&self, shader: &mut Shader) {
        let globals: Vec<_> = shader.global_variables().collect();
        for h in globals {
            let var = &mut shader.variables[h];
            let Some(resolved) = self.globals.get(&var.name) else {
                continue;
            };
            if resolved.mode != var.mode {
                continue;
            }
            if var.ty.is_unsized_array() && !resolved.ty.is_unsized_array() {
                var.ty = resolved.ty.clone();
            }
            if resolved.explicit_location {
                var.explicit_location = true;
                var.location = resolved.location;
            }
            if resolved.explicit_binding {
                var.explicit_binding = true;
                var.binding = resolved.binding;
            }
            if var.constant_initializer.is_none() {
                var.constant_initializer = resolved.constant_initializer.clone();
            }
            var.has_initializer |= resolved.has_initializer;
        }
    }
}

/// Validates that globals declared by more than one shader agree.
///
/// With `uniforms_only` set, only uniforms are considered; this is the
/// interstage check over linked executables.
pub(crate) fn cross_validate_globals(
    log: &mut InfoLog,
    shaders: &[&Shader],
    uniforms_only: bool,
) -> Result<Resolutions, Halt> {
    let mark = log.error_count();
    let mut resolutions = Resolutions::default();

    for shader in shaders {
        for h in shader.global_variables() {
            let var = &shader.variables[h];
            if uniforms_only && var.mode != VariableMode::Uniform {
                continue;
            }
            if var.mode == VariableMode::Temporary {
                continue;
            }
            match resolutions.globals.get_mut(&var.name) {
                Some(existing) => merge_declaration(log, existing, var)?,
                None => {
                    resolutions.globals.insert(var.name.clone(), var.clone());
                }
            }
        }
    }

    log.halt_if_errors_since(mark)?;
    Ok(resolutions)
}

/// Checks `var` against the first-seen declaration `existing`, folding
/// compatible differences into `existing`.
///
/// A conflict that makes the two declarations irreconcilable halts the
/// whole validation.
fn merge_declaration(
    log: &mut InfoLog,
    existing: &mut Variable,
    var: &Variable,
) -> Result<(), Halt> {
    let mode = var.mode_string();
    let name = || var.name.clone();

    if var.ty != existing.ty {
        let unifiable = var.ty.is_array()
            && existing.ty.is_array()
            && var.ty.element_type() == existing.ty.element_type()
            && (var.ty.is_unsized_array() || existing.ty.is_unsized_array());
        if !unifiable {
            return Err(log.error(LinkError::TypeMismatch {
                mode,
                name: name(),
                new: var.ty.clone(),
                existing: existing.ty.clone(),
            }));
        }
        if !var.ty.is_unsized_array() {
            existing.ty = var.ty.clone();
        }
    }

    if var.explicit_location {
        if existing.explicit_location && var.location != existing.location {
            return Err(log.error(LinkError::LocationMismatch { mode, name: name() }));
        }
        existing.location = var.location;
        existing.explicit_location = true;
    }

    if var.explicit_binding {
        if existing.explicit_binding && var.binding != existing.binding {
            return Err(log.error(LinkError::BindingMismatch { mode, name: name() }));
        }
        existing.binding = var.binding;
        existing.explicit_binding = true;
    }

    if var.ty.contains_atomic() && var.atomic_offset != existing.atomic_offset {
        return Err(log.error(LinkError::AtomicOffsetMismatch { mode, name: name() }));
    }

    if var.name == "gl_FragDepth" {
        let layout_declared = var.depth_layout != shlink_ir::DepthLayout::None;
        let layout_differs = var.depth_layout != existing.depth_layout;
        if layout_declared && layout_differs {
            log.error(LinkError::FragDepthRedeclared);
        }
        if var.used && layout_differs {
            log.error(LinkError::FragDepthLayoutDiffers);
        }
    }

    if let Some(value) = &var.constant_initializer {
        match &existing.constant_initializer {
            Some(first) if !first.has_value(value) => {
                return Err(log.error(LinkError::InitializerMismatch { mode, name: name() }));
            }
            Some(_) => {}
            None => existing.constant_initializer = Some(value.clone()),
        }
    }

    if var.has_initializer {
        if existing.has_initializer
            && (var.constant_initializer.is_none() || existing.constant_initializer.is_none())
        {
            return Err(log.error(LinkError::MultipleNonConstantInitializers(name())));
        }
        existing.has_initializer = true;
    }

    if existing.invariant != var.invariant {
        return Err(log.error(LinkError::InvariantMismatch { mode, name: name() }));
    }
    if existing.centroid != var.centroid {
        return Err(log.error(LinkError::CentroidMismatch { mode, name: name() }));
    }
    Ok(())
}
