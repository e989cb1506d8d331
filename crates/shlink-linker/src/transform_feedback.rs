//! Transform feedback requests: parsing, matching and buffer layout.

use shlink_ir::{Shader, Type, VariableMode};

use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};
use crate::options::Limits;
use crate::program::{CapturedVarying, TransformFeedbackMode};

/// Splits a resource name of the form `base[index]`.
///
/// Returns the base name and the index, or the whole name and `None` when
/// the name does not end in a bracketed decimal index. An empty subscript
/// (`a[]`) is not an index.
pub fn parse_program_resource_name(name: &str) -> (&str, Option<u32>) {
    let Some(inner) = name.strip_suffix(']') else {
        return (name, None);
    };
    let digits_start = inner
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    let digits = &inner[digits_start..];
    if digits.is_empty() {
        return (name, None);
    }
    let Some(base) = inner[..digits_start].strip_suffix('[') else {
        return (name, None);
    };
    match digits.parse() {
        Ok(index) => (base, Some(index)),
        Err(_) => (name, None),
    }
}

/// One requested capture, resolved against the producing stage once
/// varying locations are known.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TfbDecl {
    /// The name as the application spelled it.
    pub(crate) orig_name: String,
    pub(crate) var_name: String,
    pub(crate) index: Option<u32>,
    pub(crate) matched: bool,
    pub(crate) location: Option<u32>,
    pub(crate) components: u32,
    pub(crate) ty: Type,
}

impl TfbDecl {
    fn new(orig_name: &str) -> Self {
        let (var_name, index) = parse_program_resource_name(orig_name);
        Self {
            orig_name: orig_name.to_string(),
            var_name: var_name.to_string(),
            index,
            matched: false,
            location: None,
            components: 0,
            ty: Type::Void,
        }
    }

    fn is_same(&self, other: &TfbDecl) -> bool {
        self.var_name == other.var_name && self.index == other.index
    }

    /// Resolves the capture against the outputs of `producer`.
    ///
    /// Generic outputs must already have their varying location.
    pub(crate) fn assign_location(
        &mut self,
        log: &mut InfoLog,
        producer: &Shader,
    ) -> Result<(), Halt> {
        let Some(var) = producer
            .global_variables()
            .map(|h| &producer.variables[h])
            .find(|v| v.mode == VariableMode::ShaderOut && v.name == self.var_name)
        else {
            return Err(log.error(LinkError::FeedbackUndefined(self.orig_name.clone())));
        };

        let (ty, element_offset) = match (self.index, var.ty.element_type()) {
            (None, _) => (var.ty.clone(), 0),
            (Some(_), None) => {
                return Err(log.error(LinkError::FeedbackIndexOnNonArray(
                    self.orig_name.clone(),
                )));
            }
            (Some(index), Some(elem)) => {
                let size = var.ty.array_length().unwrap_or(0);
                if index >= size {
                    return Err(log.error(LinkError::FeedbackIndexOutOfRange {
                        name: self.orig_name.clone(),
                        index,
                        size,
                    }));
                }
                (elem.clone(), index * elem.count_attribute_slots())
            }
        };

        self.location = if var.is_builtin() {
            None
        } else {
            var.location.map(|l| l + element_offset)
        };
        self.components = ty.component_slots();
        self.ty = ty;
        self.matched = true;
        Ok(())
    }
}

/// Parses the requested varying names, rejecting duplicates.
pub(crate) fn parse_tfeedback_decls(
    log: &mut InfoLog,
    names: &[String],
) -> Result<Vec<TfbDecl>, Halt> {
    let mut decls: Vec<TfbDecl> = Vec::with_capacity(names.len());
    for name in names {
        let decl = TfbDecl::new(name);
        if decls.iter().any(|d| d.is_same(&decl)) {
            return Err(log.error(LinkError::FeedbackDuplicate(name.clone())));
        }
        decls.push(decl);
    }
    Ok(decls)
}

/// Lays the resolved captures out in feedback buffers.
pub(crate) fn store_tfeedback_info(
    log: &mut InfoLog,
    decls: &[TfbDecl],
    mode: TransformFeedbackMode,
    limits: &Limits,
) -> Result<Vec<CapturedVarying>, Halt> {
    if mode == TransformFeedbackMode::Separate
        && decls.len() > limits.max_transform_feedback_buffers as usize
    {
        return Err(log.error(LinkError::TooManyFeedbackBuffers {
            used: decls.len(),
            max: limits.max_transform_feedback_buffers,
        }));
    }

    let mut captured = Vec::with_capacity(decls.len());
    let mut offset = 0;
    for (i, decl) in decls.iter().enumerate() {
        if !decl.matched {
            return Err(log.error(LinkError::FeedbackUndefined(decl.orig_name.clone())));
        }
        let (buffer, this_offset) = match mode {
            TransformFeedbackMode::Interleaved => {
                let at = offset;
                offset += decl.components;
                if offset > limits.max_transform_feedback_interleaved_components {
                    return Err(log.error(LinkError::TooManyInterleavedComponents {
                        used: offset,
                        max: limits.max_transform_feedback_interleaved_components,
                    }));
                }
                (0, at)
            }
            TransformFeedbackMode::Separate => {
                let max = limits.max_transform_feedback_separate_components;
                if decl.components > max {
                    return Err(log.error(LinkError::TooManySeparateComponents {
                        name: decl.orig_name.clone(),
                        used: decl.components,
                        max,
                    }));
                }
                (i as u32, 0)
            }
        };
        captured.push(CapturedVarying {
            name: decl.orig_name.clone(),
            buffer,
            offset: this_offset,
            location: decl.location,
            components: decl.components,
            ty: decl.ty.clone(),
        });
    }
    Ok(captured)
}
