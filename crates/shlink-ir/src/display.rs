//! Display implementations and text dump for debugging.

use std::fmt;

use crate::constant::{Constant, ConstantValue};
use crate::ir::{BinaryOp, Deref, Instruction, Rvalue, UnaryOp};
use crate::shader::Shader;
use crate::types::{ArraySize, SamplerDim, ScalarKind, Type, VectorSize};
use crate::variable::{Variable, VariableMode};

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
        })
    }
}

impl fmt::Display for VectorSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u32)
    }
}

fn vector_prefix(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Bool => "b",
        ScalarKind::Int => "i",
        ScalarKind::Uint => "u",
        ScalarKind::Float => "",
    }
}

fn sampler_suffix(dim: SamplerDim) -> &'static str {
    match dim {
        SamplerDim::D1 => "1D",
        SamplerDim::D2 => "2D",
        SamplerDim::D3 => "3D",
        SamplerDim::Cube => "Cube",
        SamplerDim::Rect => "2DRect",
        SamplerDim::Buffer => "Buffer",
        SamplerDim::D1Array => "1DArray",
        SamplerDim::D2Array => "2DArray",
        SamplerDim::CubeArray => "CubeArray",
        SamplerDim::D2Multisample => "2DMS",
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Vector { size, kind } => write!(f, "{}vec{size}", vector_prefix(*kind)),
            Self::Matrix { columns, rows } if columns == rows => write!(f, "mat{columns}"),
            Self::Matrix { columns, rows } => write!(f, "mat{columns}x{rows}"),
            Self::Sampler { dim, kind, shadow } => {
                let prefix = match kind {
                    ScalarKind::Int => "i",
                    ScalarKind::Uint => "u",
                    _ => "",
                };
                let shadow = if *shadow { "Shadow" } else { "" };
                write!(f, "{prefix}sampler{}{shadow}", sampler_suffix(*dim))
            }
            Self::AtomicUint => f.write_str("atomic_uint"),
            Self::Array { base, size } => match size {
                ArraySize::Constant(n) => write!(f, "{base}[{n}]"),
                ArraySize::Unsized => write!(f, "{base}[]"),
            },
            Self::Struct { name, .. } | Self::Interface { name, .. } => f.write_str(name),
        }
    }
}

impl fmt::Display for VariableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Uniform => "uniform",
            Self::ShaderIn => "in",
            Self::ShaderOut => "out",
            Self::FunctionIn => "param_in",
            Self::FunctionOut => "param_out",
            Self::FunctionInout => "param_inout",
            Self::ConstIn => "const_in",
            Self::SystemValue => "system_value",
            Self::Temporary => "temporary",
        })
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Negate => "neg",
            Self::LogicalNot => "!",
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
            Self::Rsq => "rsq",
            Self::Floor => "floor",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::Dot => "dot",
        })
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }
        write!(f, "(constant {} (", self.ty)?;
        match &self.value {
            ConstantValue::Bool(v) => list(f, v)?,
            ConstantValue::Int(v) => list(f, v)?,
            ConstantValue::Uint(v) => list(f, v)?,
            ConstantValue::Float(v) => list(f, v)?,
            ConstantValue::Composite(v) => list(f, v)?,
        }
        f.write_str("))")
    }
}

fn var_name(shader: &Shader, deref: &Deref) -> String {
    let h = deref.variable_referenced();
    match shader.variables.try_get(h) {
        Some(var) => var.name.clone(),
        None => format!("<invalid {h:?}>"),
    }
}

fn format_deref(shader: &Shader, deref: &Deref) -> String {
    match deref {
        Deref::Variable(_) => format!("(var_ref {})", var_name(shader, deref)),
        Deref::Array { array, index, .. } => format!(
            "(array_ref {} {})",
            format_deref(shader, array),
            format_rvalue(shader, index)
        ),
        Deref::Record { record, field, .. } => {
            format!("(record_ref {} {field})", format_deref(shader, record))
        }
    }
}

fn format_rvalue(shader: &Shader, rvalue: &Rvalue) -> String {
    match rvalue {
        Rvalue::Constant(c) => c.to_string(),
        Rvalue::Deref(d) => format_deref(shader, d),
        Rvalue::Unary { op, operand, ty } => {
            format!("(expression {ty} {op} {})", format_rvalue(shader, operand))
        }
        Rvalue::Binary {
            op,
            left,
            right,
            ty,
        } => format!(
            "(expression {ty} {op} {} {})",
            format_rvalue(shader, left),
            format_rvalue(shader, right)
        ),
        Rvalue::Swizzle {
            value, components, ..
        } => {
            let letters: String = components
                .iter()
                .map(|&c| ['x', 'y', 'z', 'w'].get(c as usize).copied().unwrap_or('?'))
                .collect();
            format!("(swiz {letters} {})", format_rvalue(shader, value))
        }
        Rvalue::Compose { ty, components } => {
            let parts: Vec<_> = components.iter().map(|c| format_rvalue(shader, c)).collect();
            format!("(compose {ty} {})", parts.join(" "))
        }
        Rvalue::Texture {
            sampler,
            coordinate,
            ty,
        } => format!(
            "(tex {ty} {} {})",
            format_deref(shader, sampler),
            format_rvalue(shader, coordinate)
        ),
    }
}

fn format_declaration(var: &Variable) -> String {
    let mut quals = vec![var.mode.to_string()];
    if var.invariant {
        quals.push("invariant".into());
    }
    if var.centroid {
        quals.push("centroid".into());
    }
    if let Some(loc) = var.location {
        quals.push(format!("location={loc}"));
    }
    let init = match &var.constant_initializer {
        Some(c) => format!(" = {c}"),
        None => String::new(),
    };
    format!("(declare ({}) {} {}{init})", quals.join(" "), var.ty, var.name)
}

fn dump_block(out: &mut String, shader: &Shader, block: &[Instruction], depth: usize) {
    let pad = "  ".repeat(depth);
    for inst in block {
        match inst {
            Instruction::Declare(h) => match shader.variables.try_get(*h) {
                Some(var) => out.push_str(&format!("{pad}{}\n", format_declaration(var))),
                None => out.push_str(&format!("{pad}(declare <invalid {h:?}>)\n")),
            },
            Instruction::Function(h) => {
                let Some(function) = shader.functions.try_get(*h) else {
                    out.push_str(&format!("{pad}(function <invalid {h:?}>)\n"));
                    continue;
                };
                out.push_str(&format!("{pad}(function {}\n", function.name));
                for sig in &function.signatures {
                    let params: Vec<_> = sig
                        .parameters
                        .iter()
                        .filter_map(|&p| shader.variables.try_get(p))
                        .map(format_declaration)
                        .collect();
                    let state = if sig.is_defined { "" } else { " prototype" };
                    out.push_str(&format!(
                        "{pad}  (signature {}{state} (parameters {})\n",
                        sig.return_type,
                        params.join(" ")
                    ));
                    dump_block(out, shader, &sig.body, depth + 2);
                    out.push_str(&format!("{pad}  )\n"));
                }
                out.push_str(&format!("{pad})\n"));
            }
            Instruction::Assign {
                lhs,
                rhs,
                condition,
            } => {
                let cond = match condition {
                    Some(c) => format!(" {}", format_rvalue(shader, c)),
                    None => String::new(),
                };
                out.push_str(&format!(
                    "{pad}(assign{cond} {} {})\n",
                    format_deref(shader, lhs),
                    format_rvalue(shader, rhs)
                ));
            }
            Instruction::Call {
                callee,
                arguments,
                result,
            } => {
                let name = shader
                    .functions
                    .try_get(callee.function)
                    .map_or("<invalid>", |f| f.name.as_str());
                let args: Vec<_> = arguments.iter().map(|a| format_rvalue(shader, a)).collect();
                let ret = match result {
                    Some(r) => format!("{} ", format_deref(shader, r)),
                    None => String::new(),
                };
                out.push_str(&format!("{pad}(call {name} {ret}({}))\n", args.join(" ")));
            }
            Instruction::If {
                condition,
                accept,
                reject,
            } => {
                out.push_str(&format!("{pad}(if {}\n", format_rvalue(shader, condition)));
                dump_block(out, shader, accept, depth + 1);
                if !reject.is_empty() {
                    out.push_str(&format!("{pad} else\n"));
                    dump_block(out, shader, reject, depth + 1);
                }
                out.push_str(&format!("{pad})\n"));
            }
            Instruction::Loop { body } => {
                out.push_str(&format!("{pad}(loop\n"));
                dump_block(out, shader, body, depth + 1);
                out.push_str(&format!("{pad})\n"));
            }
            Instruction::Break => out.push_str(&format!("{pad}(break)\n")),
            Instruction::Continue => out.push_str(&format!("{pad}(continue)\n")),
            Instruction::Return(None) => out.push_str(&format!("{pad}(return)\n")),
            Instruction::Return(Some(v)) => {
                out.push_str(&format!("{pad}(return {})\n", format_rvalue(shader, v)));
            }
            Instruction::Discard => out.push_str(&format!("{pad}(discard)\n")),
            Instruction::EmitVertex => out.push_str(&format!("{pad}(emit-vertex)\n")),
            Instruction::EndPrimitive => out.push_str(&format!("{pad}(end-primitive)\n")),
        }
    }
}

/// Dumps a shader as an indented s-expression listing.
pub fn dump_shader(shader: &Shader) -> String {
    let es = if shader.is_es { " es" } else { "" };
    let mut out = format!("; {} shader, version {}{es}\n", shader.stage, shader.version);
    if let Some(input) = shader.geometry.input {
        out.push_str(&format!("; layout(in = {input:?})\n"));
    }
    if let Some(output) = shader.geometry.output {
        let max = shader.geometry.vertices_out.unwrap_or(0);
        out.push_str(&format!("; layout(out = {output:?}, max_vertices = {max})\n"));
    }
    for block in &shader.uniform_blocks {
        out.push_str(&format!("; uniform block {} ({} bytes)\n", block.name, block.data_size));
        for m in &block.members {
            out.push_str(&format!(";   {} {} @ {}\n", m.ty, m.name, m.offset));
        }
    }
    dump_block(&mut out, shader, &shader.ir, 0);
    out
}
