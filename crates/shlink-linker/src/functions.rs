//! Function-level linking: duplicate definitions, call resolution and
//! static recursion.

use std::collections::HashSet;

use shlink_ir::visit::{self, Node, Visit};
use shlink_ir::{Callee, Instruction, Shader};

use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};
use crate::remap::IrCloner;

/// Rejects a signature defined (non-built-in) by more than one unit.
pub(crate) fn check_multiply_defined(log: &mut InfoLog, units: &[&Shader]) -> Result<(), Halt> {
    let mark = log.error_count();
    for (i, first) in units.iter().enumerate() {
        for other in &units[i + 1..] {
            for f in first.declared_functions() {
                let function = &first.functions[f];
                let Some(other_f) = other.symbols.get_function(&function.name) else {
                    continue;
                };
                for (s, sig) in function.signatures.iter().enumerate() {
                    if !sig.is_defined || sig.is_builtin {
                        continue;
                    }
                    let types = first.parameter_types(Callee {
                        function: f,
                        signature: s,
                    });
                    let Some(other_s) = other.find_signature(other_f, &types) else {
                        continue;
                    };
                    let other_sig = &other.functions[other_f].signatures[other_s];
                    if other_sig.is_defined && !other_sig.is_builtin {
                        log.error(LinkError::MultiplyDefined(function.name.clone()));
                    }
                }
            }
        }
    }
    log.halt_if_errors_since(mark)
}

/// First call in `shader` whose target has no body.
fn find_undefined_call(shader: &Shader) -> Option<Callee> {
    let mut found = None;
    let _ = visit::walk_shader(shader, &mut |node| {
        if let Node::Instruction(Instruction::Call { callee, .. }) = node {
            if !shader.signature(*callee).is_defined {
                found = Some(*callee);
                return Visit::Stop;
            }
        }
        Visit::Continue
    });
    found
}

/// Resolves every call to an undefined signature by cloning a definition
/// from `libraries`, searched in order.
///
/// Cloned bodies may call further functions; those are resolved in turn
/// until no undefined call remains.
pub(crate) fn link_function_calls(
    log: &mut InfoLog,
    linked: &mut Shader,
    libraries: &[&Shader],
) -> Result<(), Halt> {
    while let Some(target) = find_undefined_call(linked) {
        let name = linked.functions[target.function].name.clone();
        let types = linked.parameter_types(target);

        let definition = libraries.iter().find_map(|lib| {
            let f = lib.symbols.get_function(&name)?;
            let s = lib.find_signature(f, &types)?;
            lib.functions[f].signatures[s].is_defined.then_some((
                *lib,
                Callee {
                    function: f,
                    signature: s,
                },
            ))
        });
        let Some((lib, source)) = definition else {
            return Err(log.error(LinkError::UnresolvedFunction(name)));
        };

        log::debug!("linking definition of `{name}' into {} shader", linked.stage);
        let src_sig = lib.signature(source);
        let mut cloner = IrCloner::new(lib);
        let params = linked.signature(target).parameters.clone();
        for (&from, &to) in src_sig.parameters.iter().zip(&params) {
            cloner.map_local(from, to);
        }
        let body = cloner.block(linked, &src_sig.body);
        let sig = linked.signature_mut(target);
        sig.body = body;
        sig.is_defined = true;
        sig.is_builtin = src_sig.is_builtin;
    }
    Ok(())
}

/// Reports every defined signature that can reach itself through calls.
pub(crate) fn detect_recursion(log: &mut InfoLog, shader: &Shader) -> Result<(), Halt> {
    let mut nodes: Vec<Callee> = Vec::new();
    for f in shader.declared_functions() {
        for (s, sig) in shader.functions[f].signatures.iter().enumerate() {
            if sig.is_defined {
                nodes.push(Callee {
                    function: f,
                    signature: s,
                });
            }
        }
    }

    let mut edges: Vec<(Callee, Callee)> = Vec::new();
    for &caller in &nodes {
        let _ = visit::walk_block(&shader.signature(caller).body, &mut |node| {
            if let Node::Instruction(Instruction::Call { callee, .. }) = node {
                edges.push((caller, *callee));
            }
            Visit::Continue
        });
    }

    // Repeatedly drop signatures that call nothing left or are called by
    // nothing left. What survives is on, or between, cycles.
    let mut live: HashSet<Callee> = nodes.iter().copied().collect();
    loop {
        let removable: Vec<Callee> = live
            .iter()
            .copied()
            .filter(|n| {
                let calls_live = edges.iter().any(|(a, b)| a == n && live.contains(b));
                let called_by_live = edges.iter().any(|(a, b)| b == n && live.contains(a));
                !calls_live || !called_by_live
            })
            .collect();
        if removable.is_empty() {
            break;
        }
        for n in removable {
            live.remove(&n);
        }
    }

    if live.is_empty() {
        return Ok(());
    }
    let mut reported = HashSet::new();
    for n in nodes.into_iter().filter(|n| live.contains(n)) {
        let name = &shader.functions[n.function].name;
        if reported.insert(name.clone()) {
            log.error(LinkError::StaticRecursion(name.clone()));
        }
    }
    Err(Halt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shlink_ir::{Deref, Rvalue, Signature, Stage, Type, Variable, VariableMode};

    fn call(callee: Callee) -> Instruction {
        Instruction::Call {
            callee,
            arguments: vec![],
            result: None,
        }
    }

    fn unit_with_foo() -> Shader {
        let mut sh = Shader::new(Stage::Vertex, 130);
        let foo = sh.declare_function("foo");
        sh.add_signature(foo, Signature::defined(Type::Void, vec![], vec![]));
        sh
    }

    #[test]
    fn multiply_defined_function() {
        let a = unit_with_foo();
        let b = unit_with_foo();
        let mut log = InfoLog::new();
        assert!(check_multiply_defined(&mut log, &[&a, &b]).is_err());
        assert!(log.contains("function `foo' is multiply defined"));
    }

    #[test]
    fn prototype_and_builtin_are_not_duplicates() {
        let a = unit_with_foo();
        let mut b = Shader::new(Stage::Vertex, 130);
        let foo = b.declare_function("foo");
        b.add_signature(foo, Signature::prototype(Type::Void, vec![]));
        let mut c = unit_with_foo();
        let f = c.symbols.get_function("foo").unwrap();
        c.functions[f].signatures[0].is_builtin = true;
        let mut log = InfoLog::new();
        assert!(check_multiply_defined(&mut log, &[&a, &b, &c]).is_ok());
    }

    #[test]
    fn resolves_call_from_other_unit() {
        // unit a: vec4 helper(); void main() { color = helper(); }
        let mut a = Shader::new(Stage::Fragment, 130);
        let color = a.declare(Variable::new("color", Type::VEC4, VariableMode::ShaderOut));
        let helper = a.declare_function("helper");
        let proto = a.add_signature(helper, Signature::prototype(Type::VEC4, vec![]));
        a.define_main(vec![Instruction::Call {
            callee: proto,
            arguments: vec![],
            result: Some(Deref::Variable(color)),
        }]);

        // unit b: uniform vec4 tint; vec4 helper() { return tint; }
        let mut b = Shader::new(Stage::Fragment, 130);
        let tint = b.declare(Variable::new("tint", Type::VEC4, VariableMode::Uniform));
        let f = b.declare_function("helper");
        b.add_signature(
            f,
            Signature::defined(Type::VEC4, vec![], vec![Instruction::Return(Some(Rvalue::var(tint)))]),
        );

        let mut linked = a.clone();
        let mut log = InfoLog::new();
        link_function_calls(&mut log, &mut linked, &[&a, &b]).unwrap();
        let sig = linked.signature(proto);
        assert!(sig.is_defined);
        let tint_in_linked = linked.symbols.get_variable("tint").unwrap();
        assert_eq!(
            sig.body,
            vec![Instruction::Return(Some(Rvalue::var(tint_in_linked)))]
        );
    }

    #[test]
    fn unresolved_reference() {
        let mut a = Shader::new(Stage::Vertex, 130);
        let missing = a.declare_function("missing");
        let proto = a.add_signature(missing, Signature::prototype(Type::Void, vec![]));
        a.define_main(vec![call(proto)]);
        let mut linked = a.clone();
        let mut log = InfoLog::new();
        assert!(link_function_calls(&mut log, &mut linked, &[&a]).is_err());
        assert!(log.contains("unresolved reference to function `missing'"));
    }

    #[test]
    fn mutual_recursion_is_reported() {
        let mut sh = Shader::new(Stage::Vertex, 130);
        let a = sh.declare_function("a");
        let b = sh.declare_function("b");
        let leaf = sh.declare_function("leaf");
        let a_sig = Callee {
            function: a,
            signature: 0,
        };
        let b_sig = Callee {
            function: b,
            signature: 0,
        };
        let leaf_sig = sh.add_signature(leaf, Signature::defined(Type::Void, vec![], vec![]));
        sh.add_signature(a, Signature::defined(Type::Void, vec![], vec![call(b_sig)]));
        sh.add_signature(
            b,
            Signature::defined(Type::Void, vec![], vec![call(a_sig), call(leaf_sig)]),
        );
        sh.define_main(vec![call(a_sig)]);

        let mut log = InfoLog::new();
        assert!(detect_recursion(&mut log, &sh).is_err());
        assert!(log.contains("function `a' has static recursion"));
        assert!(log.contains("function `b' has static recursion"));
        assert!(!log.contains("`leaf'"));
        assert!(!log.contains("`main'"));
    }

    #[test]
    fn acyclic_calls_pass() {
        let mut sh = unit_with_foo();
        let foo = Callee {
            function: sh.symbols.get_function("foo").unwrap(),
            signature: 0,
        };
        sh.define_main(vec![call(foo), call(foo)]);
        let mut log = InfoLog::new();
        assert!(detect_recursion(&mut log, &sh).is_ok());
    }
}
