//! Program-wide uniform storage.

use shlink_ir::{Shader, Stage, Type, Variable, VariableMode};

use crate::array_sizing::retype_array_derefs;
use crate::program::{StageResources, UniformStorage};

/// Shrinks default-block uniform arrays to one past the highest index any
/// stage accesses.
pub(crate) fn update_array_sizes(linked: &mut [Option<Shader>; Stage::COUNT]) {
    let mut resized = [false; Stage::COUNT];
    for i in 0..Stage::COUNT {
        let Some(shader) = &linked[i] else {
            continue;
        };
        let candidates: Vec<_> = shader
            .global_variables()
            .filter(|&h| {
                let var = &shader.variables[h];
                var.mode == VariableMode::Uniform
                    && var.ty.is_array()
                    && !var.is_in_uniform_block()
                    && !var.ty.contains_atomic()
            })
            .collect();

        for h in candidates {
            let Some(shader) = &linked[i] else {
                continue;
            };
            let name = shader.variables[h].name.clone();
            let max_access = linked
                .iter()
                .flatten()
                .filter_map(|sh| sh.find_variable(&name))
                .filter(|v| v.mode == VariableMode::Uniform)
                .map(|v| v.max_array_access)
                .max()
                .unwrap_or(0);

            let Some(shader) = &mut linked[i] else {
                continue;
            };
            let var = &mut shader.variables[h];
            if var.ty.array_length() != Some(max_access + 1) {
                log::debug!("resizing uniform array `{name}' to {}", max_access + 1);
                var.ty = var.ty.with_array_length(max_access + 1);
                resized[i] = true;
            }
        }
    }

    for (shader, resized) in linked.iter_mut().zip(resized) {
        if let (Some(shader), true) = (shader, resized) {
            retype_array_derefs(shader);
        }
    }
}

/// A leaf of a uniform's type, named the way the program exposes it.
struct Leaf {
    name: String,
    ty: Type,
}

/// Flattens struct-typed uniforms into `s.f` and `s[i].f` leaves.
fn flatten(name: String, ty: &Type, out: &mut Vec<Leaf>) {
    match ty {
        Type::Struct { fields, .. } => {
            for f in fields {
                flatten(format!("{name}.{}", f.name), &f.ty, out);
            }
        }
        Type::Array { base, .. } if matches!(**base, Type::Struct { .. }) => {
            for i in 0..ty.array_length().unwrap_or(0) {
                flatten(format!("{name}[{i}]"), base, out);
            }
        }
        _ => out.push(Leaf {
            name,
            ty: ty.clone(),
        }),
    }
}

fn block_leaves(var: &Variable) -> Vec<(String, Type, String)> {
    let Some(ifc) = &var.interface_type else {
        return Vec::new();
    };
    let block = ifc.type_name().unwrap_or_default().to_string();
    if var.ty.interface().is_some() {
        ifc.fields()
            .iter()
            .map(|f| (format!("{block}.{}", f.name), f.ty.clone(), block.clone()))
            .collect()
    } else {
        vec![(var.name.clone(), var.ty.clone(), block)]
    }
}

struct Assigner {
    uniforms: Vec<UniformStorage>,
    next_location: u32,
    next_sampler_unit: u32,
}

impl Assigner {
    /// Returns the entry for `name`, creating it if this is its first stage.
    fn entry(
        &mut self,
        name: &str,
        ty: &Type,
        create: impl FnOnce(&mut Self) -> UniformStorage,
    ) -> &mut UniformStorage {
        let pos = match self.uniforms.iter().position(|u| u.name == name) {
            Some(pos) => pos,
            None => {
                let mut entry = create(self);
                entry.name = name.to_string();
                entry.ty = ty.clone();
                self.uniforms.push(entry);
                self.uniforms.len() - 1
            }
        };
        &mut self.uniforms[pos]
    }

    fn default_block_entry(&mut self, leaf: &Leaf, var: &Variable) -> &mut UniformStorage {
        let whole = leaf.name == var.name;
        self.entry(&leaf.name, &leaf.ty, |this| {
            let array_elements = leaf.ty.array_length().unwrap_or(0);
            let location = this.next_location;
            this.next_location += array_elements.max(1);

            let sampler_unit = leaf.ty.contains_sampler().then(|| {
                if var.explicit_binding && whole {
                    var.binding
                } else {
                    let unit = this.next_sampler_unit;
                    this.next_sampler_unit += leaf.ty.sampler_count();
                    unit
                }
            });
            UniformStorage {
                name: String::new(),
                ty: Type::Void,
                location: Some(location),
                array_elements,
                sampler_unit,
                block: None,
                initializer: if whole {
                    var.constant_initializer.clone()
                } else {
                    None
                },
                stages: [false; Stage::COUNT],
            }
        })
    }
}

/// Builds the program's uniform list and per-stage uniform usage.
///
/// Default-block uniforms get consecutive base locations, one per array
/// element. Samplers take their explicit binding or the next free unit.
/// Uniform block members get no location.
pub(crate) fn assign_uniform_locations(
    linked: &[Option<Shader>; Stage::COUNT],
) -> (Vec<UniformStorage>, [StageResources; Stage::COUNT]) {
    let mut assigner = Assigner {
        uniforms: Vec::new(),
        next_location: 0,
        next_sampler_unit: 0,
    };
    let mut resources = [StageResources::default(); Stage::COUNT];

    for stage in Stage::ALL {
        let Some(shader) = &linked[stage.index()] else {
            continue;
        };
        let res = &mut resources[stage.index()];
        for h in shader.global_variables() {
            let var = &shader.variables[h];
            if var.mode != VariableMode::Uniform {
                continue;
            }

            if var.is_in_uniform_block() {
                for (name, ty, block) in block_leaves(var) {
                    let entry = assigner.entry(&name, &ty, |_| UniformStorage {
                        name: String::new(),
                        ty: Type::Void,
                        location: None,
                        array_elements: ty.array_length().unwrap_or(0),
                        sampler_unit: None,
                        block: Some(block.clone()),
                        initializer: None,
                        stages: [false; Stage::COUNT],
                    });
                    entry.stages[stage.index()] = true;
                }
                continue;
            }

            res.samplers += var.ty.sampler_count();
            res.uniform_components += var.ty.component_slots();

            let mut leaves = Vec::new();
            flatten(var.name.clone(), &var.ty, &mut leaves);
            for leaf in &leaves {
                assigner.default_block_entry(leaf, var).stages[stage.index()] = true;
            }
        }

        let block_components: u32 = shader.uniform_blocks.iter().map(|b| b.data_size / 4).sum();
        res.combined_uniform_components = res.uniform_components + block_components;
    }

    log::debug!(
        "assigned {} uniform(s), {} location(s)",
        assigner.uniforms.len(),
        assigner.next_location
    );
    (assigner.uniforms, resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shlink_ir::{Constant, Deref, Instruction, Rvalue, StructField, UniformBlock};

    fn uniform(name: &str, ty: Type) -> Variable {
        Variable::new(name, ty, VariableMode::Uniform)
    }

    fn stages(vs: Option<Shader>, fs: Option<Shader>) -> [Option<Shader>; Stage::COUNT] {
        [vs, None, fs]
    }

    #[test]
    fn arrays_shrink_to_highest_access_across_stages() {
        let mut vs = Shader::new(Stage::Vertex, 130);
        let a = vs.declare(uniform("a", Type::array(Type::VEC4, 10)).with_max_access(2));
        let out = vs.declare(Variable::new("v", Type::VEC4, VariableMode::ShaderOut));
        vs.define_main(vec![Instruction::assign(
            Deref::Variable(out),
            Rvalue::Deref(Deref::Variable(a).element(
                Rvalue::Constant(Constant::int(2)),
                &Type::array(Type::VEC4, 10),
            )),
        )]);
        let mut fs = Shader::new(Stage::Fragment, 130);
        fs.declare(uniform("a", Type::array(Type::VEC4, 10)).with_max_access(5));

        let mut linked = stages(Some(vs), Some(fs));
        update_array_sizes(&mut linked);
        for sh in linked.iter().flatten() {
            assert_eq!(sh.find_variable("a").unwrap().ty, Type::array(Type::VEC4, 6));
        }
    }

    #[test]
    fn locations_and_sampler_units() {
        let mut vs = Shader::new(Stage::Vertex, 130);
        vs.declare(uniform("mvp", Type::MAT4));
        vs.declare(uniform("weights", Type::array(Type::FLOAT, 4)));
        let mut fs = Shader::new(Stage::Fragment, 130);
        fs.declare(uniform("tex", Type::SAMPLER_2D));
        let mut bound = uniform("shadow", Type::SAMPLER_2D);
        bound.explicit_binding = true;
        bound.binding = 7;
        fs.declare(bound);
        fs.declare(uniform("mvp", Type::MAT4));

        let (uniforms, resources) = assign_uniform_locations(&stages(Some(vs), Some(fs)));
        let find = |n: &str| uniforms.iter().find(|u| u.name == n).unwrap();
        assert_eq!(find("mvp").location, Some(0));
        assert_eq!(find("weights").location, Some(1));
        assert_eq!(find("weights").array_elements, 4);
        assert_eq!(find("tex").location, Some(5));
        assert_eq!(find("tex").sampler_unit, Some(0));
        assert_eq!(find("shadow").sampler_unit, Some(7));
        assert_eq!(find("mvp").stages, [true, false, true]);
        assert_eq!(uniforms.len(), 4);

        assert_eq!(resources[0].uniform_components, 16 + 4);
        assert_eq!(resources[2].samplers, 2);
        assert_eq!(resources[2].uniform_components, 16);
    }

    #[test]
    fn structs_flatten_and_blocks_have_no_location() {
        let light = Type::Struct {
            name: "Light".into(),
            fields: vec![
                StructField::new("pos", Type::VEC3),
                StructField::new("tex", Type::SAMPLER_2D),
            ],
        };
        let mut fs = Shader::new(Stage::Fragment, 150);
        fs.declare(uniform("lights", Type::array(light, 2)));

        let ifc = Type::Interface {
            name: "Params".into(),
            fields: vec![StructField::new("gain", Type::FLOAT)],
            packing: Default::default(),
        };
        let mut gain = uniform("gain", Type::FLOAT);
        gain.interface_type = Some(ifc);
        fs.declare(gain);
        let mut block = UniformBlock::new("Params", vec![("gain".into(), Type::FLOAT)]);
        block.data_size = 16;
        fs.uniform_blocks.push(block);

        let (uniforms, resources) = assign_uniform_locations(&stages(None, Some(fs)));
        let names: Vec<_> = uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            ["lights[0].pos", "lights[0].tex", "lights[1].pos", "lights[1].tex", "gain"]
        );
        assert_eq!(uniforms[3].sampler_unit, Some(1));
        assert_eq!(uniforms[4].location, None);
        assert_eq!(uniforms[4].block.as_deref(), Some("Params"));
        assert_eq!(resources[2].uniform_components, 6);
        assert_eq!(resources[2].combined_uniform_components, 10);
    }
}
