//! Uniform block merging and std140 layout.

use shlink_ir::{Shader, Stage, Type, UniformBlock};

use crate::diagnostics::InfoLog;
use crate::error::{Halt, LinkError};

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Base alignment and size in bytes of `ty` under std140.
fn std140_size_align(ty: &Type, row_major: bool) -> (u32, u32) {
    match ty {
        Type::Scalar(_) => (4, 4),
        Type::Vector { size, .. } => {
            let n = *size as u32;
            let align = if n == 2 { 8 } else { 16 };
            (align, 4 * n)
        }
        // Stored as an array of column (or row) vectors, each padded to vec4.
        Type::Matrix { columns, rows } => {
            let vectors = (if row_major { *rows } else { *columns }) as u32;
            (16, 16 * vectors)
        }
        Type::Array { base, .. } => {
            let (elem_align, elem_size) = std140_size_align(base, row_major);
            let stride = round_up(elem_size, 16);
            let count = ty.array_length().unwrap_or(0).max(1);
            (round_up(elem_align, 16), stride * count)
        }
        Type::Struct { fields, .. } | Type::Interface { fields, .. } => {
            let mut offset = 0;
            let mut align = 16;
            for f in fields {
                let (a, s) = std140_size_align(&f.ty, f.row_major);
                offset = round_up(offset, a) + s;
                align = align.max(a);
            }
            (align, round_up(offset, align))
        }
        Type::Void | Type::Sampler { .. } | Type::AtomicUint => (4, 0),
    }
}

/// Assigns std140 member offsets and the block data size.
///
/// `shared` and `packed` blocks are laid out with the same rules.
pub fn layout_uniform_block(block: &mut UniformBlock) {
    let mut offset = 0;
    for member in &mut block.members {
        let (align, size) = std140_size_align(&member.ty, member.row_major);
        member.offset = round_up(offset, align);
        offset = member.offset + size;
    }
    block.data_size = round_up(offset, 16);
}

/// Merges the uniform blocks declared by the units of one stage.
///
/// Blocks are matched by name and must be declared identically. Merged
/// blocks are laid out and checked against `max_block_size`.
pub(crate) fn link_uniform_blocks(
    log: &mut InfoLog,
    units: &[&Shader],
    max_block_size: u32,
) -> Result<Vec<UniformBlock>, Halt> {
    let mut blocks: Vec<UniformBlock> = Vec::new();
    for unit in units {
        for block in &unit.uniform_blocks {
            match blocks.iter().find(|b| b.name == block.name) {
                Some(existing) if !existing.same_definition(block) => {
                    return Err(log.error(LinkError::UniformBlockMismatch(block.name.clone())));
                }
                Some(_) => {}
                None => blocks.push(block.clone()),
            }
        }
    }

    for block in &mut blocks {
        layout_uniform_block(block);
        if block.data_size > max_block_size {
            return Err(log.error(LinkError::UniformBlockTooBig {
                name: block.name.clone(),
                size: block.data_size,
                max: max_block_size,
            }));
        }
    }
    Ok(blocks)
}

/// Program-wide uniform blocks plus, per stage, the stage-local index of
/// each program block.
pub(crate) type ProgramBlocks = (Vec<UniformBlock>, [Vec<Option<usize>>; Stage::COUNT]);

/// Merges the blocks of all linked stages into one program-wide list.
pub(crate) fn interstage_cross_validate_uniform_blocks(
    log: &mut InfoLog,
    linked: &[Option<Shader>; Stage::COUNT],
) -> Result<ProgramBlocks, Halt> {
    let mut blocks: Vec<UniformBlock> = Vec::new();
    let mut stage_index: [Vec<(usize, usize)>; Stage::COUNT] = Default::default();

    for stage in Stage::ALL {
        let Some(shader) = &linked[stage.index()] else {
            continue;
        };
        for (local, block) in shader.uniform_blocks.iter().enumerate() {
            let program_index = match blocks.iter().position(|b| b.name == block.name) {
                Some(i) if !blocks[i].same_definition(block) => {
                    return Err(log.error(LinkError::UniformBlockMismatch(block.name.clone())));
                }
                Some(i) => i,
                None => {
                    blocks.push(block.clone());
                    blocks.len() - 1
                }
            };
            stage_index[stage.index()].push((program_index, local));
        }
    }

    let tables = stage_index.map(|pairs| {
        let mut table = vec![None; blocks.len()];
        for (program_index, local) in pairs {
            table[program_index] = Some(local);
        }
        table
    });
    Ok((blocks, tables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shlink_ir::StructField;

    fn block(members: Vec<(&str, Type)>) -> UniformBlock {
        UniformBlock::new(
            "Params",
            members.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
        )
    }

    #[test]
    fn std140_offsets() {
        let mut b = block(vec![
            ("a", Type::FLOAT),
            ("b", Type::VEC3),
            ("c", Type::FLOAT),
            ("d", Type::VEC2),
            ("m", Type::MAT4),
            ("arr", Type::array(Type::FLOAT, 3)),
        ]);
        layout_uniform_block(&mut b);
        let offsets: Vec<u32> = b.members.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 16, 28, 32, 48, 112]);
        assert_eq!(b.data_size, 160);
    }

    #[test]
    fn struct_members_align_to_vec4() {
        let light = Type::Struct {
            name: "Light".into(),
            fields: vec![StructField::new("intensity", Type::FLOAT)],
        };
        let mut b = block(vec![("x", Type::FLOAT), ("light", light)]);
        layout_uniform_block(&mut b);
        assert_eq!(b.members[1].offset, 16);
        assert_eq!(b.data_size, 32);
    }

    #[test]
    fn mismatched_definitions_are_rejected() {
        let mut a = Shader::new(Stage::Vertex, 140);
        a.uniform_blocks.push(block(vec![("x", Type::VEC4)]));
        let mut b = Shader::new(Stage::Vertex, 140);
        b.uniform_blocks.push(block(vec![("x", Type::VEC3)]));
        let mut log = InfoLog::new();
        assert!(link_uniform_blocks(&mut log, &[&a, &b], 16384).is_err());
        assert!(log.contains("uniform block `Params' has mismatching definitions"));
    }

    #[test]
    fn oversized_block() {
        let mut a = Shader::new(Stage::Fragment, 140);
        a.uniform_blocks.push(block(vec![("big", Type::array(Type::VEC4, 64))]));
        let mut log = InfoLog::new();
        assert!(link_uniform_blocks(&mut log, &[&a], 512).is_err());
        assert!(log.contains("uniform block `Params' too big (1024/512)"));
    }

    #[test]
    fn stage_index_table() {
        let mut vs = Shader::new(Stage::Vertex, 140);
        vs.uniform_blocks.push(block(vec![("x", Type::VEC4)]));
        let mut fs = Shader::new(Stage::Fragment, 140);
        let mut other = block(vec![("y", Type::FLOAT)]);
        other.name = "Other".into();
        fs.uniform_blocks.push(other);
        fs.uniform_blocks.push(block(vec![("x", Type::VEC4)]));

        let linked = [Some(vs), None, Some(fs)];
        let mut log = InfoLog::new();
        let (blocks, index) = interstage_cross_validate_uniform_blocks(&mut log, &linked).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(index[Stage::Vertex.index()], vec![Some(0), None]);
        assert_eq!(index[Stage::Geometry.index()], vec![None, None]);
        assert_eq!(index[Stage::Fragment.index()], vec![Some(1), Some(0)]);
    }
}
