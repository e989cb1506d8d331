//! Translation units and linked stage executables.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::arena::{Arena, Handle};
use crate::function::{Function, Signature};
use crate::ir::{Block, Callee, Deref, Instruction};
use crate::types::{InterfacePacking, Type};
use crate::variable::Variable;
use crate::visit;

/// A programmable pipeline stage, in pipeline order.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Stage {
    Vertex,
    Geometry,
    Fragment,
}

impl Stage {
    pub const COUNT: usize = 3;
    pub const ALL: [Stage; Self::COUNT] = [Stage::Vertex, Stage::Geometry, Stage::Fragment];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Geometry => "geometry",
            Self::Fragment => "fragment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Geometry shader primitive topology.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PrimitiveType {
    Points,
    Lines,
    LinesAdjacency,
    LineStrip,
    Triangles,
    TrianglesAdjacency,
    TriangleStrip,
}

impl PrimitiveType {
    /// Number of vertices making up one primitive.
    pub fn vertices(self) -> u32 {
        match self {
            Self::Points => 1,
            Self::Lines | Self::LineStrip => 2,
            Self::Triangles | Self::TriangleStrip => 3,
            Self::LinesAdjacency => 4,
            Self::TrianglesAdjacency => 6,
        }
    }
}

/// Geometry layout qualifiers declared by one unit, or folded for a stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeometryLayout {
    pub input: Option<PrimitiveType>,
    pub output: Option<PrimitiveType>,
    pub vertices_out: Option<u32>,
}

/// A member of a uniform block.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UniformBlockMember {
    pub name: String,
    pub ty: Type,
    #[cfg_attr(feature = "serde", serde(default))]
    pub row_major: bool,
    /// Byte offset assigned by the block layout.
    #[cfg_attr(feature = "serde", serde(default))]
    pub offset: u32,
}

/// A named uniform block.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UniformBlock {
    pub name: String,
    pub members: Vec<UniformBlockMember>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub packing: InterfacePacking,
    #[cfg_attr(feature = "serde", serde(default))]
    pub binding: Option<u32>,
    /// Total size in bytes assigned by the block layout.
    #[cfg_attr(feature = "serde", serde(default))]
    pub data_size: u32,
}

impl UniformBlock {
    pub fn new(name: impl Into<String>, members: Vec<(String, Type)>) -> Self {
        Self {
            name: name.into(),
            members: members
                .into_iter()
                .map(|(name, ty)| UniformBlockMember {
                    name,
                    ty,
                    row_major: false,
                    offset: 0,
                })
                .collect(),
            packing: InterfacePacking::Std140,
            binding: None,
            data_size: 0,
        }
    }

    /// Returns `true` if both blocks declare the same members with the same
    /// packing. Layout results are not compared.
    pub fn same_definition(&self, other: &UniformBlock) -> bool {
        self.name == other.name
            && self.packing == other.packing
            && self.members.len() == other.members.len()
            && self
                .members
                .iter()
                .zip(&other.members)
                .all(|(a, b)| a.name == b.name && a.ty == b.ty && a.row_major == b.row_major)
    }
}

/// Global-scope name lookup for a shader.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    variables: HashMap<String, Handle<Variable>>,
    functions: HashMap<String, Handle<Function>>,
}

impl SymbolTable {
    pub fn add_variable(&mut self, name: &str, handle: Handle<Variable>) {
        self.variables.insert(name.to_string(), handle);
    }

    pub fn get_variable(&self, name: &str) -> Option<Handle<Variable>> {
        self.variables.get(name).copied()
    }

    pub fn remove_variable(&mut self, name: &str) {
        self.variables.remove(name);
    }

    pub fn add_function(&mut self, name: &str, handle: Handle<Function>) {
        self.functions.insert(name.to_string(), handle);
    }

    pub fn get_function(&self, name: &str) -> Option<Handle<Function>> {
        self.functions.get(name).copied()
    }

    pub fn remove_function(&mut self, name: &str) {
        self.functions.remove(name);
    }

    pub fn clear(&mut self) {
        self.variables.clear();
        self.functions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.functions.is_empty()
    }
}

/// A shader: either one compiled translation unit or a linked stage
/// executable.
///
/// The top-level instruction list holds variable and function declarations
/// plus any global initializer statements the front end left outside
/// `main`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shader {
    pub stage: Stage,
    pub version: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_es: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub variables: Arena<Variable>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub functions: Arena<Function>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub ir: Block,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub symbols: SymbolTable,
    #[cfg_attr(feature = "serde", serde(default))]
    pub geometry: GeometryLayout,
    #[cfg_attr(feature = "serde", serde(default))]
    pub uniform_blocks: Vec<UniformBlock>,
    /// Built-in function libraries searched for unresolved calls.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub builtins_to_link: Vec<Arc<Shader>>,
}

impl Shader {
    pub fn new(stage: Stage, version: u32) -> Self {
        Self {
            stage,
            version,
            is_es: false,
            variables: Arena::new(),
            functions: Arena::new(),
            ir: Vec::new(),
            symbols: SymbolTable::default(),
            geometry: GeometryLayout::default(),
            uniform_blocks: Vec::new(),
            builtins_to_link: Vec::new(),
        }
    }

    /// An ES-dialect shader.
    pub fn new_es(stage: Stage, version: u32) -> Self {
        Self {
            is_es: true,
            ..Self::new(stage, version)
        }
    }

    /// Declares a global variable at the end of the top-level list.
    pub fn declare(&mut self, var: Variable) -> Handle<Variable> {
        let name = var.name.clone();
        let handle = self.variables.append(var);
        self.ir.push(Instruction::Declare(handle));
        self.symbols.add_variable(&name, handle);
        handle
    }

    /// Adds a variable to the arena without declaring it; used for locals
    /// and parameters whose declaration lives in a function.
    pub fn add_variable(&mut self, var: Variable) -> Handle<Variable> {
        self.variables.append(var)
    }

    /// Returns the function named `name`, declaring it if needed.
    pub fn declare_function(&mut self, name: &str) -> Handle<Function> {
        if let Some(handle) = self.symbols.get_function(name) {
            return handle;
        }
        let handle = self.functions.append(Function::new(name));
        self.ir.push(Instruction::Function(handle));
        self.symbols.add_function(name, handle);
        handle
    }

    /// Adds a signature to `function` and returns a callee referencing it.
    pub fn add_signature(&mut self, function: Handle<Function>, signature: Signature) -> Callee {
        let sigs = &mut self.functions[function].signatures;
        sigs.push(signature);
        Callee {
            function,
            signature: sigs.len() - 1,
        }
    }

    /// Defines `void main()` with the given body.
    pub fn define_main(&mut self, body: Block) -> Callee {
        let main = self.declare_function("main");
        self.add_signature(main, Signature::defined(Type::Void, Vec::new(), body))
    }

    /// Rebuilds the symbol table from the top-level declarations.
    pub fn populate_symbol_table(&mut self) {
        self.symbols.clear();
        for inst in &self.ir {
            match *inst {
                Instruction::Declare(h) => {
                    if let Some(var) = self.variables.try_get(h) {
                        self.symbols.add_variable(&var.name, h);
                    }
                }
                Instruction::Function(h) => {
                    if let Some(func) = self.functions.try_get(h) {
                        self.symbols.add_function(&func.name, h);
                    }
                }
                _ => {}
            }
        }
    }

    /// The defined `void main()` signature, if any.
    pub fn main_signature(&self) -> Option<Callee> {
        let function = self.symbols.get_function("main")?;
        self.functions[function]
            .signatures
            .iter()
            .position(|sig| sig.parameters.is_empty() && sig.is_defined)
            .map(|signature| Callee {
                function,
                signature,
            })
    }

    pub fn signature(&self, callee: Callee) -> &Signature {
        &self.functions[callee.function].signatures[callee.signature]
    }

    pub fn signature_mut(&mut self, callee: Callee) -> &mut Signature {
        &mut self.functions[callee.function].signatures[callee.signature]
    }

    /// Parameter types of a signature, in order.
    pub fn parameter_types(&self, callee: Callee) -> Vec<Type> {
        self.signature(callee)
            .parameters
            .iter()
            .map(|&p| self.variables[p].ty.clone())
            .collect()
    }

    /// Finds the signature of `function` whose parameter types are exactly
    /// `parameters`.
    pub fn find_signature(&self, function: Handle<Function>, parameters: &[Type]) -> Option<usize> {
        self.functions[function]
            .signatures
            .iter()
            .position(|sig| {
                sig.parameters.len() == parameters.len()
                    && sig
                        .parameters
                        .iter()
                        .zip(parameters)
                        .all(|(&p, ty)| self.variables[p].ty == *ty)
            })
    }

    /// Handles of the variables declared at the top level, in order.
    pub fn global_variables(&self) -> impl Iterator<Item = Handle<Variable>> + '_ {
        self.ir.iter().filter_map(|inst| match inst {
            Instruction::Declare(h) => Some(*h),
            _ => None,
        })
    }

    /// Handles of the functions declared at the top level, in order.
    pub fn declared_functions(&self) -> impl Iterator<Item = Handle<Function>> + '_ {
        self.ir.iter().filter_map(|inst| match inst {
            Instruction::Function(h) => Some(*h),
            _ => None,
        })
    }

    /// Looks up a global variable by name.
    pub fn find_variable(&self, name: &str) -> Option<&Variable> {
        self.symbols.get_variable(name).map(|h| &self.variables[h])
    }

    /// Calls `f` on the top-level list and on every function body.
    pub fn for_each_body_mut(&mut self, mut f: impl FnMut(&mut Block)) {
        f(&mut self.ir);
        for (_, function) in self.functions.iter_mut() {
            for sig in &mut function.signatures {
                f(&mut sig.body);
            }
        }
    }

    /// Drops variables and functions no longer reachable from the
    /// instruction lists and renumbers all handles.
    ///
    /// Variables are kept if declared anywhere, used as a parameter, or
    /// dereferenced. Functions are kept if declared at the top level. The
    /// symbol table is rebuilt from the surviving declarations.
    pub fn compact(&mut self) {
        let mut live_vars = vec![false; self.variables.len()];
        let mut live_funcs = vec![false; self.functions.len()];

        for h in self.declared_functions() {
            if let Some(slot) = live_funcs.get_mut(h.index()) {
                *slot = true;
            }
        }
        for (h, function) in self.functions.iter() {
            if !live_funcs[h.index()] {
                continue;
            }
            for sig in &function.signatures {
                for p in &sig.parameters {
                    live_vars[p.index()] = true;
                }
            }
        }
        let _ = visit::walk_shader(self, &mut |node| {
            match node {
                visit::Node::Instruction(Instruction::Declare(h))
                | visit::Node::Deref(Deref::Variable(h)) => {
                    if let Some(slot) = live_vars.get_mut(h.index()) {
                        *slot = true;
                    }
                }
                _ => {}
            }
            visit::Visit::Continue
        });

        let var_map = self.variables.compact(|h| live_vars[h.index()]);
        let func_map = self.functions.compact(|h| live_funcs[h.index()]);

        for (_, function) in self.functions.iter_mut() {
            for sig in &mut function.signatures {
                for p in &mut sig.parameters {
                    if let Some(new) = var_map[p.index()] {
                        *p = new;
                    }
                }
            }
        }
        self.for_each_body_mut(|block| {
            visit::for_each_instruction_mut(block, &mut |inst| match inst {
                Instruction::Declare(h) => {
                    if let Some(new) = var_map[h.index()] {
                        *h = new;
                    }
                }
                Instruction::Function(h) => {
                    if let Some(new) = func_map[h.index()] {
                        *h = new;
                    }
                }
                Instruction::Call { callee, .. } => {
                    if let Some(new) = func_map[callee.function.index()] {
                        callee.function = new;
                    }
                }
                _ => {}
            });
            visit::for_each_deref_mut(block, &mut |deref| {
                if let Deref::Variable(h) = deref {
                    if let Some(new) = var_map[h.index()] {
                        *h = new;
                    }
                }
            });
        });
        self.populate_symbol_table();
    }
}
