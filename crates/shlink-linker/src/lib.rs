//! Multi-stage shader program linker.
//!
//! [`link_program`] merges the translation units attached to a
//! [`Program`] into one executable per stage, validates them against each
//! other, and assigns locations for attributes, fragment outputs,
//! varyings and uniforms. Every diagnostic goes to the program's
//! [`InfoLog`]; the link succeeds iff no error was logged.

mod array_sizing;
mod cross_validate;
mod diagnostics;
mod error;
mod functions;
mod interface_blocks;
mod interstage;
mod intrastage;
mod linker;
mod locations;
mod options;
mod program;
mod remap;
mod resources;
mod stage_validate;
mod transform_feedback;
mod uniform_blocks;
mod uniforms;
mod varyings;

pub use diagnostics::{InfoLog, LogEntry, Severity};
pub use error::{ErrorKind, Halt, LinkError};
pub use linker::link_program;
pub use locations::find_available_slots;
pub use options::{Limits, LinkOptions};
pub use program::{
    CapturedVarying, GeometryInfo, Program, StageResources, TransformFeedbackMode,
    TransformFeedbackRequest, UniformStorage, VertexInfo,
};
pub use stage_validate::{find_assignment, find_deref};
pub use transform_feedback::parse_program_resource_name;
pub use uniform_blocks::layout_uniform_block;
