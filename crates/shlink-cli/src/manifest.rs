//! Program manifests.
//!
//! A manifest is a TOML file naming the translation units to link, plus
//! the state an application would set on the program object before
//! linking: attribute and fragment output bindings, transform feedback
//! varyings and link options. Shader paths are relative to the manifest.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use shlink_ir::Shader;
use shlink_linker::{Limits, LinkOptions, Program, TransformFeedbackMode};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("manifest lists no shaders")]
    NoShaders,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub shaders: Vec<PathBuf>,
    #[serde(default)]
    pub attribute_bindings: HashMap<String, u32>,
    #[serde(default)]
    pub frag_data_bindings: HashMap<String, u32>,
    #[serde(default)]
    pub frag_data_index_bindings: HashMap<String, u32>,
    #[serde(default)]
    pub transform_feedback: Option<FeedbackSection>,
    #[serde(default)]
    pub options: LinkOptions,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedbackSection {
    pub varyings: Vec<String>,
    #[serde(default)]
    pub mode: TransformFeedbackMode,
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let manifest: Self = read_toml(path)?;
        if manifest.shaders.is_empty() {
            return Err(ManifestError::NoShaders);
        }
        Ok(manifest)
    }

    /// Loads every listed shader and builds the program to link.
    ///
    /// `base_dir` is the directory relative shader paths resolve against.
    pub fn into_program(self, base_dir: &Path) -> Result<(Program, LinkOptions), ManifestError> {
        let mut program = Program::new();
        for rel in &self.shaders {
            let path = base_dir.join(rel);
            let mut shader: Shader = read_toml(&path)?;
            shader.populate_symbol_table();
            log::debug!(
                "loaded {} shader {} ({} variables, {} functions)",
                shader.stage.name(),
                path.display(),
                shader.variables.len(),
                shader.functions.len()
            );
            program.attach(shader);
        }

        program.attribute_bindings = self.attribute_bindings;
        program.frag_data_bindings = self.frag_data_bindings;
        program.frag_data_index_bindings = self.frag_data_index_bindings;
        if let Some(tfb) = self.transform_feedback {
            program.set_transform_feedback_varyings(tfb.varyings, tfb.mode);
        }
        Ok((program, self.options))
    }
}

/// Reads a limits table, filling unset fields with the defaults.
pub fn load_limits(path: &Path) -> Result<Limits, ManifestError> {
    read_toml(path)
}
