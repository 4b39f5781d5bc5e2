use crate::error::{CliError, Result};
use crate::io::frame_file::Rows;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileLatticeConfig {
    pub structure: Option<String>,
    pub lattice_constant: Option<f64>,
    pub ca_ratio: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileOutputConfig {
    pub deformation_gradients: Option<bool>,
    pub strain_tensors: Option<bool>,
    pub push_forward: Option<bool>,
    pub csv: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileToleranceConfig {
    pub orientation_degrees: Option<f64>,
    pub min_normal_determinant: Option<f64>,
    pub min_correspondences: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub lattice: Option<FileLatticeConfig>,
    pub output: Option<FileOutputConfig>,
    pub tolerances: Option<FileToleranceConfig>,
    /// Each orientation is given as three matrix rows.
    pub preferred_orientations: Option<Vec<Rows>>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration file {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
