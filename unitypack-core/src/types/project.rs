//! Export configuration
//!
//! Defines the optional `unitypack.json` manifest format. Every field has a
//! default matching the AWS GameKit plugin layout, so a project without a
//! manifest exports the same way as one with an empty `{}` manifest.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};

/// File name of the optional manifest at the project root
pub const CONFIG_FILE_NAME: &str = "unitypack.json";

/// The export configuration file (unitypack.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    /// Editor window-state folder, scanned for unwanted files
    #[serde(default = "default_window_state_dir")]
    pub window_state_dir: PathBuf,

    /// Per-instance CloudFormation outputs, scanned for unwanted files
    #[serde(default = "default_instance_files_dir")]
    pub instance_files_dir: PathBuf,

    /// Embedded template repository, queried for git-ignored files
    #[serde(default = "default_base_templates_dir")]
    pub base_templates_dir: PathBuf,

    /// File kept in every scanned folder (together with its `.meta` sibling)
    #[serde(default = "default_readme_name")]
    pub readme_name: String,

    /// Files inside the base templates that are never shipped, even when tracked
    #[serde(default = "default_base_template_exclusions")]
    pub extra_base_template_exclusions: Vec<PathBuf>,

    /// Where unwanted files are parked during the export (relative to the project root)
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Static C# method Unity runs to build the package
    #[serde(default = "default_export_method")]
    pub export_method: String,

    /// Output path handed to the export method
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

fn editor_dir() -> PathBuf {
    Path::new("Packages").join("com.amazonaws.gamekit").join("Editor")
}

fn cloud_resources_dir() -> PathBuf {
    editor_dir().join("CloudResources")
}

fn default_window_state_dir() -> PathBuf {
    editor_dir().join("WindowState")
}

fn default_instance_files_dir() -> PathBuf {
    cloud_resources_dir().join("InstanceFiles")
}

fn default_base_templates_dir() -> PathBuf {
    cloud_resources_dir().join(".BaseTemplates")
}

fn default_readme_name() -> String {
    "README.md".to_string()
}

fn default_base_template_exclusions() -> Vec<PathBuf> {
    [
        ".crux_template.md",
        "Config",
        "Config.meta",
        "CODE_OF_CONDUCT.md",
        "CONTRIBUTING.md",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("TempExportUnityPackage")
}

fn default_export_method() -> String {
    "Internal.Editor.PackageBuilder.ExportPackage".to_string()
}

fn default_output_path() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            window_state_dir: default_window_state_dir(),
            instance_files_dir: default_instance_files_dir(),
            base_templates_dir: default_base_templates_dir(),
            readme_name: default_readme_name(),
            extra_base_template_exclusions: default_base_template_exclusions(),
            temp_dir: default_temp_dir(),
            export_method: default_export_method(),
            output_path: default_output_path(),
        }
    }
}

impl ExportConfig {
    /// Load `unitypack.json` from the project root, falling back to defaults
    /// when the file does not exist.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE_NAME);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(PackError::io(path, e)),
        };

        serde_json::from_str(&json).map_err(|source| PackError::Config { path, source })
    }

    /// Folders whose contents are unwanted apart from the README
    pub fn scanned_folders(&self) -> [&Path; 2] {
        [self.window_state_dir.as_path(), self.instance_files_dir.as_path()]
    }
}
