//! Unitypack Core Library
//!
//! This crate provides the core functionality for Unitypack:
//! - Export configuration (`unitypack.json`)
//! - Git ignore queries for embedded template repositories
//! - The unwanted-file policy
//! - The staging area that moves files aside and back
//! - Unity package export orchestration

pub mod error;
pub mod export;
pub mod git;
pub mod path_utils;
pub mod policy;
pub mod process;
pub mod staging;
pub mod types;

// Re-export commonly used types
pub use error::{PackError, Result};
pub use export::{export_package, ExportPhase, ExportStats, PackageExportConfig};
pub use git::ignored_paths;
pub use path_utils::{normalize_path, path_to_string, RelativePath, META_SUFFIX};
pub use policy::{find_unwanted_files, UnwantedFiles};
pub use process::{CommandRunner, CommandSpec, ProcessOutput, SystemRunner};
pub use staging::{StagingArea, StagingEntry, StagingJournal};
pub use types::{ExportConfig, IgnoreQuery, IgnoreSet, CONFIG_FILE_NAME};
