//! Unwanted-file policy
//!
//! Decides which paths must be moved out of the project before Unity builds
//! the package. Three independent sources contribute:
//! - the editor window-state folder, minus its README
//! - the instance-files folder, minus its README
//! - the base templates: everything their own `.gitignore` ignores, plus a
//!   fixed list of repository housekeeping files
//!
//! Sources may overlap; staging a path twice is harmless.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{PackError, Result};
use crate::git;
use crate::path_utils::{has_text_prefix, RelativePath};
use crate::process::CommandRunner;
use crate::types::ExportConfig;

/// Unwanted paths grouped by the source that produced them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnwantedFiles {
    pub window_state: Vec<RelativePath>,
    pub instance_files: Vec<RelativePath>,
    pub base_templates: Vec<RelativePath>,
}

impl UnwantedFiles {
    pub fn len(&self) -> usize {
        self.window_state.len() + self.instance_files.len() + self.base_templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All paths in staging order, duplicates included
    pub fn into_paths(self) -> Vec<RelativePath> {
        let mut paths = self.window_state;
        paths.extend(self.instance_files);
        paths.extend(self.base_templates);
        paths
    }
}

/// Collect every path under `project_root` that must not be packaged
pub fn find_unwanted_files(
    runner: &dyn CommandRunner,
    project_root: &Path,
    config: &ExportConfig,
) -> Result<UnwantedFiles> {
    let [window_state_dir, instance_files_dir] = config.scanned_folders();

    let unwanted = UnwantedFiles {
        window_state: folder_contents_except(project_root, window_state_dir, &config.readme_name)?,
        instance_files: folder_contents_except(
            project_root,
            instance_files_dir,
            &config.readme_name,
        )?,
        base_templates: base_template_files(runner, project_root, config)?,
    };

    tracing::info!(
        "Found {} unwanted path(s): {} window state, {} instance files, {} base templates",
        unwanted.len(),
        unwanted.window_state.len(),
        unwanted.instance_files.len(),
        unwanted.base_templates.len()
    );

    Ok(unwanted)
}

/// List the direct children of `folder`, except `keep_name` and anything
/// whose name starts with it (its `.meta` sibling).
///
/// `folder` is relative to `project_root`, and so are the returned paths.
/// A missing folder has no unwanted children.
pub fn folder_contents_except(
    project_root: &Path,
    folder: &Path,
    keep_name: &str,
) -> Result<Vec<RelativePath>> {
    let folder = RelativePath::new(folder)?;
    let dir = folder.under(project_root);
    let keep = folder.as_path().join(keep_name);

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("{} does not exist, nothing to exclude", folder);
            return Ok(Vec::new());
        }
        Err(e) => return Err(PackError::io(&dir, e)),
    };

    let mut unwanted = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PackError::io(&dir, e))?;
        let path = folder.join(entry.file_name())?;
        if !has_text_prefix(path.as_path(), &keep) {
            unwanted.push(path);
        }
    }

    unwanted.sort();
    Ok(unwanted)
}

/// Base-template paths to exclude, relative to the project root.
///
/// The base templates are their own git repository, so their ignore rules
/// are asked of git from inside that directory. If the directory is missing
/// or not a repository, only the fixed exclusions apply.
pub fn base_template_files(
    runner: &dyn CommandRunner,
    project_root: &Path,
    config: &ExportConfig,
) -> Result<Vec<RelativePath>> {
    let base = RelativePath::new(&config.base_templates_dir)?;

    let ignored = git::ignored_paths(runner, &base.under(project_root))?.into_set();
    tracing::debug!("{} path(s) ignored by git in {}", ignored.len(), base);

    let mut unwanted = Vec::new();
    for path in ignored.unwanted() {
        unwanted.push(base.join(path)?);
    }
    for path in &config.extra_base_template_exclusions {
        unwanted.push(base.join(path)?);
    }

    Ok(unwanted)
}
