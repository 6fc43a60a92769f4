//! Package export
//!
//! Moves unwanted files aside, has Unity build the package, and moves the
//! files back. Restoration runs whatever Unity does; a Unity failure is
//! reported only after the project tree is whole again.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PackError, Result};
use crate::policy::find_unwanted_files;
use crate::process::{run_checked, CommandRunner, CommandSpec};
use crate::staging::StagingArea;
use crate::types::ExportConfig;

/// Configuration for one export run
#[derive(Debug, Clone)]
pub struct PackageExportConfig {
    /// Full path to the Unity editor executable
    pub unity_path: PathBuf,
    /// Root of the Unity project being packaged
    pub project_root: PathBuf,
    /// Project layout and export settings
    pub export: ExportConfig,
}

impl PackageExportConfig {
    /// Check the Unity executable exists. Runs before anything on disk changes.
    pub fn validate(&self) -> Result<()> {
        if !self.unity_path.is_file() {
            return Err(PackError::InvalidExecutable {
                path: self.unity_path.clone(),
            });
        }
        Ok(())
    }

    /// The Unity batch-mode command that builds the package
    pub fn unity_command(&self) -> CommandSpec {
        CommandSpec::new(&self.unity_path, &self.project_root)
            .args(["-batchmode", "-nographics", "-quit", "-projectPath", "."])
            .arg("-executeMethod")
            .arg(&self.export.export_method)
            .arg(&self.export.output_path)
    }
}

/// Statistics from an export run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Paths the policy named (duplicates included)
    pub unwanted_found: usize,
    /// Paths actually moved aside
    pub files_staged: usize,
    /// Paths moved back after being left behind by an earlier run
    pub stale_recovered: usize,
}

/// Steps of an export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Start,
    PolicyEvaluated,
    Staged,
    ExportInvoked,
    Restored,
    Done,
    Failed,
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportPhase::Start => "start",
            ExportPhase::PolicyEvaluated => "policy evaluated",
            ExportPhase::Staged => "staged",
            ExportPhase::ExportInvoked => "export invoked",
            ExportPhase::Restored => "restored",
            ExportPhase::Done => "done",
            ExportPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Export the project as a Unity package
pub fn export_package(
    config: &PackageExportConfig,
    runner: &dyn CommandRunner,
) -> Result<ExportStats> {
    let mut phase = ExportPhase::Start;
    let result = run_export(config, runner, &mut phase);
    if result.is_err() {
        tracing::debug!("Export failed during phase: {}", phase);
        advance(&mut phase, ExportPhase::Failed);
    }
    result
}

fn run_export(
    config: &PackageExportConfig,
    runner: &dyn CommandRunner,
    phase: &mut ExportPhase,
) -> Result<ExportStats> {
    config.validate()?;
    let root = config.project_root.as_path();

    // Files stranded by an earlier run go back first so the policy sees them.
    let mut staging = StagingArea::new(root, &config.export.temp_dir);
    let mut stats = ExportStats {
        stale_recovered: staging.recover_stale()?,
        ..Default::default()
    };
    staging.clear()?;

    let unwanted = find_unwanted_files(runner, root, &config.export)?;
    stats.unwanted_found = unwanted.len();
    advance(phase, ExportPhase::PolicyEvaluated);

    // A staging error drops `staging`, which moves back what was already staged.
    for path in unwanted.into_paths() {
        if staging.stage(&path)? {
            stats.files_staged += 1;
        }
    }
    tracing::info!(
        "Moved {} unwanted path(s) to {}",
        stats.files_staged,
        display_relative(root, staging.temp_dir())
    );
    advance(phase, ExportPhase::Staged);

    tracing::info!("Creating \"{}\"", config.export.output_path.display());
    tracing::info!("The following command may take several minutes to complete:");
    let exported = run_checked(runner, &config.unity_command(), true);
    advance(phase, ExportPhase::ExportInvoked);

    let restored = staging.restore_all();

    match (exported, restored) {
        (Ok(_), Ok(())) => {
            advance(phase, ExportPhase::Restored);
            tracing::info!("Restored {} unwanted path(s)", stats.files_staged);
            advance(phase, ExportPhase::Done);
            Ok(stats)
        }
        (Err(export_err), Ok(())) => {
            advance(phase, ExportPhase::Restored);
            Err(export_err)
        }
        (Err(export_err), Err(restore_err)) => {
            tracing::error!("{}", restore_err);
            Err(export_err)
        }
        (Ok(_), Err(restore_err)) => Err(restore_err),
    }
}

fn advance(phase: &mut ExportPhase, next: ExportPhase) {
    tracing::debug!("Export phase: {} -> {}", phase, next);
    *phase = next;
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
