//! Unitypack CLI
//!
//! Exports the AWS GameKit Unity plugin as a package tarball that can be
//! imported through the Unity Package Manager.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use unitypack_core::{export_package, ExportConfig, PackageExportConfig, SystemRunner};

const EXAMPLE_USAGE: &str = "Example Usage:
(Windows) unitypack \"C:\\Program Files\\Unity\\Hub\\Editor\\2020.3.24f1\\Editor\\Unity.exe\"
(Mac)     unitypack /Applications/Unity/Hub/Editor/2020.3.24f1/Unity.app/Contents/MacOS/Unity";

#[derive(Parser, Debug)]
#[command(name = "unitypack")]
#[command(
    about = "Export AWS GameKit to a tarball which can be imported to a Unity project through the Package Manager. May take several minutes."
)]
#[command(after_help = EXAMPLE_USAGE)]
#[command(version)]
struct Cli {
    /// Full path to the Unity application installed on this computer. See 'Example Usage' below for details.
    unity_application_full_path: PathBuf,

    /// Only output error messages. Info messages will not be written.
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let project_root = std::env::current_dir().context("Failed to determine current directory")?;
    let mut config = PackageExportConfig {
        unity_path: cli.unity_application_full_path,
        project_root,
        export: ExportConfig::default(),
    };

    // Fail before touching the project if Unity is not where we were told.
    config.validate()?;
    config.export =
        ExportConfig::load(&config.project_root).context("Failed to load export configuration")?;

    let stats = export_package(&config, &SystemRunner).context("Failed to export package")?;

    tracing::info!(
        "Package exported ({} path(s) excluded{})",
        stats.files_staged,
        if stats.stale_recovered > 0 {
            format!(", {} recovered from a previous run", stats.stale_recovered)
        } else {
            String::new()
        }
    );

    Ok(())
}

/// Errors only with `--quiet`; otherwise info, unless RUST_LOG says otherwise.
fn init_logging(quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}
