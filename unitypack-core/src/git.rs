//! Git integration module
//!
//! Asks git which paths it ignores below a directory. The directory may be
//! an embedded repository (the base templates are a submodule), so the query
//! always runs with that directory as its working directory.

use std::path::Path;

use crate::error::{PackError, Result};
use crate::path_utils::{normalize_path, RelativePath};
use crate::process::{log_failure, log_running, CommandRunner, CommandSpec};
use crate::types::{IgnoreQuery, IgnoreSet};

/// Prefix git puts before every path in `git clean -n` output
const WOULD_REMOVE: &str = "Would remove ";

/// Query the ignore status of everything below `dir`.
///
/// Runs `git clean -ndX` (`-n` dry run, `-d` include directories, `-X` only
/// ignored paths). Returned paths are relative to `dir`. A missing directory
/// or one outside any repository yields [`IgnoreQuery::NotARepository`];
/// every other git failure is an error.
pub fn ignored_paths(runner: &dyn CommandRunner, dir: &Path) -> Result<IgnoreQuery> {
    if !dir.is_dir() {
        tracing::debug!("{} does not exist, nothing is ignored", dir.display());
        return Ok(IgnoreQuery::NotARepository);
    }

    let cmd = CommandSpec::new("git", dir).args(["clean", "-ndX"]);
    log_running(&cmd);

    let output = runner.run(&cmd).inspect_err(|_| log_failure(&cmd))?;

    if !output.success() {
        if is_not_a_repository(&output.stderr) {
            tracing::debug!("{} is not a git repository", dir.display());
            return Ok(IgnoreQuery::NotARepository);
        }
        log_failure(&cmd);
        return Err(PackError::CommandFailed {
            command: cmd.to_string(),
            cwd: dir.to_path_buf(),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    parse_clean_output(&output.stdout).map(IgnoreQuery::Ignored)
}

/// Parse `git clean -n` output into an ignore set.
///
/// ```text
/// Would remove .idea/
/// Would remove cloudformation.meta
/// ```
pub fn parse_clean_output(stdout: &str) -> Result<IgnoreSet> {
    let mut set = IgnoreSet::new();

    for line in stdout.lines() {
        let line = line.trim_end_matches('\r');
        let Some(raw) = line.strip_prefix(WOULD_REMOVE) else {
            continue;
        };
        let normalized = normalize_path(raw);
        let trimmed = normalized.trim_end_matches('/');

        if trimmed.is_empty() || trimmed == "." {
            continue;
        }

        set.insert(RelativePath::new(trimmed)?);
    }

    Ok(set)
}

fn is_not_a_repository(stderr: &str) -> bool {
    stderr.to_ascii_lowercase().contains("not a git repository")
}
