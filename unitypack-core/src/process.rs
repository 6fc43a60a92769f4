//! External process execution
//!
//! Every external program (Unity, git) is described by a [`CommandSpec`] and
//! run through a [`CommandRunner`]. Commands carry their own working
//! directory, so nothing here ever changes the process-wide current directory.
//! Tests substitute a scripted runner for [`SystemRunner`].

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{PackError, Result};

/// Specification for a command to execute.
///
/// Arguments are discrete elements passed straight to the program, never
/// joined into a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(&self.cwd);
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, ", {:?}", arg.to_string_lossy())?;
        }
        write!(f, "]")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }
}

/// Runs external commands to completion.
///
/// Implementations return `Ok` for any process that ran, whatever its exit
/// code; `Err` means the process could not be started.
pub trait CommandRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<ProcessOutput>;
}

/// Runs commands as real child processes and waits for them
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<ProcessOutput> {
        let output = cmd
            .to_command()
            .output()
            .map_err(|source| PackError::CommandSpawn {
                command: cmd.to_string(),
                cwd: cmd.cwd.clone(),
                source,
            })?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

/// Run a command, log it, and fail on a non-zero exit.
///
/// With `log_output` set, each stdout line is echoed at info level.
pub fn run_checked(
    runner: &dyn CommandRunner,
    cmd: &CommandSpec,
    log_output: bool,
) -> Result<ProcessOutput> {
    log_running(cmd);

    let output = runner.run(cmd).inspect_err(|_| log_failure(cmd))?;

    if !output.success() {
        log_failure(cmd);
        return Err(PackError::CommandFailed {
            command: cmd.to_string(),
            cwd: cmd.cwd.clone(),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    if log_output {
        for line in output.stdout_lines() {
            tracing::info!("{}", line);
        }
    }

    Ok(output)
}

pub(crate) fn log_running(cmd: &CommandSpec) {
    tracing::info!(
        "Running command: {} from directory: {}",
        cmd,
        display_dir(&cmd.cwd)
    );
}

pub(crate) fn log_failure(cmd: &CommandSpec) {
    tracing::error!(
        "Command: {} from directory: {} failed.",
        cmd,
        display_dir(&cmd.cwd)
    );
}

fn display_dir(dir: &Path) -> String {
    dir.canonicalize()
        .unwrap_or_else(|_| dir.to_path_buf())
        .display()
        .to_string()
}
