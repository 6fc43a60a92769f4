//! Error types for unitypack-core

use std::path::PathBuf;

/// Result type for packaging operations
pub type Result<T> = std::result::Result<T, PackError>;

/// Errors raised while preparing, exporting or restoring a package
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("Unity does not exist at provided path: {}", .path.display())]
    InvalidExecutable { path: PathBuf },

    #[error("Absolute path given. Only accepts relative paths. Provided path: {}", .path.display())]
    AbsolutePath { path: PathBuf },

    #[error("Cannot stage {} while its parent {} is staged", .path.display(), .ancestor.display())]
    InsideStaged { path: PathBuf, ancestor: PathBuf },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command {command} from directory {} could not be started: {source}", .cwd.display())]
    CommandSpawn {
        command: String,
        cwd: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command {command} from directory {} failed with {}: {stderr}", .cwd.display(), exit_label(.code))]
    CommandFailed {
        command: String,
        cwd: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to restore {} staged path(s): {}", .failed.len(), join_paths(.failed))]
    RestoreIncomplete { failed: Vec<PathBuf> },

    #[error("Failed to parse staging journal at {}: {source}", .path.display())]
    Journal {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse config at {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PackError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
