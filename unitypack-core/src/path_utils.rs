//! Cross-platform path utilities
//!
//! Windows paths use backslashes (`\`) while exclusion rules and log output use
//! forward slashes (`/`). These utilities keep comparisons consistent across
//! platforms and provide [`RelativePath`], the only path type the staging area
//! accepts.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};

/// Suffix Unity uses for the import-settings sibling of every asset
pub const META_SUFFIX: &str = ".meta";

/// Normalize path to forward slashes
#[inline]
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Convert a path to a normalized string
#[inline]
pub fn path_to_string(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

/// Append suffix to path, return normalized string
#[inline]
pub fn path_with_suffix(path: &Path, suffix: &str) -> String {
    format!("{}{}", path_to_string(path), suffix)
}

/// Create PathBuf from path + suffix
#[inline]
pub fn pathbuf_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(path_with_suffix(path, suffix))
}

/// Whether `path` starts with `prefix` as plain text, after normalization.
///
/// This is a glob-style `<prefix>*` match, so `README.md` also matches
/// `README.md.meta`.
pub fn has_text_prefix(path: &Path, prefix: &Path) -> bool {
    path_to_string(path).starts_with(&path_to_string(prefix))
}

/// A path relative to the project root.
///
/// Construction fails for absolute paths, so anything holding a
/// `RelativePath` can join it onto a root without escaping it through an
/// absolute component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct RelativePath(PathBuf);

impl RelativePath {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if is_absolute_anywhere(&path) {
            return Err(PackError::AbsolutePath { path });
        }
        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Join a relative child onto this path
    pub fn join(&self, child: impl AsRef<Path>) -> Result<Self> {
        Self::new(self.0.join(child))
    }

    /// The path with `suffix` appended to its final component
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(pathbuf_with_suffix(&self.0, suffix))
    }

    /// The path with `suffix` removed from its end, if present
    pub fn strip_suffix(&self, suffix: &str) -> Option<Self> {
        path_to_string(&self.0)
            .strip_suffix(suffix)
            .filter(|rest| !rest.is_empty())
            .map(|rest| Self(PathBuf::from(rest)))
    }

    /// Whether the final component ends with `.meta`
    pub fn is_meta(&self) -> bool {
        path_to_string(&self.0).ends_with(META_SUFFIX)
    }

    /// Resolve against a root directory
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&path_to_string(&self.0))
    }
}

impl AsRef<Path> for RelativePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl TryFrom<PathBuf> for RelativePath {
    type Error = PackError;

    fn try_from(path: PathBuf) -> Result<Self> {
        Self::new(path)
    }
}

impl From<RelativePath> for PathBuf {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}

// `Path::is_absolute` is false for `/foo` on Windows, but joining such a path
// still replaces the root, so treat any root or prefix component as absolute.
fn is_absolute_anywhere(path: &Path) -> bool {
    path.is_absolute()
        || matches!(
            path.components().next(),
            Some(Component::RootDir) | Some(Component::Prefix(_))
        )
}
