//! Version-control ignore status

use std::collections::BTreeSet;

use crate::path_utils::{RelativePath, META_SUFFIX};

/// Paths a version-control system currently ignores, split into `.meta`
/// sidecars and everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    data: BTreeSet<RelativePath>,
    meta: BTreeSet<RelativePath>,
}

impl IgnoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: RelativePath) {
        if path.is_meta() {
            self.meta.insert(path);
        } else {
            self.data.insert(path);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.meta.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len() + self.meta.len()
    }

    pub fn contains(&self, path: &RelativePath) -> bool {
        self.data.contains(path) || self.meta.contains(path)
    }

    /// Ignored paths that are safe to leave out of a package.
    ///
    /// Every ignored data path is unwanted. A `.meta` file is unwanted only
    /// when the asset it describes is ignored too; a `.meta` next to a tracked
    /// asset carries its import settings and must ship with it.
    pub fn unwanted(&self) -> Vec<RelativePath> {
        let meta = self.meta.iter().filter(|meta| {
            meta.strip_suffix(META_SUFFIX)
                .is_some_and(|asset| self.data.contains(&asset))
        });

        meta.chain(self.data.iter()).cloned().collect()
    }
}

impl FromIterator<RelativePath> for IgnoreSet {
    fn from_iter<I: IntoIterator<Item = RelativePath>>(iter: I) -> Self {
        let mut set = Self::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

/// Outcome of asking version control which paths it ignores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreQuery {
    Ignored(IgnoreSet),
    /// The queried directory is not inside a repository (or does not exist)
    NotARepository,
}

impl IgnoreQuery {
    /// Treat "no repository" as "nothing ignored"
    pub fn into_set(self) -> IgnoreSet {
        match self {
            IgnoreQuery::Ignored(set) => set,
            IgnoreQuery::NotARepository => IgnoreSet::new(),
        }
    }
}
