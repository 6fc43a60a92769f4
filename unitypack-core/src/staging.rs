//! Staging area
//!
//! Moves files out of the project tree into a temporary directory so the
//! Unity exporter cannot see them, and moves them back afterwards. Files are
//! renamed, never copied: large assets are not duplicated, and at any moment
//! every staged file exists in exactly one place.
//!
//! Each move is recorded in a [`StagingJournal`] that is written next to the
//! temporary directory after every change. A run that dies between staging
//! and restoring leaves the journal behind, and the next run uses it to put
//! the stranded files back ([`StagingArea::recover_stale`]).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};
use crate::path_utils::{pathbuf_with_suffix, RelativePath};

const JOURNAL_SUFFIX: &str = ".journal.json";

/// One staged path: where it came from and where it is now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingEntry {
    /// Location relative to the project root
    pub original: RelativePath,
    /// Current location inside the temporary directory
    pub staged: PathBuf,
}

/// Record of every path currently staged, at most one entry per original
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingJournal {
    entries: Vec<StagingEntry>,
}

impl StagingJournal {
    pub fn entries(&self) -> &[StagingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, original: &RelativePath) -> bool {
        self.entries.iter().any(|e| &e.original == original)
    }

    /// Append an entry, replacing any earlier entry for the same original
    fn record(&mut self, entry: StagingEntry) {
        self.entries.retain(|e| e.original != entry.original);
        self.entries.push(entry);
    }

    /// The staged entry that strictly contains `path`, if any
    pub fn staged_ancestor(&self, path: &RelativePath) -> Option<&RelativePath> {
        self.entries
            .iter()
            .map(|e| &e.original)
            .find(|o| *o != path && path.as_path().starts_with(o.as_path()))
    }

    fn forget(&mut self, original: &RelativePath) {
        self.entries.retain(|e| &e.original != original);
    }

    /// Remove and return the entries staged strictly below `ancestor`
    fn take_nested(&mut self, ancestor: &RelativePath) -> Vec<StagingEntry> {
        let (nested, kept) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| {
                e.original != *ancestor && e.original.as_path().starts_with(ancestor.as_path())
            });
        self.entries = kept;
        nested
    }

    fn drain(&mut self) -> Vec<StagingEntry> {
        std::mem::take(&mut self.entries)
    }

    fn load(path: &Path) -> Result<Option<Self>> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PackError::io(path, e)),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| PackError::Journal {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Write to `path` via a temporary file and rename
    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| PackError::io(path, e.into()))?;
        let tmp = pathbuf_with_suffix(path, ".tmp");
        fs::write(&tmp, json).map_err(|e| PackError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| PackError::io(path, e))
    }
}

/// Temporary home for files that must stay out of the package.
///
/// Dropping a staging area that still holds files moves them back, so an
/// early return between [`stage`](Self::stage) and
/// [`restore_all`](Self::restore_all) does not strand anything.
#[derive(Debug)]
pub struct StagingArea {
    project_root: PathBuf,
    temp_dir: PathBuf,
    journal_path: PathBuf,
    journal: StagingJournal,
}

impl StagingArea {
    /// Create a staging area for `project_root`. A relative `temp_dir` is
    /// resolved against the project root. Nothing is touched on disk.
    pub fn new(project_root: impl Into<PathBuf>, temp_dir: impl AsRef<Path>) -> Self {
        let project_root = project_root.into();
        let temp_dir = project_root.join(temp_dir);
        let journal_path = pathbuf_with_suffix(&temp_dir, JOURNAL_SUFFIX);
        Self {
            project_root,
            temp_dir,
            journal_path,
            journal: StagingJournal::default(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    pub fn journal(&self) -> &StagingJournal {
        &self.journal
    }

    /// Delete the temporary directory and journal and forget every entry.
    /// Safe to call at any time, including when nothing was staged.
    pub fn clear(&mut self) -> Result<()> {
        if self.temp_dir.is_dir() {
            fs::remove_dir_all(&self.temp_dir).map_err(|e| PackError::io(&self.temp_dir, e))?;
        }
        remove_if_exists(&self.journal_path)?;
        self.journal = StagingJournal::default();
        Ok(())
    }

    /// Move `path` (relative to the project root) into the temporary directory.
    ///
    /// Returns `Ok(false)` without doing anything if the path does not exist.
    /// Absolute paths, and paths inside a directory that is already staged,
    /// are rejected before anything is touched.
    pub fn stage(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let original = RelativePath::new(path.as_ref())?;
        let source = original.under(&self.project_root);

        match fs::symlink_metadata(&source) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Skipping {}, it does not exist", original);
                return Ok(false);
            }
            Err(e) => return Err(PackError::io(&source, e)),
        }

        // Its destination would land inside the ancestor's staged copy.
        if let Some(ancestor) = self.journal.staged_ancestor(&original) {
            return Err(PackError::InsideStaged {
                path: original.into(),
                ancestor: ancestor.clone().into(),
            });
        }

        let destination = original.under(&self.temp_dir);

        // Paths staged earlier from inside this one go back first so they
        // travel with their parent. A path staged before and recreated since
        // replaces its older copy.
        if !self.journal.contains(&original) {
            self.unstage_nested(&original)?;
        }
        remove_any(&destination)?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;
        }

        // Journal first: a crash before the rename leaves an entry whose
        // staged copy is missing, which recovery skips.
        self.journal.record(StagingEntry {
            original: original.clone(),
            staged: destination.clone(),
        });
        self.journal.save(&self.journal_path)?;

        if let Err(e) = fs::rename(&source, &destination) {
            self.journal.forget(&original);
            self.journal.save(&self.journal_path)?;
            return Err(PackError::io(&source, e));
        }
        tracing::debug!("Staged {} -> {}", original, destination.display());

        Ok(true)
    }

    /// Move every staged path back to where it came from, then clear.
    ///
    /// Every entry is attempted even after a failure. If anything could not
    /// be moved back, the failed entries stay in the temporary directory and
    /// journal and [`PackError::RestoreIncomplete`] lists them.
    pub fn restore_all(&mut self) -> Result<()> {
        let mut failed = Vec::new();

        for entry in self.journal.drain() {
            let target = entry.original.under(&self.project_root);
            match fs::rename(&entry.staged, &target) {
                Ok(()) => tracing::debug!("Restored {}", entry.original),
                Err(e) => {
                    tracing::error!("Failed to restore {}: {}", entry.original, e);
                    failed.push(entry);
                }
            }
        }

        if failed.is_empty() {
            return self.clear();
        }

        let paths: Vec<PathBuf> = failed.iter().map(|e| e.original.clone().into()).collect();
        for entry in failed {
            self.journal.record(entry);
        }
        self.journal.save(&self.journal_path)?;

        Err(PackError::RestoreIncomplete { failed: paths })
    }

    /// Move back files stranded by an earlier run that never restored them.
    ///
    /// Reads the journal left on disk. Entries whose original location is
    /// occupied again are not touched; if any remain, the journal is
    /// rewritten with just those and [`PackError::RestoreIncomplete`] is
    /// returned so nothing gets cleared. Returns the number of paths moved back.
    pub fn recover_stale(&mut self) -> Result<usize> {
        let Some(mut stale) = StagingJournal::load(&self.journal_path)? else {
            return Ok(0);
        };

        tracing::info!(
            "Found {} path(s) left staged by a previous run, restoring them",
            stale.len()
        );

        let mut recovered = 0;
        let mut blocked = Vec::new();

        for entry in stale.drain() {
            let target = entry.original.under(&self.project_root);
            if fs::symlink_metadata(&entry.staged).is_err() {
                tracing::warn!("Staged copy of {} is gone, skipping", entry.original);
                continue;
            }
            if fs::symlink_metadata(&target).is_ok() {
                tracing::warn!(
                    "{} exists again, leaving the staged copy at {}",
                    entry.original,
                    entry.staged.display()
                );
                blocked.push(entry);
                continue;
            }
            match fs::rename(&entry.staged, &target) {
                Ok(()) => recovered += 1,
                Err(e) => {
                    tracing::error!("Failed to restore {}: {}", entry.original, e);
                    blocked.push(entry);
                }
            }
        }

        if blocked.is_empty() {
            remove_if_exists(&self.journal_path)?;
            return Ok(recovered);
        }

        let paths: Vec<PathBuf> = blocked.iter().map(|e| e.original.clone().into()).collect();
        for entry in blocked {
            stale.record(entry);
        }
        stale.save(&self.journal_path)?;

        Err(PackError::RestoreIncomplete { failed: paths })
    }

    /// Move back entries staged below `ancestor`. An entry leaves the journal
    /// only once its rename succeeded; on failure the failed and untried
    /// entries are put back and saved.
    fn unstage_nested(&mut self, ancestor: &RelativePath) -> Result<()> {
        let mut nested = self.journal.take_nested(ancestor).into_iter();
        while let Some(entry) = nested.next() {
            let target = entry.original.under(&self.project_root);
            if let Err(e) = fs::rename(&entry.staged, &target) {
                tracing::error!("Failed to move {} back: {}", entry.original, e);
                self.journal.record(entry);
                for rest in nested {
                    self.journal.record(rest);
                }
                self.journal.save(&self.journal_path)?;
                return Err(PackError::io(&target, e));
            }
            tracing::debug!("Restored nested {}", entry.original);
        }
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.journal.is_empty() {
            return;
        }
        tracing::warn!(
            "Staging area dropped with {} path(s) still staged, restoring",
            self.journal.len()
        );
        if let Err(e) = self.restore_all() {
            tracing::error!("{}", e);
        }
    }
}

fn remove_any(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(|e| PackError::io(path, e)),
        Ok(_) => fs::remove_file(path).map_err(|e| PackError::io(path, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PackError::io(path, e)),
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(PackError::io(path, e)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const TEMP: &str = "TempExportUnityPackage";

    /// Every file below `root` (skipping the staging dir) with its contents
    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                if rel.starts_with(TEMP) {
                    continue;
                }
                if path.is_dir() {
                    out.insert(rel, Vec::new());
                    walk(root, &path, out);
                } else {
                    out.insert(rel, fs::read(&path).unwrap());
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(root, root, &mut out);
        out
    }

    fn project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Editor/WindowState")).unwrap();
        fs::create_dir_all(root.join("Templates/Config/nested")).unwrap();
        fs::write(root.join("Editor/WindowState/state1.json"), "{\"open\":true}").unwrap();
        fs::write(root.join("Editor/WindowState/README.md"), "keep").unwrap();
        fs::write(root.join("Templates/Config/nested/a.yml"), "a: 1").unwrap();
        fs::write(root.join("Templates/Config.meta"), "guid: 1").unwrap();
        fs::write(root.join("Templates/big.bin"), vec![7u8; 64 * 1024]).unwrap();
        temp_dir
    }

    #[test]
    fn test_stage_and_restore_round_trip() {
        let temp_dir = project();
        let root = temp_dir.path();
        let before = snapshot(root);

        let mut staging = StagingArea::new(root, TEMP);
        staging.clear().unwrap();
        for path in [
            "Editor/WindowState/state1.json",
            "Templates/Config",
            "Templates/Config.meta",
            "Templates/big.bin",
        ] {
            assert!(staging.stage(path).unwrap());
        }

        assert!(!root.join("Templates/Config").exists());
        assert!(root.join(TEMP).join("Templates/Config/nested/a.yml").exists());
        assert!(staging.journal_path().exists());
        assert_eq!(staging.journal().len(), 4);

        staging.restore_all().unwrap();

        assert_eq!(snapshot(root), before);
        assert!(!root.join(TEMP).exists());
        assert!(!staging.journal_path().exists());
        assert!(staging.journal().is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut staging = StagingArea::new(temp_dir.path(), TEMP);

        staging.clear().unwrap();
        staging.clear().unwrap();
        assert!(!temp_dir.path().join(TEMP).exists());
    }

    #[test]
    fn test_clear_discards_stale_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join(TEMP).join("old")).unwrap();

        let mut staging = StagingArea::new(temp_dir.path(), TEMP);
        staging.clear().unwrap();
        assert!(!temp_dir.path().join(TEMP).exists());
    }

    #[test]
    fn test_stage_rejects_absolute_path() {
        let temp_dir = project();
        let root = temp_dir.path();
        let before = snapshot(root);

        let mut staging = StagingArea::new(root, TEMP);
        let absolute = root.join("Templates/big.bin");
        let err = staging.stage(&absolute).unwrap_err();

        assert!(matches!(err, PackError::AbsolutePath { .. }));
        assert!(staging.journal().is_empty());
        assert_eq!(snapshot(root), before);
        assert!(!root.join(TEMP).exists());
    }

    #[test]
    fn test_stage_missing_path_is_noop() {
        let temp_dir = project();
        let mut staging = StagingArea::new(temp_dir.path(), TEMP);

        assert!(!staging.stage("Templates/not-here.txt").unwrap());
        assert!(staging.journal().is_empty());
        assert!(!staging.journal_path().exists());
    }

    #[test]
    fn test_restore_is_order_independent() {
        let temp_dir = project();
        let root = temp_dir.path();
        let before = snapshot(root);

        // Child first, then its parent: the child rides along with the parent.
        let mut staging = StagingArea::new(root, TEMP);
        assert!(staging.stage("Templates/Config/nested/a.yml").unwrap());
        assert!(staging.stage("Templates/Config").unwrap());
        assert_eq!(staging.journal().len(), 1);
        assert!(root.join(TEMP).join("Templates/Config/nested/a.yml").exists());

        staging.restore_all().unwrap();
        assert_eq!(snapshot(root), before);
    }

    #[test]
    fn test_restaging_same_path_keeps_latest() {
        let temp_dir = project();
        let root = temp_dir.path();
        let mut staging = StagingArea::new(root, TEMP);

        assert!(staging.stage("Templates/Config.meta").unwrap());
        fs::write(root.join("Templates/Config.meta"), "guid: 2").unwrap();
        assert!(staging.stage("Templates/Config.meta").unwrap());
        assert_eq!(staging.journal().len(), 1);

        staging.restore_all().unwrap();
        assert_eq!(fs::read_to_string(root.join("Templates/Config.meta")).unwrap(), "guid: 2");
    }

    #[test]
    fn test_restore_failure_keeps_staged_files() {
        let temp_dir = project();
        let root = temp_dir.path();
        let mut staging = StagingArea::new(root, TEMP);

        assert!(staging.stage("Templates/Config/nested/a.yml").unwrap());
        assert!(staging.stage("Templates/big.bin").unwrap());
        fs::remove_dir_all(root.join("Templates/Config")).unwrap();

        let err = staging.restore_all().unwrap_err();
        match err {
            PackError::RestoreIncomplete { failed } => {
                assert_eq!(failed, vec![PathBuf::from("Templates/Config/nested/a.yml")]);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(root.join("Templates/big.bin").exists());
        assert!(root.join(TEMP).join("Templates/Config/nested/a.yml").exists());
        assert_eq!(staging.journal().len(), 1);

        // Recreate the parent and the retry succeeds.
        fs::create_dir_all(root.join("Templates/Config/nested")).unwrap();
        staging.restore_all().unwrap();
        assert!(root.join("Templates/Config/nested/a.yml").exists());
    }

    #[test]
    fn test_failed_nested_unstage_keeps_staged_copy() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("A")).unwrap();
        fs::write(root.join("A/b"), "original").unwrap();
        fs::write(root.join("Z"), "z").unwrap();

        {
            let mut staging = StagingArea::new(root, TEMP);
            assert!(staging.stage("Z").unwrap());
            assert!(staging.stage("A/b").unwrap());

            // A/b comes back as a non-empty directory, so it cannot be moved back.
            fs::create_dir_all(root.join("A/b/inner")).unwrap();
            let err = staging.stage("A").unwrap_err();
            assert!(matches!(err, PackError::Io { .. }));

            let b = RelativePath::new("A/b").unwrap();
            assert!(staging.journal().contains(&b));
            assert_eq!(staging.journal().len(), 2);
            let on_disk = StagingJournal::load(staging.journal_path()).unwrap().unwrap();
            assert!(on_disk.contains(&b));
        }

        // Drop restored Z but could not restore A/b, so its copy is kept.
        assert_eq!(fs::read_to_string(root.join("Z")).unwrap(), "z");
        assert_eq!(
            fs::read_to_string(root.join(TEMP).join("A/b")).unwrap(),
            "original"
        );
        assert!(root.join(format!("{TEMP}{JOURNAL_SUFFIX}")).exists());
    }

    #[test]
    fn test_stage_inside_staged_directory_is_rejected() {
        let temp_dir = project();
        let root = temp_dir.path();
        let mut staging = StagingArea::new(root, TEMP);

        assert!(staging.stage("Templates/Config").unwrap());
        fs::create_dir_all(root.join("Templates/Config/nested")).unwrap();
        fs::write(root.join("Templates/Config/nested/a.yml"), "NEW").unwrap();

        let err = staging.stage("Templates/Config/nested/a.yml").unwrap_err();
        assert!(matches!(err, PackError::InsideStaged { .. }));
        assert_eq!(staging.journal().len(), 1);
        assert_eq!(
            fs::read_to_string(root.join(TEMP).join("Templates/Config/nested/a.yml")).unwrap(),
            "a: 1"
        );

        // Once the recreated directory is gone the staged copy comes back intact.
        fs::remove_dir_all(root.join("Templates/Config")).unwrap();
        staging.restore_all().unwrap();
        assert_eq!(
            fs::read_to_string(root.join("Templates/Config/nested/a.yml")).unwrap(),
            "a: 1"
        );
    }

    #[test]
    fn test_journal_is_written_before_the_move() {
        let temp_dir = project();
        let root = temp_dir.path();
        let mut staging = StagingArea::new(root, TEMP);

        staging.stage("Templates/big.bin").unwrap();
        let on_disk = StagingJournal::load(staging.journal_path()).unwrap().unwrap();
        assert!(on_disk.contains(&RelativePath::new("Templates/big.bin").unwrap()));

        // Crash after the journal write but before the rename: the file never
        // left the project.
        fs::rename(root.join(TEMP).join("Templates/big.bin"), root.join("Templates/big.bin"))
            .unwrap();
        std::mem::forget(staging);

        let mut staging = StagingArea::new(root, TEMP);
        assert_eq!(staging.recover_stale().unwrap(), 0);
        staging.clear().unwrap();
        assert_eq!(fs::read(root.join("Templates/big.bin")).unwrap(), vec![7u8; 64 * 1024]);
        assert!(!staging.journal_path().exists());
    }

    #[test]
    fn test_drop_restores_staged_files() {
        let temp_dir = project();
        let root = temp_dir.path();
        let before = snapshot(root);

        {
            let mut staging = StagingArea::new(root, TEMP);
            staging.stage("Templates/big.bin").unwrap();
            staging.stage("Editor/WindowState/state1.json").unwrap();
        }

        assert_eq!(snapshot(root), before);
        assert!(!root.join(TEMP).exists());
    }

    #[test]
    fn test_recover_stale_journal() {
        let temp_dir = project();
        let root = temp_dir.path();
        let before = snapshot(root);

        let mut crashed = StagingArea::new(root, TEMP);
        crashed.stage("Templates/Config").unwrap();
        crashed.stage("Templates/big.bin").unwrap();
        // Simulate a crash: the journal is left behind and nothing is restored.
        std::mem::forget(crashed);

        let mut staging = StagingArea::new(root, TEMP);
        assert_eq!(staging.recover_stale().unwrap(), 2);
        staging.clear().unwrap();

        assert_eq!(snapshot(root), before);
        assert!(!staging.journal_path().exists());
    }

    #[test]
    fn test_recover_stale_refuses_to_overwrite() {
        let temp_dir = project();
        let root = temp_dir.path();

        let mut crashed = StagingArea::new(root, TEMP);
        crashed.stage("Templates/Config.meta").unwrap();
        std::mem::forget(crashed);
        fs::write(root.join("Templates/Config.meta"), "guid: new").unwrap();

        let mut staging = StagingArea::new(root, TEMP);
        let err = staging.recover_stale().unwrap_err();

        assert!(matches!(err, PackError::RestoreIncomplete { .. }));
        assert!(staging.journal_path().exists());
        assert_eq!(
            fs::read_to_string(root.join(TEMP).join("Templates/Config.meta")).unwrap(),
            "guid: 1"
        );
    }

    #[test]
    fn test_recover_without_journal() {
        let temp_dir = TempDir::new().unwrap();
        let mut staging = StagingArea::new(temp_dir.path(), TEMP);
        assert_eq!(staging.recover_stale().unwrap(), 0);
    }
}
