//! The local staging directory shared by every clone and CK run.
//!
//! Clones and CK outputs live in two separate areas under the staging root, and each repository gets its
//! own `<owner>/<name>` entry inside an area. Entries are handed out as [`ScopedDir`]s, which delete
//! themselves when dropped unless explicitly [kept](ScopedDir::keep).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{trace, warn};
use regex::Regex;

use crate::nested;
use crate::repominer_error::MineError;

lazy_static! {
    static ref UNSAFE_PATH_CHARACTERS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
}

/// Turns one component of a repository identifier (owner or name) into a portable path component.
pub fn sanitize(component: &str) -> String {
    match component {
        "" | "." | ".." => "_".repeat(component.len().max(1)),
        _ => UNSAFE_PATH_CHARACTERS.replace_all(component, "_").into_owned(),
    }
}

/// The staging areas; an entry of one area can never shadow an entry of the other.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StagingKind {
    Clone,
    CkOutput,
}

impl StagingKind {
    fn dir_name(&self) -> &'static str {
        match self {
            StagingKind::Clone => "clones",
            StagingKind::CkOutput => "ck_output",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: &Path) -> Self {
        StagingArea {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<area>/<owner>/<name>`; identifiers without an owner get a single component.
    pub fn entry_path(&self, repository: &str, kind: StagingKind) -> PathBuf {
        let area = self.root.join(kind.dir_name());

        match repository.split_once('/') {
            Some((owner, name)) => area.join(sanitize(owner)).join(sanitize(name)),
            None => area.join(sanitize(repository)),
        }
    }

    /// Reserves the entry of `repository` in the `kind` area, wiping whatever a previous run left there. The
    /// entry itself is not created.
    pub fn reserve(&self, repository: &str, kind: StagingKind) -> Result<ScopedDir, MineError> {
        let path = self.entry_path(repository, kind);
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();

        fs::create_dir_all(&parent).map_err(|e| MineError::IoError {
            msg: format!("Could not create staging directory [{}]", parent.display()),
            nested: nested!(e),
        })?;

        if path.exists() {
            trace!("Removing stale [{}]...", path.display());
            remove_tree(&path).map_err(|e| MineError::IoError {
                msg: format!("Could not remove stale directory [{}]", path.display()),
                nested: nested!(e),
            })?;
        }

        let owner_dir = if repository.contains('/') { Some(parent) } else { None };

        Ok(ScopedDir {
            path,
            owner_dir,
            kept: false,
        })
    }
}

/// A staging entry that is deleted on drop, on every exit path, unless it was kept.
#[derive(Debug)]
pub struct ScopedDir {
    path: PathBuf,
    /// Removed along with the entry when nothing else is left in it.
    owner_dir: Option<PathBuf>,
    kept: bool,
}

impl ScopedDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarms the cleanup and hands back the path.
    pub fn keep(mut self) -> PathBuf {
        self.kept = true;
        self.path.clone()
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if self.kept {
            return;
        }

        if self.path.exists() {
            trace!("Cleaning up [{}]...", self.path.display());
            if let Err(e) = remove_tree(&self.path) {
                warn!("Could not remove [{}]: {}", self.path.display(), e);
            }
        }

        if let Some(owner_dir) = &self.owner_dir {
            // fails while other entries of the same owner are still around
            let _ = fs::remove_dir(owner_dir);
        }
    }
}

/// `remove_dir_all`, retried once after clearing read-only flags (git marks its pack files read-only on
/// some platforms).
pub fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(first_failure) => {
            trace!("First removal of [{}] failed ({}); clearing read-only flags.", path.display(), first_failure);
            make_writable(path)?;
            fs::remove_dir_all(path)
        }
    }
}

fn make_writable(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;

    if metadata.file_type().is_symlink() {
        return Ok(());
    }

    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }

    if metadata.is_dir() {
        for entry in fs::read_dir(path)? {
            make_writable(&entry?.path())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn identifier_components_become_portable_path_components() {
        assert_eq!(sanitize("spring-boot"), "spring-boot");
        assert_eq!(sanitize("a b:c\\d.e"), "a_b_c_d.e");
        assert_eq!(sanitize(".."), "__");
        assert_eq!(sanitize(""), "_");
    }

    #[test]
    fn owners_and_names_stay_apart_in_entry_paths() {
        let staging = StagingArea::new(Path::new("staging"));

        assert_ne!(
            staging.entry_path("a/b_c", StagingKind::Clone),
            staging.entry_path("a_b/c", StagingKind::Clone)
        );
        assert_eq!(
            staging.entry_path("spring-projects/spring-boot", StagingKind::CkOutput),
            Path::new("staging/ck_output/spring-projects/spring-boot")
        );
    }

    #[test]
    fn scoped_directories_are_removed_on_drop_unless_kept() {
        let root = tempdir().unwrap();
        let staging = StagingArea::new(root.path());

        let dropped = staging.reserve("octo/cat", StagingKind::Clone).unwrap();
        fs::create_dir_all(dropped.path().join("src")).unwrap();
        fs::write(dropped.path().join("src/Main.java"), "class Main {}").unwrap();
        let dropped_path = dropped.path().to_path_buf();
        drop(dropped);
        assert!(!dropped_path.exists());
        assert!(!root.path().join("clones/octo").exists());

        let kept = staging.reserve("octo/cat", StagingKind::CkOutput).unwrap();
        fs::create_dir_all(kept.path()).unwrap();
        let kept_path = kept.keep();
        assert!(kept_path.exists());
        assert_eq!(kept_path, root.path().join("ck_output/octo/cat"));
    }

    #[test]
    fn kept_outputs_survive_clones_of_lookalike_repositories() {
        let root = tempdir().unwrap();
        let staging = StagingArea::new(root.path());

        let output = staging.reserve("o/r", StagingKind::CkOutput).unwrap();
        fs::create_dir_all(output.path()).unwrap();
        fs::write(output.path().join("class.csv"), "file,class").unwrap();
        let kept = output.keep();

        for lookalike in ["ck/output_o_r", "ck_output/o", "o/r", "o_r"] {
            let clone = staging.reserve(lookalike, StagingKind::Clone).unwrap();
            fs::create_dir_all(clone.path()).unwrap();
            drop(clone);
        }

        assert!(kept.join("class.csv").exists());
    }

    #[test]
    fn stale_entries_are_wiped_on_reservation() {
        let root = tempdir().unwrap();
        let stale = root.path().join("clones/octo/cat");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("leftover.txt"), "old run").unwrap();

        let reserved = StagingArea::new(root.path()).reserve("octo/cat", StagingKind::Clone).unwrap();

        assert_eq!(reserved.path(), stale.as_path());
        assert!(!stale.exists());
    }

    #[test]
    fn read_only_trees_are_removed() {
        let root = tempdir().unwrap();
        let tree = root.path().join("tree");
        fs::create_dir_all(&tree).unwrap();
        let file = tree.join("pack.idx");
        fs::write(&file, "pack").unwrap();
        let mut permissions = fs::metadata(&file).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&file, permissions).unwrap();

        remove_tree(&tree).unwrap();

        assert!(!tree.exists());
    }
}
