//! Change detection for determining which packages were modified.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{DiffOptions, Repository};
use tracing::debug;

use crate::error::{Error, Result};
use crate::package::Package;

/// Reports the files modified since a version-control reference.
///
/// Relative paths are interpreted against the workspace root.
pub trait ChangeSource: Send + Sync {
    fn changed_files(&self, since: &str) -> Result<Vec<PathBuf>>;
}

/// Change source backed by the git repository containing the workspace.
///
/// Reports the union of files committed since the merge base of `since`
/// and `HEAD`, staged changes, unstaged changes and untracked files.
#[derive(Debug, Clone)]
pub struct GitChangeSource {
    root: PathBuf,
}

impl GitChangeSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ChangeSource for GitChangeSource {
    fn changed_files(&self, since: &str) -> Result<Vec<PathBuf>> {
        let repo = Repository::discover(&self.root)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| Error::Git("repository has no working directory".to_string()))?;
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());

        let since_commit = repo
            .revparse_single(since)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|e| Error::Git(format!("cannot resolve '{}': {}", since, e.message())))?;

        let base = match repo.head().and_then(|head| head.peel_to_commit()) {
            Ok(head) => match repo.merge_base(since_commit.id(), head.id()) {
                Ok(oid) => repo.find_commit(oid)?,
                Err(_) => since_commit,
            },
            Err(_) => since_commit,
        };
        debug!(since, base = %base.id(), "diffing against merge base");

        let tree = base.tree()?;
        let mut opts = DiffOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let diff = repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))?;

        let mut files = BTreeSet::new();
        for delta in diff.deltas() {
            for path in [delta.old_file().path(), delta.new_file().path()]
                .into_iter()
                .flatten()
            {
                files.insert(workdir.join(path));
            }
        }
        debug!(count = files.len(), "changed files");
        Ok(files.into_iter().collect())
    }
}

/// Change source returning a fixed file list, whatever the reference.
#[derive(Debug, Clone, Default)]
pub struct StaticChangeSource {
    files: Vec<PathBuf>,
}

impl StaticChangeSource {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

impl ChangeSource for StaticChangeSource {
    fn changed_files(&self, _since: &str) -> Result<Vec<PathBuf>> {
        Ok(self.files.clone())
    }
}

/// Packages whose directory contains at least one of `files`, in input
/// order.
pub fn changed_packages(packages: &[Arc<Package>], root: &Path, files: &[PathBuf]) -> Vec<Arc<Package>> {
    let files: Vec<PathBuf> = files
        .iter()
        .map(|f| if f.is_absolute() { f.clone() } else { root.join(f) })
        .collect();

    packages
        .iter()
        .filter(|pkg| files.iter().any(|f| pkg.contains_path(f)))
        .cloned()
        .collect()
}
