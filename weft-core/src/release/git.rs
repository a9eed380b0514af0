//! Git history, tags and the release commit.

use std::path::Path;

use git2::{DiffOptions, ObjectType, Oid, Repository, Signature, Sort};
use semver::Version;
use tracing::debug;

use crate::error::{Error, Result};

/// A commit that touched a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
}

impl CommitInfo {
    pub fn short_sha(&self) -> &str {
        &self.sha[..self.sha.len().min(7)]
    }
}

pub fn tag_name(package: &str, version: &Version) -> String {
    format!("{}@{}", package, version)
}

/// Highest `name@version` tag for `package`, by semver precedence.
///
/// # Errors
///
/// Returns an error if the tag list cannot be read.
pub fn latest_package_tag(repo: &Repository, package: &str) -> Result<Option<(String, Version)>> {
    let prefix = format!("{}@", package);
    let tags = repo.tag_names(Some(&format!("{}*", prefix)))?;
    Ok(tags
        .iter()
        .flatten()
        .filter_map(|tag| {
            let version = Version::parse(tag.strip_prefix(&prefix)?).ok()?;
            Some((tag.to_string(), version))
        })
        .max_by(|a, b| a.1.cmp(&b.1)))
}

/// Commits reachable from `HEAD` but not from `since` that changed a file
/// under `path`, newest first. `path` is relative to the repository
/// working directory; an empty path matches every commit.
///
/// # Errors
///
/// Returns an error if `since` cannot be resolved or history cannot be
/// walked.
pub fn commits_touching(repo: &Repository, since: Option<&str>, path: &Path) -> Result<Vec<CommitInfo>> {
    if repo.head().is_err() {
        return Ok(Vec::new());
    }

    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
    walk.push_head()?;
    if let Some(since) = since {
        let commit = repo
            .revparse_single(since)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|e| Error::Git(format!("cannot resolve '{}': {}", since, e.message())))?;
        walk.hide(commit.id())?;
    }

    let pathspec = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    let mut commits = Vec::new();
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        let tree = commit.tree()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };

        let mut opts = DiffOptions::new();
        if !pathspec.is_empty() {
            opts.pathspec(&pathspec);
        }
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
        if diff.deltas().len() == 0 {
            continue;
        }
        commits.push(CommitInfo {
            sha: commit.id().to_string(),
            message: commit.message().unwrap_or_default().to_string(),
        });
    }
    debug!(path = %pathspec, since = ?since, count = commits.len(), "commits touching path");
    Ok(commits)
}

fn signature(repo: &Repository) -> Result<Signature<'static>> {
    match repo.signature() {
        Ok(sig) => Ok(sig.to_owned()),
        Err(_) => Ok(Signature::now("weft", "weft@localhost")?),
    }
}

/// Stages every change in the working tree and commits it on `HEAD`.
///
/// # Errors
///
/// Returns an error if staging or committing fails.
pub fn commit_all(repo: &Repository, message: &str) -> Result<Oid> {
    let mut index = repo.index()?;
    index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"], None)?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;

    let sig = signature(repo)?;
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    Ok(repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?)
}

/// Creates an annotated tag on `HEAD`.
///
/// # Errors
///
/// Returns an error if `HEAD` is unborn or the tag already exists.
pub fn create_tag(repo: &Repository, name: &str, message: &str) -> Result<Oid> {
    let target = repo.head()?.peel(ObjectType::Commit)?;
    let sig = signature(repo)?;
    Ok(repo.tag(name, &target, &sig, message, false)?)
}
