use std::fs;
use std::path::Path;
use std::sync::Arc;

use git2::{Repository, Signature};
use tempfile::TempDir;

use weft_core::change::{changed_packages, ChangeSource, GitChangeSource};
use weft_core::error::Error;
use weft_core::package::Package;

fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index.add_all(["*"], git2::IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap();
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup() -> (TempDir, Repository) {
    let temp = TempDir::new().unwrap();
    let repo = Repository::init(temp.path()).unwrap();
    write(temp.path(), "packages/core/lib.rs", "core");
    write(temp.path(), "packages/app/main.rs", "app");
    write(temp.path(), "packages/docs/index.md", "docs");
    commit_all(&repo, "initial");
    (temp, repo)
}

fn changed_names(root: &Path, since: &str) -> Vec<String> {
    let root = root.canonicalize().unwrap();
    let packages: Vec<Arc<Package>> = ["core", "app", "docs"]
        .iter()
        .map(|n| Arc::new(Package::new(*n, root.join("packages").join(n), "1.0.0")))
        .collect();
    let files = GitChangeSource::new(&root).changed_files(since).unwrap();
    changed_packages(&packages, &root, &files)
        .iter()
        .map(|p| p.name.clone())
        .collect()
}

#[test]
fn test_clean_tree_has_no_changes() {
    let (temp, _repo) = setup();
    assert!(changed_names(temp.path(), "HEAD").is_empty());
}

#[test]
fn test_committed_changes_since_reference() {
    let (temp, repo) = setup();
    write(temp.path(), "packages/core/lib.rs", "core v2");
    commit_all(&repo, "touch core");
    assert_eq!(changed_names(temp.path(), "HEAD~1"), vec!["core"]);
}

#[test]
fn test_staged_unstaged_and_untracked_changes() {
    let (temp, repo) = setup();

    write(temp.path(), "packages/core/lib.rs", "unstaged edit");
    write(temp.path(), "packages/docs/new.md", "untracked");
    write(temp.path(), "packages/app/main.rs", "staged edit");
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("packages/app/main.rs")).unwrap();
    index.write().unwrap();

    assert_eq!(changed_names(temp.path(), "HEAD"), vec!["core", "app", "docs"]);
}

#[test]
fn test_unknown_reference_is_git_error() {
    let (temp, _repo) = setup();
    let err = GitChangeSource::new(temp.path()).changed_files("no-such-branch").unwrap_err();
    assert!(matches!(err, Error::Git(_)));
}
