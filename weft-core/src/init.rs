//! Scaffolding for a new workspace.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{WorkspaceConfig, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::runner::DEFAULT_CONCURRENCY;

const GITIGNORE: &str = "# Build output\ntarget/\ndist/\nbuild/\n\n# Editors\n.idea/\n.vscode/\n*.swp\n\n.DS_Store\n";

fn template(name: &str) -> String {
    format!(
        r#"[workspace]
name = "{name}"
packages = ["packages/*"]

[workspace.defaults]
concurrency = {concurrency}
fail_fast = false
topological = true

[workspace.scripts]
hello = {{ run = "echo hello from $(basename $PWD)", description = "Print each package name" }}
"#,
        name = name.replace('\\', "\\\\").replace('"', "\\\""),
        concurrency = DEFAULT_CONCURRENCY,
    )
}

/// Creates `weft.toml`, a `packages/` directory and a `.gitignore` in
/// `path`. The workspace name defaults to the directory name. An existing
/// `.gitignore` is kept.
///
/// # Errors
///
/// Returns [`Error::AlreadyInitialized`] if `path` already holds a
/// `weft.toml`, or an IO error if anything cannot be written.
pub fn init_workspace(path: impl AsRef<Path>, name: Option<&str>) -> Result<WorkspaceConfig> {
    let root = path.as_ref();
    fs::create_dir_all(root)?;
    let root: PathBuf = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        return Err(Error::AlreadyInitialized(root));
    }

    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workspace".to_string()),
    };

    fs::write(&config_path, template(&name))?;
    fs::create_dir_all(root.join("packages"))?;
    let gitignore = root.join(".gitignore");
    if !gitignore.exists() {
        fs::write(&gitignore, GITIGNORE)?;
    }
    info!(root = %root.display(), name = %name, "workspace initialized");

    WorkspaceConfig::load(&config_path)
}
