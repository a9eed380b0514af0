//! Package discovery under a workspace root.

use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use rayon::prelude::*;
use tracing::debug;

use crate::config::{PackageManifest, WorkspaceConfig, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::filter::GlobPattern;
use crate::package::Package;
use crate::registry::PackageRegistry;

const PATH_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn trim_pattern(pattern: &str) -> &str {
    pattern.trim().trim_start_matches("./").trim_end_matches('/')
}

fn invalid(pattern: &str, e: impl ToString) -> Error {
    Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    }
}

fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Finds and parses package manifests for a workspace.
pub struct Scanner {
    root: PathBuf,
    include: Vec<String>,
    exclude: Vec<(Pattern, GlobPattern)>,
}

impl Scanner {
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for an unusable package or ignore
    /// pattern.
    pub fn new(config: &WorkspaceConfig) -> Result<Self> {
        let include = config
            .packages
            .iter()
            .map(|p| trim_pattern(p))
            .filter(|p| !p.is_empty())
            .map(|p| {
                Pattern::new(p).map_err(|e| invalid(p, e))?;
                Ok(p.to_string())
            })
            .collect::<Result<Vec<_>>>()?;
        let exclude = config
            .ignore
            .iter()
            .map(|p| {
                let path = Pattern::new(trim_pattern(p)).map_err(|e| invalid(p, e))?;
                Ok((path, GlobPattern::new(p)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            root: config.root.clone(),
            include,
            exclude,
        })
    }

    fn is_excluded(&self, relative: &Path, dir: &Path) -> bool {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.exclude
            .iter()
            .any(|(path, name)| path.matches_path_with(relative, PATH_MATCH) || name.matches_name(&dir_name))
    }

    /// Directories holding a package manifest, sorted by directory name.
    ///
    /// Each `packages` entry is expanded as a glob relative to the root, so
    /// `*`, `?`, `[ab]` and a recursive `**` all behave as in a shell.
    pub fn package_dirs(&self) -> Vec<PathBuf> {
        let base = Pattern::escape(&self.root.to_string_lossy());
        let mut dirs = BTreeSet::new();

        for pattern in &self.include {
            let full = format!("{}/{}", base.trim_end_matches('/'), pattern);
            let Ok(paths) = glob::glob_with(&full, PATH_MATCH) else {
                continue;
            };
            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        debug!(error = %e, "unreadable path skipped");
                        continue;
                    }
                };
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                if relative.as_os_str().is_empty() || is_hidden(relative) {
                    continue;
                }
                if !path.is_dir() || !path.join(CONFIG_FILE).is_file() {
                    continue;
                }
                if self.is_excluded(relative, &path) {
                    debug!(dir = %relative.display(), "ignored by workspace.ignore");
                    continue;
                }
                dirs.insert(path);
            }
        }

        let mut dirs: Vec<PathBuf> = dirs.into_iter().collect();
        dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
        dirs
    }

    /// Discovers, parses and cross-links every package.
    ///
    /// Besides the declared workspace dependencies, any regular or dev
    /// dependency naming a workspace package becomes a workspace
    /// dependency.
    ///
    /// # Errors
    ///
    /// Returns an error if a manifest is unreadable or invalid, or if two
    /// packages share a normalized name.
    pub fn scan(&self) -> Result<PackageRegistry> {
        let dirs = self.package_dirs();
        debug!(root = %self.root.display(), count = dirs.len(), "parsing manifests");

        let packages: Vec<Package> = dirs
            .into_par_iter()
            .map(|dir| {
                let manifest = PackageManifest::load(dir.join(CONFIG_FILE))?;
                Ok(manifest.into_package(dir))
            })
            .collect::<Result<Vec<_>>>()?;

        let names: HashSet<String> = packages.iter().map(Package::normalized_name).collect();
        let packages = packages.into_iter().map(|package| {
            let own = package.normalized_name();
            let inferred: Vec<String> = package
                .dependencies
                .iter()
                .chain(&package.dev_dependencies)
                .chain(&package.workspace_dependencies)
                .filter(|d| names.contains(*d) && **d != own)
                .cloned()
                .collect();
            package.with_workspace_dependencies(inferred)
        });

        PackageRegistry::from_packages(packages)
    }
}
