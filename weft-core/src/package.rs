//! Package data model and name normalization.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Normalizes a package name for comparison.
///
/// Names compare case-insensitively with `-` and `_` treated as the same
/// character, so `My-Package` and `my_package` are one package.
#[inline]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('-', "_")
}

/// Extracts the bare package name from a dependency specifier.
///
/// `"requests>=2.0"` becomes `requests`, `"numpy[extra]"` becomes `numpy`,
/// and `"my-pkg @ file://..."` becomes `my_pkg`.
pub fn parse_dependency_name(spec: &str) -> String {
    let mut dep = spec;
    if let Some((head, _)) = dep.split_once(" @ ") {
        dep = head;
    }
    if let Some((head, _)) = dep.split_once('[') {
        dep = head;
    }
    for sep in [">=", "<=", "==", "!=", "~=", ">", "<", ";"] {
        if let Some((head, _)) = dep.split_once(sep) {
            dep = head;
        }
    }
    normalize_name(dep)
}

/// Represents a package in the workspace.
///
/// Packages are immutable once discovered. A workspace refresh replaces the
/// whole set instead of editing individual entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub path: PathBuf,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default)]
    pub dev_dependencies: BTreeSet<String>,
    /// Normalized names of sibling packages this one depends on.
    #[serde(default)]
    pub workspace_dependencies: BTreeSet<String>,
    #[serde(default)]
    pub scripts: BTreeSet<String>,
}

impl Package {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            version: version.into(),
            description: None,
            dependencies: BTreeSet::new(),
            dev_dependencies: BTreeSet::new(),
            workspace_dependencies: BTreeSet::new(),
            scripts: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dependencies = deps.into_iter().map(|d| normalize_name(d.as_ref())).collect();
        self
    }

    pub fn with_dev_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dev_dependencies = deps.into_iter().map(|d| normalize_name(d.as_ref())).collect();
        self
    }

    pub fn with_workspace_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.workspace_dependencies = deps.into_iter().map(|d| normalize_name(d.as_ref())).collect();
        self
    }

    pub fn with_scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts = scripts.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Returns `true` if this package depends on `name`, either externally or
    /// through the workspace.
    pub fn has_dependency(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.dependencies.contains(&name) || self.workspace_dependencies.contains(&name)
    }

    #[inline]
    pub fn has_workspace_dependency(&self, other: &Package) -> bool {
        self.workspace_dependencies.contains(&other.normalized_name())
    }

    #[inline]
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains(name)
    }

    /// Returns `true` if `file` lives inside this package's directory.
    pub fn contains_path(&self, file: &Path) -> bool {
        file.starts_with(&self.path)
    }
}
