//! Workspace aggregate: configuration, packages and the cached graph.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::change::ChangeSource;
use crate::config::{ScriptConfig, WorkspaceConfig};
use crate::error::Result;
use crate::filter::{ChangeContext, PackageFilter};
use crate::graph::DependencyGraph;
use crate::package::Package;
use crate::registry::PackageRegistry;
use crate::scanner::Scanner;

/// A discovered workspace.
///
/// The dependency graph is built on first use and kept until
/// [`Workspace::refresh`] replaces the package set.
#[derive(Debug)]
pub struct Workspace {
    config: WorkspaceConfig,
    registry: PackageRegistry,
    graph: OnceCell<Arc<DependencyGraph>>,
}

impl Workspace {
    /// Finds the workspace containing `start` and discovers its packages.
    ///
    /// # Errors
    ///
    /// Returns an error if no workspace file is found or discovery fails.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let config = WorkspaceConfig::find(start)?;
        Self::from_workspace_config(config)
    }

    /// Loads the workspace described by an explicit `weft.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is invalid or discovery fails.
    pub fn from_config(path: impl AsRef<Path>) -> Result<Self> {
        let config = WorkspaceConfig::load(path)?;
        Self::from_workspace_config(config)
    }

    fn from_workspace_config(config: WorkspaceConfig) -> Result<Self> {
        let registry = Scanner::new(&config)?.scan()?;
        info!(workspace = %config.display_name(), packages = registry.len(), "workspace loaded");
        Ok(Self {
            config,
            registry,
            graph: OnceCell::new(),
        })
    }

    /// Assembles a workspace from packages that are already known.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicatePackage`] on a name collision.
    pub fn from_packages(config: WorkspaceConfig, packages: impl IntoIterator<Item = Package>) -> Result<Self> {
        Ok(Self {
            config,
            registry: PackageRegistry::from_packages(packages)?,
            graph: OnceCell::new(),
        })
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    #[inline]
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &PackageRegistry {
        &self.registry
    }

    /// All packages in discovery order.
    pub fn packages(&self) -> Vec<Arc<Package>> {
        self.registry.to_vec()
    }

    /// The dependency graph over every package, built on first call.
    pub fn graph(&self) -> Arc<DependencyGraph> {
        Arc::clone(self.graph.get_or_init(|| {
            debug!(packages = self.registry.len(), "building dependency graph");
            Arc::new(DependencyGraph::from_registry(&self.registry))
        }))
    }

    /// Re-runs discovery and drops the cached graph.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails; the workspace is left unchanged.
    pub fn refresh(&mut self) -> Result<()> {
        self.registry = Scanner::new(&self.config)?.scan()?;
        self.graph = OnceCell::new();
        info!(packages = self.registry.len(), "workspace refreshed");
        Ok(())
    }

    /// Looks up a package that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PackageNotFound`] listing available names.
    pub fn get_package(&self, name: &str) -> Result<Arc<Package>> {
        self.registry.get(name).cloned()
    }

    /// Runs the filter chain over every package.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid patterns or a failing change source.
    pub fn filter_packages(
        &self,
        filter: &PackageFilter,
        changes: Option<&dyn ChangeSource>,
    ) -> Result<Vec<Arc<Package>>> {
        let graph = self.graph();
        let context = changes.map(|source| ChangeContext {
            source,
            root: self.root(),
            graph: graph.as_ref(),
        });
        filter.apply(self.packages(), context.as_ref())
    }

    /// Selects the packages a script runs in.
    ///
    /// The script's own `ignore` always applies on top of `filter`. Its
    /// `scope` only narrows the set when no explicit package names were
    /// given, so `-p name` can target a package outside the script scope.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid patterns or a failing change source.
    pub fn select_for_script(
        &self,
        filter: &PackageFilter,
        script: &ScriptConfig,
        changes: Option<&dyn ChangeSource>,
    ) -> Result<Vec<Arc<Package>>> {
        let packages = self.filter_packages(filter, changes)?;

        let mut narrowing = PackageFilter::new().with_ignore(script.ignore.iter().cloned());
        match &script.scope {
            Some(scope) if filter.names.is_empty() => narrowing = narrowing.with_scope(scope.clone()),
            Some(scope) => debug!(scope = %scope, "explicit packages given, script scope not applied"),
            None => {}
        }
        if narrowing.is_empty() {
            return Ok(packages);
        }
        narrowing.apply(packages, None)
    }

    /// Topological order of `subset`, or of the whole workspace.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CyclicDependency`] if the packages form a cycle.
    pub fn topological_order(&self, subset: Option<&[Arc<Package>]>) -> Result<Vec<Arc<Package>>> {
        match subset {
            Some(packages) => DependencyGraph::from_shared(packages.iter().cloned()).topological_order(),
            None => self.graph().topological_order(),
        }
    }

    /// Parallel batches of `subset`, or of the whole workspace.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CyclicDependency`] if the packages form a cycle.
    pub fn parallel_batches(&self, subset: Option<&[Arc<Package>]>) -> Result<Vec<Vec<Arc<Package>>>> {
        match subset {
            Some(packages) => DependencyGraph::from_shared(packages.iter().cloned()).parallel_batches(),
            None => self.graph().parallel_batches(),
        }
    }

    /// Changed packages plus everything that transitively depends on them.
    pub fn affected_packages<I, S>(&self, changed: I) -> Vec<Arc<Package>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.graph().affected_packages(changed)
    }

    /// # Errors
    ///
    /// Returns [`crate::Error::ScriptNotFound`] for an undefined script.
    pub fn script(&self, name: &str) -> Result<&ScriptConfig> {
        self.config.script(name)
    }

    /// Path of a package relative to the workspace root.
    pub fn relative_path(&self, package: &Package) -> PathBuf {
        package
            .path
            .strip_prefix(self.root())
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| package.path.clone())
    }
}
