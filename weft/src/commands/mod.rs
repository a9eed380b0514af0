//! Command implementations for the CLI.

mod discovery;
mod execution;
mod info;
mod release;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use weft_core::config::MAX_CONCURRENCY;
use weft_core::{ChangeSource, GitChangeSource, Package, PackageFilter, RunOverrides, ScriptConfig, Workspace};

pub use discovery::{cmd_changed, cmd_graph, cmd_list};
pub use execution::{cmd_exec, cmd_run};
pub use info::{cmd_validate, cmd_why};
pub use release::{cmd_init, cmd_release, ReleaseArgs};

/// Package selection flags shared by listing and execution commands.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Comma-separated name globs, e.g. "api-*,web"
    #[arg(long)]
    pub scope: Option<String>,

    /// Name or path glob to exclude (repeatable)
    #[arg(long)]
    pub ignore: Vec<String>,

    /// Only packages changed since this git reference
    #[arg(long)]
    pub since: Option<String>,

    /// With --since, also select packages depending on changed ones
    #[arg(long, action, requires = "since")]
    pub include_dependents: bool,

    /// Explicit package name (repeatable, overrides --scope)
    #[arg(short = 'p', long = "package")]
    pub packages: Vec<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> PackageFilter {
        let mut filter = PackageFilter::new()
            .with_names(self.packages.iter().cloned())
            .with_ignore(self.ignore.iter().cloned());
        if let Some(scope) = &self.scope {
            filter = filter.with_scope(scope.clone());
        }
        if let Some(since) = &self.since {
            filter = filter.with_since(since.clone(), self.include_dependents);
        }
        filter
    }
}

/// Execution flags shared by `run` and `exec`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Maximum number of packages running at once
    #[arg(short = 'j', long, value_parser = parse_concurrency)]
    pub concurrency: Option<usize>,

    /// Stop scheduling new packages after the first failure
    #[arg(long, action, overrides_with = "no_fail_fast")]
    pub fail_fast: bool,

    /// Keep going after failures, even if the script or defaults say otherwise
    #[arg(long, action, overrides_with = "fail_fast")]
    pub no_fail_fast: bool,

    /// Ignore dependency order and run every package as soon as possible
    #[arg(long, action)]
    pub no_topological: bool,

    /// Extra environment variable KEY=VALUE (repeatable)
    #[arg(long = "env", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    #[arg(long, action)]
    pub json: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            concurrency: self.concurrency,
            fail_fast: if self.fail_fast {
                Some(true)
            } else if self.no_fail_fast {
                Some(false)
            } else {
                None
            },
            topological: self.no_topological.then_some(false),
        }
    }

    pub fn env_map(&self) -> BTreeMap<String, String> {
        self.env.iter().cloned().collect()
    }
}

fn parse_concurrency(value: &str) -> std::result::Result<usize, String> {
    let n: usize = value.parse().map_err(|_| format!("'{}' is not a number", value))?;
    if (1..=MAX_CONCURRENCY).contains(&n) {
        Ok(n)
    } else {
        Err(format!("must be between 1 and {}", MAX_CONCURRENCY))
    }
}

fn parse_env_pair(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", value)),
    }
}

fn load_workspace(config: Option<&Path>) -> Result<Workspace> {
    let workspace = match config {
        Some(path) => Workspace::from_config(path)?,
        None => Workspace::discover(std::env::current_dir()?)?,
    };
    Ok(workspace)
}

/// Runs the filter chain, consulting git only when `--since` is given.
fn select_packages(workspace: &Workspace, filter: &PackageFilter) -> Result<Vec<Arc<Package>>> {
    let source = GitChangeSource::new(workspace.root());
    let changes = filter.since.as_ref().map(|_| &source as &dyn ChangeSource);
    Ok(workspace.filter_packages(filter, changes)?)
}

fn select_script_packages(workspace: &Workspace, filter: &PackageFilter, script: &ScriptConfig) -> Result<Vec<Arc<Package>>> {
    let source = GitChangeSource::new(workspace.root());
    let changes = filter.since.as_ref().map(|_| &source as &dyn ChangeSource);
    Ok(workspace.select_for_script(filter, script, changes)?)
}
