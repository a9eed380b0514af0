//! Core library for monorepo workspace management.
//!
//! Discovers packages, builds the dependency graph between them, narrows the
//! package set through the filter chain and runs commands across packages
//! with bounded concurrency. Packages can also be released from their
//! conventional commit history.

pub mod change;
pub mod command_validator;
pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod graph;
pub mod init;
pub mod metrics;
pub mod package;
pub mod registry;
pub mod release;
pub mod result;
pub mod runner;
pub mod scanner;
pub mod workspace;

pub use change::{changed_packages, ChangeSource, GitChangeSource, StaticChangeSource};
pub use command_validator::CommandValidator;
pub use config::{
    Defaults, PackageManifest, RunOptions, RunOverrides, ScriptConfig, WorkspaceConfig, CONFIG_FILE,
};
pub use error::{Error, Result};
pub use executor::{run_in_package, CommandSpec};
pub use filter::{parse_scope, ChangeContext, GlobPattern, PackageFilter};
pub use graph::DependencyGraph;
pub use init::init_workspace;
pub use metrics::ExecutionMetrics;
pub use package::{normalize_name, parse_dependency_name, Package};
pub use registry::PackageRegistry;
pub use release::{
    BumpType, PackageRelease, ReleaseEngine, ReleaseOptions, ReleaseOutcome, ReleasePlan, ReleaseReporter,
};
pub use result::{BatchResult, ExecutionResult, ExecutionStatus};
pub use runner::{CancelHandle, ExecutionEngine, DEFAULT_CONCURRENCY};
pub use scanner::Scanner;
pub use workspace::Workspace;
