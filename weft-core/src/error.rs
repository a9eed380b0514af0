//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("{path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("No weft.toml with a [workspace] table found in {0} or any parent directory. Run 'weft' from inside a workspace.")]
    WorkspaceNotFound(PathBuf),

    #[error("Package '{name}' not found in workspace. Available packages: {available}")]
    PackageNotFound { name: String, available: String },

    #[error("Package '{name}' is declared twice: {} and {}", .first.display(), .second.display())]
    DuplicatePackage {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Cyclic dependency detected: {}. Use 'weft graph' to inspect dependencies.", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Script '{name}' is not defined. Available scripts: {available}")]
    ScriptNotFound { name: String, available: String },

    #[error("Invalid concurrency {0}: must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Git error: {0}")]
    Git(String),

    #[error("Release error: {0}")]
    Release(String),

    #[error("A workspace already exists at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Returns the loop for a cyclic dependency error.
    pub fn cycle(&self) -> Option<&[String]> {
        match self {
            Error::CyclicDependency { cycle } => Some(cycle),
            _ => None,
        }
    }
}

fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => {
            let mut parts: Vec<&str> = cycle.iter().map(String::as_str).collect();
            parts.push(first);
            parts.join(" -> ")
        }
        None => "(unknown cycle)".to_string(),
    }
}

impl From<git2::Error> for Error {
    fn from(error: git2::Error) -> Self {
        Error::Git(error.message().to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
