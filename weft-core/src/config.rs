//! TOML configuration for workspaces and package manifests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::package::{parse_dependency_name, Package};
use crate::runner::DEFAULT_CONCURRENCY;

/// File name of both the workspace file and package manifests.
pub const CONFIG_FILE: &str = "weft.toml";

pub const MAX_CONCURRENCY: usize = 32;

/// A script as written in TOML: a bare command or a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    Simple(String),
    Complex(ScriptConfig),
}

impl From<ScriptValue> for ScriptConfig {
    fn from(value: ScriptValue) -> Self {
        match value {
            ScriptValue::Simple(run) => ScriptConfig {
                run,
                ..Default::default()
            },
            ScriptValue::Complex(config) => config,
        }
    }
}

/// A named command defined in the workspace file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    pub run: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Comma-separated name globs narrowing where the script runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topological: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

pub(crate) fn deserialize_scripts<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, ScriptConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: IndexMap<String, ScriptValue> = IndexMap::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(name, value)| (name, value.into())).collect())
}

/// Defaults applied to every command run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub concurrency: usize,
    pub fail_fast: bool,
    pub topological: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fail_fast: false,
            topological: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkspaceFile {
    workspace: Option<WorkspaceSection>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceSection {
    name: Option<String>,
    #[serde(default)]
    packages: Vec<String>,
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    defaults: Defaults,
    #[serde(default, deserialize_with = "deserialize_scripts")]
    scripts: IndexMap<String, ScriptConfig>,
}

/// Per-invocation settings given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub concurrency: Option<usize>,
    pub fail_fast: Option<bool>,
    pub topological: Option<bool>,
}

/// Settings in effect for one run after layering all sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub concurrency: usize,
    pub fail_fast: bool,
    pub topological: bool,
}

/// Workspace configuration loaded from the root `weft.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// Directory holding the workspace file.
    pub root: PathBuf,
    pub path: PathBuf,
    pub name: Option<String>,
    /// Globs, relative to the root, of directories holding packages.
    pub packages: Vec<String>,
    /// Globs of package directories excluded from discovery.
    pub ignore: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub defaults: Defaults,
    pub scripts: IndexMap<String, ScriptConfig>,
}

impl WorkspaceConfig {
    /// Walks up from `start` to the nearest `weft.toml` that has a
    /// `[workspace]` table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkspaceNotFound`] when no ancestor qualifies.
    pub fn find(start: impl AsRef<Path>) -> Result<Self> {
        let start = start.as_ref();
        let absolute = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());

        for dir in absolute.ancestors() {
            let candidate = dir.join(CONFIG_FILE);
            if !candidate.is_file() {
                continue;
            }
            if let Some(config) = Self::read(&candidate)? {
                return Ok(config);
            }
        }

        Err(Error::WorkspaceNotFound(absolute))
    }

    /// Loads an explicit workspace file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, lacks a
    /// `[workspace]` table, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::read(path)?.ok_or_else(|| Error::Config {
            path: path.to_path_buf(),
            message: "missing [workspace] table".to_string(),
        })
    }

    fn read(path: &Path) -> Result<Option<Self>> {
        let content = std::fs::read_to_string(path)?;
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::parse(&content, &path)
    }

    /// Parses workspace file content. Returns `None` for a file without a
    /// `[workspace]` table, such as a package manifest.
    pub fn parse(content: &str, path: &Path) -> Result<Option<Self>> {
        let file: WorkspaceFile = toml::from_str(content).map_err(|error| Error::Toml {
            error,
            context: path.display().to_string(),
        })?;
        let Some(section) = file.workspace else {
            return Ok(None);
        };

        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let config = Self {
            root,
            path: path.to_path_buf(),
            name: section.name,
            packages: section.packages,
            ignore: section.ignore,
            env: section.env,
            defaults: section.defaults,
            scripts: section.scripts,
        };
        config.validate()?;
        Ok(Some(config))
    }

    fn invalid(&self, message: String) -> Error {
        Error::Config {
            path: self.path.clone(),
            message,
        }
    }

    /// Checks invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.packages.iter().all(|p| p.trim().is_empty()) {
            return Err(self.invalid("workspace.packages must list at least one pattern".to_string()));
        }
        check_concurrency(self.defaults.concurrency)
            .map_err(|m| self.invalid(format!("workspace.defaults.concurrency {}", m)))?;

        for (name, script) in &self.scripts {
            if script.run.trim().is_empty() {
                return Err(self.invalid(format!("script '{}' has an empty run command", name)));
            }
            if let Some(concurrency) = script.concurrency {
                check_concurrency(concurrency)
                    .map_err(|m| self.invalid(format!("script '{}' concurrency {}", name, m)))?;
            }
        }
        Ok(())
    }

    /// Display name: the configured name, else the root directory name.
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "workspace".to_string())
        })
    }

    /// Looks up a script by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScriptNotFound`] listing the defined scripts.
    pub fn script(&self, name: &str) -> Result<&ScriptConfig> {
        self.scripts.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.scripts.keys().map(String::as_str).collect();
            available.sort_unstable();
            Error::ScriptNotFound {
                name: name.to_string(),
                available: if available.is_empty() {
                    "(none)".to_string()
                } else {
                    available.join(", ")
                },
            }
        })
    }

    /// Resolves run settings: command line, then script, then defaults.
    pub fn run_options(&self, script: Option<&ScriptConfig>, overrides: &RunOverrides) -> RunOptions {
        RunOptions {
            concurrency: overrides
                .concurrency
                .or_else(|| script.and_then(|s| s.concurrency))
                .unwrap_or(self.defaults.concurrency),
            fail_fast: overrides
                .fail_fast
                .or_else(|| script.and_then(|s| s.fail_fast))
                .unwrap_or(self.defaults.fail_fast),
            topological: overrides
                .topological
                .or_else(|| script.and_then(|s| s.topological))
                .unwrap_or(self.defaults.topological),
        }
    }

    /// Workspace environment overlaid with the script's, then `extra`.
    pub fn environment(
        &self,
        script: Option<&ScriptConfig>,
        extra: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        if let Some(script) = script {
            env.extend(script.env.clone());
        }
        env.extend(extra.clone());
        env
    }
}

fn check_concurrency(value: usize) -> std::result::Result<(), String> {
    if (1..=MAX_CONCURRENCY).contains(&value) {
        Ok(())
    } else {
        Err(format!("must be between 1 and {}, got {}", MAX_CONCURRENCY, value))
    }
}

fn default_version() -> String {
    "0.0.0".to_string()
}

/// The `[package]` table of a package manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageSection {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub dev_dependencies: Vec<String>,
    #[serde(default)]
    pub workspace_dependencies: Vec<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
}

/// A package manifest, `weft.toml` with a `[package]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageManifest {
    pub package: PackageSection,
}

impl PackageManifest {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// manifest.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let manifest: Self = toml::from_str(content).map_err(|error| Error::Toml {
            error,
            context: path.display().to_string(),
        })?;
        if manifest.package.name.trim().is_empty() {
            return Err(Error::Config {
                path: path.to_path_buf(),
                message: "package.name cannot be empty".to_string(),
            });
        }
        Ok(manifest)
    }

    /// Builds a package rooted at `dir` with only its declared workspace
    /// dependencies. Discovery adds the inferred ones later.
    pub fn into_package(self, dir: impl Into<PathBuf>) -> Package {
        let section = self.package;
        let mut package = Package::new(section.name, dir, section.version)
            .with_dependencies(section.dependencies.iter().map(|d| parse_dependency_name(d)))
            .with_dev_dependencies(section.dev_dependencies.iter().map(|d| parse_dependency_name(d)))
            .with_workspace_dependencies(section.workspace_dependencies.iter().map(|d| parse_dependency_name(d)))
            .with_scripts(section.scripts);
        package.description = section.description;
        package
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Option<WorkspaceConfig>> {
        WorkspaceConfig::parse(content, Path::new("/ws/weft.toml"))
    }

    #[test]
    fn test_simple_and_table_scripts() {
        let config = parse(
            r#"
            [workspace]
            packages = ["packages/*"]

            [workspace.scripts]
            test = "cargo test"
            lint = { run = "cargo clippy", fail_fast = true, scope = "api-*" }
            "#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(config.root, PathBuf::from("/ws"));
        assert_eq!(config.script("test").unwrap().run, "cargo test");
        let lint = config.script("lint").unwrap();
        assert_eq!(lint.fail_fast, Some(true));
        assert_eq!(lint.scope.as_deref(), Some("api-*"));
        let names: Vec<&str> = config.scripts.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["test", "lint"]);
    }

    #[test]
    fn test_missing_workspace_table_is_none() {
        assert!(parse("[package]\nname = \"x\"\n").unwrap().is_none());
    }

    #[test]
    fn test_defaults() {
        let config = parse("[workspace]\npackages = [\"*\"]\n").unwrap().unwrap();
        assert_eq!(config.defaults, Defaults::default());
        assert_eq!(config.defaults.concurrency, 4);
        assert!(config.defaults.topological);
        assert!(!config.defaults.fail_fast);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            parse("[workspace]\npackages = []\n"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            parse("[workspace]\npackages = [\"*\"]\n[workspace.defaults]\nconcurrency = 0\n"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            parse("[workspace]\npackages = [\"*\"]\n[workspace.defaults]\nconcurrency = 33\n"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            parse("[workspace]\npackages = [\"*\"]\n[workspace.scripts]\nx = \" \"\n"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(parse("[workspace"), Err(Error::Toml { .. })));
    }

    #[test]
    fn test_unknown_script_lists_available() {
        let config = parse("[workspace]\npackages = [\"*\"]\n[workspace.scripts]\nb = \"b\"\na = \"a\"\n")
            .unwrap()
            .unwrap();
        match config.script("nope") {
            Err(Error::ScriptNotFound { available, .. }) => assert_eq!(available, "a, b"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_run_options_precedence() {
        let config = parse(
            "[workspace]\npackages = [\"*\"]\n[workspace.defaults]\nconcurrency = 8\n[workspace.scripts]\nt = { run = \"t\", concurrency = 2, fail_fast = true }\n",
        )
        .unwrap()
        .unwrap();
        let script = config.script("t").unwrap();

        let options = config.run_options(Some(script), &RunOverrides::default());
        assert_eq!(options.concurrency, 2);
        assert!(options.fail_fast);
        assert!(options.topological);

        let overrides = RunOverrides {
            concurrency: Some(5),
            fail_fast: Some(false),
            topological: Some(false),
        };
        let options = config.run_options(Some(script), &overrides);
        assert_eq!(
            options,
            RunOptions {
                concurrency: 5,
                fail_fast: false,
                topological: false
            }
        );

        assert_eq!(config.run_options(None, &RunOverrides::default()).concurrency, 8);
    }

    #[test]
    fn test_environment_layering() {
        let config = parse(
            "[workspace]\npackages = [\"*\"]\nenv = { A = \"ws\", B = \"ws\" }\n[workspace.scripts]\nt = { run = \"t\", env = { B = \"script\", C = \"script\" } }\n",
        )
        .unwrap()
        .unwrap();
        let extra: BTreeMap<String, String> = [("C".to_string(), "cli".to_string())].into_iter().collect();
        let env = config.environment(Some(config.script("t").unwrap()), &extra);
        assert_eq!(env["A"], "ws");
        assert_eq!(env["B"], "script");
        assert_eq!(env["C"], "cli");
    }

    #[test]
    fn test_manifest_into_package() {
        let manifest = PackageManifest::parse(
            r#"
            [package]
            name = "api-core"
            description = "Core API"
            dependencies = ["serde", "Utils>=1.0"]
            dev-dependencies = ["pretty_assertions"]
            workspace-dependencies = ["shared-types"]
            scripts = ["serve"]
            "#,
            Path::new("/ws/api/weft.toml"),
        )
        .unwrap();
        let package = manifest.into_package("/ws/api");
        assert_eq!(package.version, "0.0.0");
        assert_eq!(package.description.as_deref(), Some("Core API"));
        assert!(package.dependencies.contains("utils"));
        assert!(package.workspace_dependencies.contains("shared_types"));
        assert!(package.has_script("serve"));
    }
}
