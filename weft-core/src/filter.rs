//! Filter chain reducing a package list to a working set.
//!
//! Steps always run in this order: explicit names (which override scope),
//! scope, changed-since, ignore. Every step subtracts from its input and
//! keeps the input order.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::change::{changed_packages, ChangeSource};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::package::{normalize_name, Package};

const NAME_MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A shell glob (`*`, `?`, `[ab]`) matched against package names and paths.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    name: Pattern,
    path: Pattern,
}

impl GlobPattern {
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for an empty or malformed pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        let raw = pattern.trim();
        if raw.is_empty() {
            return Err(Error::InvalidPattern {
                pattern: pattern.to_string(),
                message: "pattern is empty".to_string(),
            });
        }
        let compile = |glob: &str| {
            Pattern::new(glob).map_err(|e| Error::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
        };
        Ok(Self {
            raw: raw.to_string(),
            name: compile(&separator_insensitive(raw))?,
            path: compile(raw)?,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Case-insensitive match with `-` and `_` treated alike.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.matches_with(name.trim(), NAME_MATCH)
    }

    /// Case-insensitive match against a full path, where `*` also crosses
    /// separators.
    pub fn matches_path(&self, path: &Path) -> bool {
        self.path.matches_path_with(path, NAME_MATCH)
    }
}

/// Rewrites `-` and `_` outside bracket expressions to `[-_]`, leaving
/// ranges such as `[0-9]` intact.
fn separator_insensitive(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '[' => {
                out.push(c);
                if let Some(&'!') = chars.peek() {
                    out.push('!');
                    chars.next();
                }
                // A leading `]` is a literal member of the class.
                if let Some(&']') = chars.peek() {
                    out.push(']');
                    chars.next();
                }
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == ']' {
                        break;
                    }
                }
            }
            '-' | '_' => out.push_str("[-_]"),
            other => out.push(other),
        }
    }
    out
}

/// Splits a comma-separated scope string into trimmed patterns.
pub fn parse_scope(scope: &str) -> Vec<String> {
    scope
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<GlobPattern>> {
    patterns.iter().map(|p| GlobPattern::new(p.as_ref())).collect()
}

/// Keeps packages whose name matches any scope pattern.
///
/// An empty scope keeps everything.
pub fn filter_by_scope(packages: Vec<Arc<Package>>, scope: &str) -> Result<Vec<Arc<Package>>> {
    let patterns = compile_all(&parse_scope(scope))?;
    if patterns.is_empty() {
        return Ok(packages);
    }
    Ok(packages
        .into_iter()
        .filter(|pkg| patterns.iter().any(|p| p.matches_name(&pkg.name)))
        .collect())
}

/// Drops packages whose name or path matches any ignore pattern.
pub fn filter_by_ignore<S: AsRef<str>>(packages: Vec<Arc<Package>>, ignore: &[S]) -> Result<Vec<Arc<Package>>> {
    let patterns = compile_all(ignore)?;
    if patterns.is_empty() {
        return Ok(packages);
    }
    Ok(packages
        .into_iter()
        .filter(|pkg| {
            !patterns
                .iter()
                .any(|p| p.matches_name(&pkg.name) || p.matches_path(&pkg.path))
        })
        .collect())
}

/// Keeps packages whose normalized name is in `names`.
///
/// Names that match nothing are dropped without error.
pub fn filter_by_names<S: AsRef<str>>(packages: Vec<Arc<Package>>, names: &[S]) -> Vec<Arc<Package>> {
    let wanted: HashSet<String> = names.iter().map(|n| normalize_name(n.as_ref())).collect();
    packages
        .into_iter()
        .filter(|pkg| wanted.contains(&pkg.normalized_name()))
        .collect()
}

/// What the changed-since step needs to know about the workspace.
pub struct ChangeContext<'a> {
    pub source: &'a dyn ChangeSource,
    pub root: &'a Path,
    /// Graph over the whole workspace, used to find dependents.
    pub graph: &'a DependencyGraph,
}

/// Keeps packages with files changed since `since`, optionally widened to
/// their transitive dependents.
///
/// Changed packages are detected across the whole workspace, so a change
/// outside the input set can still pull in its dependents.
pub fn filter_by_since(
    packages: Vec<Arc<Package>>,
    since: &str,
    include_dependents: bool,
    changes: &ChangeContext<'_>,
) -> Result<Vec<Arc<Package>>> {
    let files = changes.source.changed_files(since)?;
    let all: Vec<Arc<Package>> = changes.graph.packages().cloned().collect();
    let changed = changed_packages(&all, changes.root, &files);
    debug!(since, files = files.len(), packages = changed.len(), "changed packages");

    let selected: Vec<Arc<Package>> = if include_dependents {
        changes.graph.affected_packages(changed.iter().map(|p| p.name.as_str()))
    } else {
        changed
    };
    let keep: HashSet<&str> = selected.iter().map(|p| p.name.as_str()).collect();

    Ok(packages
        .into_iter()
        .filter(|pkg| keep.contains(pkg.name.as_str()))
        .collect())
}

/// Selection options for one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFilter {
    /// Explicit package names. When non-empty, scope is not consulted.
    pub names: Vec<String>,
    /// Comma-separated name globs.
    pub scope: Option<String>,
    /// Git reference to compare against.
    pub since: Option<String>,
    pub include_dependents: bool,
    /// Name or path globs to exclude.
    pub ignore: Vec<String>,
}

impl PackageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_since(mut self, since: impl Into<String>, include_dependents: bool) -> Self {
        self.since = Some(since.into());
        self.include_dependents = include_dependents;
        self
    }

    pub fn with_ignore<I, S>(mut self, ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(ignore.into_iter().map(Into::into));
        self
    }

    /// `true` when no step would remove anything.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
            && self.scope.as_deref().map_or(true, |s| parse_scope(s).is_empty())
            && self.since.is_none()
            && self.ignore.is_empty()
    }

    /// Runs the full chain over `packages`.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid pattern, a failing change source, or
    /// when `since` is set without a change context.
    pub fn apply(
        &self,
        packages: Vec<Arc<Package>>,
        changes: Option<&ChangeContext<'_>>,
    ) -> Result<Vec<Arc<Package>>> {
        let mut selected = packages;

        if !self.names.is_empty() {
            selected = filter_by_names(selected, &self.names);
        } else if let Some(scope) = &self.scope {
            selected = filter_by_scope(selected, scope)?;
        }

        if let Some(since) = &self.since {
            let changes = changes.ok_or_else(|| {
                Error::Runtime(format!("no change source available to resolve --since {}", since))
            })?;
            selected = filter_by_since(selected, since, self.include_dependents, changes)?;
        }

        selected = filter_by_ignore(selected, &self.ignore)?;
        debug!(remaining = selected.len(), "filters applied");
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_name_matching() {
        let pattern = GlobPattern::new("api-*").unwrap();
        assert!(pattern.matches_name("api-core"));
        assert!(pattern.matches_name("API_Core"));
        assert!(!pattern.matches_name("web-api"));

        let single = GlobPattern::new("lib?").unwrap();
        assert!(single.matches_name("lib1"));
        assert!(!single.matches_name("lib12"));
    }

    #[test]
    fn test_glob_treats_dots_literally() {
        let pattern = GlobPattern::new("a.b+c").unwrap();
        assert!(pattern.matches_name("a.b+c"));
        assert!(!pattern.matches_name("axb+c"));
    }

    #[test]
    fn test_glob_character_class() {
        let pattern = GlobPattern::new("[ab]*").unwrap();
        assert!(pattern.matches_name("api"));
        assert!(pattern.matches_name("Billing"));
        assert!(!pattern.matches_name("core"));
        assert!(!pattern.matches_name("[ab]x"));

        let negated = GlobPattern::new("lib[!0-9]").unwrap();
        assert!(negated.matches_name("libx"));
        assert!(!negated.matches_name("lib1"));
    }

    #[test]
    fn test_separator_insensitive_keeps_ranges() {
        assert_eq!(separator_insensitive("api-*"), "api[-_]*");
        assert_eq!(separator_insensitive("a[0-9]_b"), "a[0-9][-_]b");
        assert_eq!(separator_insensitive("[!]-]x"), "[!]-]x");
    }

    #[test]
    fn test_malformed_pattern_rejected() {
        assert!(matches!(
            GlobPattern::new("api-[*"),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_glob_path_matching() {
        let pattern = GlobPattern::new("*/deprecated/*").unwrap();
        assert!(pattern.matches_path(Path::new("/workspace/deprecated/test")));
        assert!(!pattern.matches_path(Path::new("/workspace/active/test")));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(matches!(
            GlobPattern::new("  "),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_parse_scope() {
        assert_eq!(parse_scope("api-*, web ,,"), vec!["api-*", "web"]);
        assert!(parse_scope(" , ").is_empty());
    }

    #[test]
    fn test_is_empty() {
        assert!(PackageFilter::new().is_empty());
        assert!(PackageFilter::new().with_scope(" ").is_empty());
        assert!(!PackageFilter::new().with_ignore(["x"]).is_empty());
    }
}
