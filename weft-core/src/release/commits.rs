//! Conventional commit messages and the version bump they imply.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};

/// Size of a semantic version bump, ordered from smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    None,
    /// 1.0.0 -> 1.0.1
    Patch,
    /// 1.0.0 -> 1.1.0
    Minor,
    /// 1.0.0 -> 2.0.0
    Major,
}

impl BumpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BumpType::None => "none",
            BumpType::Patch => "patch",
            BumpType::Minor => "minor",
            BumpType::Major => "major",
        }
    }
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(BumpType::Major),
            "minor" => Ok(BumpType::Minor),
            "patch" => Ok(BumpType::Patch),
            other => Err(Error::Release(format!(
                "unknown bump type '{}', expected major, minor or patch",
                other
            ))),
        }
    }
}

/// A commit message in `type(scope)!: description` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalCommit {
    pub sha: String,
    /// Lowercased commit type such as `feat` or `fix`.
    pub kind: String,
    pub scope: Option<String>,
    pub description: String,
    pub body: Option<String>,
    pub breaking: bool,
}

const BREAKING_FOOTERS: [&str; 2] = ["BREAKING CHANGE:", "BREAKING-CHANGE:"];

impl ConventionalCommit {
    /// Parses a full commit message. Returns `None` when the subject line
    /// does not follow the convention.
    pub fn parse(message: &str) -> Option<Self> {
        let mut lines = message.lines();
        let header = lines.next()?.trim();
        let (prefix, description) = header.split_once(':')?;
        let description = description.trim();
        if description.is_empty() {
            return None;
        }

        let (prefix, bang) = match prefix.strip_suffix('!') {
            Some(rest) => (rest, true),
            None => (prefix, false),
        };
        let (kind, scope) = match prefix.split_once('(') {
            Some((kind, rest)) => {
                let scope = rest.strip_suffix(')')?.trim();
                (kind, (!scope.is_empty()).then(|| scope.to_string()))
            }
            None => (prefix, None),
        };
        if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }

        let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
        let breaking = bang
            || body
                .lines()
                .any(|l| BREAKING_FOOTERS.iter().any(|f| l.trim_start().starts_with(f)));

        Some(Self {
            sha: String::new(),
            kind: kind.to_ascii_lowercase(),
            scope,
            description: description.to_string(),
            body: (!body.is_empty()).then_some(body),
            breaking,
        })
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = sha.into();
        self
    }

    /// Text after a `BREAKING CHANGE:` footer, if the body has one.
    pub fn breaking_note(&self) -> Option<&str> {
        self.body.as_deref()?.lines().find_map(|line| {
            let line = line.trim_start();
            BREAKING_FOOTERS
                .iter()
                .find_map(|f| line.strip_prefix(f))
                .map(str::trim)
        })
    }

    pub fn bump(&self) -> BumpType {
        if self.breaking {
            return BumpType::Major;
        }
        match self.kind.as_str() {
            "feat" => BumpType::Minor,
            "fix" | "perf" => BumpType::Patch,
            _ => BumpType::None,
        }
    }
}

/// The largest bump any of `commits` calls for.
pub fn determine_bump(commits: &[ConventionalCommit]) -> BumpType {
    commits.iter().map(ConventionalCommit::bump).max().unwrap_or(BumpType::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_parts() {
        let commit = ConventionalCommit::parse("feat(api): add login endpoint").unwrap();
        assert_eq!(commit.kind, "feat");
        assert_eq!(commit.scope.as_deref(), Some("api"));
        assert_eq!(commit.description, "add login endpoint");
        assert!(!commit.breaking);
        assert!(commit.body.is_none());

        let bare = ConventionalCommit::parse("Fix: typo").unwrap();
        assert_eq!(bare.kind, "fix");
        assert!(bare.scope.is_none());
    }

    #[test]
    fn test_breaking_markers() {
        let bang = ConventionalCommit::parse("refactor(core)!: drop legacy loader").unwrap();
        assert!(bang.breaking);
        assert_eq!(bang.bump(), BumpType::Major);

        let footer =
            ConventionalCommit::parse("fix: rename field\n\nBREAKING CHANGE: `id` is now `key`").unwrap();
        assert!(footer.breaking);
        assert_eq!(footer.breaking_note(), Some("`id` is now `key`"));
    }

    #[test]
    fn test_non_conventional_messages() {
        assert!(ConventionalCommit::parse("Merge branch 'main'").is_none());
        assert!(ConventionalCommit::parse("feat:").is_none());
        assert!(ConventionalCommit::parse("feat(api: missing paren").is_none());
        assert!(ConventionalCommit::parse("some change: with colon").is_none());
        assert!(ConventionalCommit::parse("").is_none());
    }

    #[test]
    fn test_determine_bump_takes_largest() {
        let parse = |m: &str| ConventionalCommit::parse(m).unwrap();
        assert_eq!(determine_bump(&[]), BumpType::None);
        assert_eq!(determine_bump(&[parse("docs: readme"), parse("chore: deps")]), BumpType::None);
        assert_eq!(determine_bump(&[parse("perf: faster"), parse("docs: x")]), BumpType::Patch);
        assert_eq!(determine_bump(&[parse("fix: a"), parse("feat: b")]), BumpType::Minor);
        assert_eq!(determine_bump(&[parse("feat: a"), parse("fix!: b")]), BumpType::Major);
    }

    #[test]
    fn test_bump_type_from_str() {
        assert_eq!("Major".parse::<BumpType>().unwrap(), BumpType::Major);
        assert_eq!("patch".parse::<BumpType>().unwrap(), BumpType::Patch);
        assert!("huge".parse::<BumpType>().is_err());
        assert!(BumpType::Major > BumpType::Minor);
    }
}
