//! Markdown changelog entries in Keep a Changelog layout.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use super::commits::ConventionalCommit;
use crate::error::Result;

pub const CHANGELOG_FILE: &str = "CHANGELOG.md";

/// Commit types that get a section, in display order.
const SECTIONS: [(&str, &str); 6] = [
    ("feat", "Features"),
    ("fix", "Bug Fixes"),
    ("perf", "Performance"),
    ("refactor", "Refactoring"),
    ("build", "Build"),
    ("revert", "Reverts"),
];

const HEADER: &str = "# Changelog\n\n\
All notable changes to this project will be documented in this file.\n\n\
The format is based on [Keep a Changelog](https://keepachangelog.com/en/1.0.0/),\n\
and this project adheres to [Semantic Versioning](https://semver.org/spec/v2.0.0.html).\n";

fn bullet(commit: &ConventionalCommit) -> String {
    let scope = commit
        .scope
        .as_ref()
        .map(|s| format!("**{}:** ", s))
        .unwrap_or_default();
    let sha: String = commit.sha.chars().take(7).collect();
    if sha.is_empty() {
        format!("- {}{}", scope, commit.description)
    } else {
        format!("- {}{} ({})", scope, commit.description, sha)
    }
}

/// Renders the entry for one package release.
///
/// Breaking changes come first. Commit types without a section (docs,
/// chores, tests and the like) are left out.
pub fn changelog_entry(package: &str, version: &str, commits: &[ConventionalCommit], date: NaiveDate) -> String {
    let mut out = format!("## [{}@{}] - {}\n", package, version, date.format("%Y-%m-%d"));

    let breaking: Vec<&ConventionalCommit> = commits.iter().filter(|c| c.breaking).collect();
    if !breaking.is_empty() {
        out.push_str("\n### BREAKING CHANGES\n\n");
        for commit in breaking {
            out.push_str(&bullet(commit));
            out.push('\n');
            if let Some(note) = commit.breaking_note() {
                out.push_str(&format!("  - {}\n", note));
            }
        }
    }

    for (kind, title) in SECTIONS {
        let entries: Vec<String> = commits
            .iter()
            .filter(|c| !c.breaking && c.kind == kind)
            .map(bullet)
            .collect();
        if entries.is_empty() {
            continue;
        }
        out.push_str(&format!("\n### {}\n\n", title));
        for entry in entries {
            out.push_str(&entry);
            out.push('\n');
        }
    }
    out
}

/// Inserts `entry` above the newest release in `path`, creating the file
/// with a standard header when it does not exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written.
pub fn prepend_changelog(path: &Path, entry: &str) -> Result<()> {
    let entry = entry.trim_end();
    if !path.exists() {
        fs::write(path, format!("{}\n{}\n", HEADER, entry))?;
        return Ok(());
    }

    let existing = fs::read_to_string(path)?;
    let insert_at = existing
        .match_indices("## [")
        .find(|(i, _)| *i == 0 || existing.as_bytes()[i - 1] == b'\n')
        .map(|(i, _)| i);

    let updated = match insert_at {
        Some(i) => format!("{}{}\n\n{}", &existing[..i], entry, &existing[i..]),
        None => format!("{}\n\n{}\n", existing.trim_end(), entry),
    };
    fs::write(path, updated)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(message: &str, sha: &str) -> ConventionalCommit {
        ConventionalCommit::parse(message).unwrap().with_sha(sha)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn test_entry_sections() {
        let commits = vec![
            commit("feat(api): add search", "abcdef1234"),
            commit("fix: handle empty input", "1234567890"),
            commit("docs: update readme", "fffffff000"),
            commit("feat!: remove v1 routes\n\nBREAKING CHANGE: v1 is gone", "0000000aaa"),
        ];
        let entry = changelog_entry("api", "2.0.0", &commits, date());

        assert!(entry.starts_with("## [api@2.0.0] - 2026-03-14\n"));
        assert!(entry.contains("### BREAKING CHANGES\n\n- remove v1 routes (0000000)\n  - v1 is gone\n"));
        assert!(entry.contains("### Features\n\n- **api:** add search (abcdef1)\n"));
        assert!(entry.contains("### Bug Fixes\n\n- handle empty input (1234567)\n"));
        assert!(!entry.contains("readme"));
        assert!(entry.find("BREAKING").unwrap() < entry.find("Features").unwrap());
    }

    #[test]
    fn test_prepend_creates_file_with_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CHANGELOG_FILE);
        prepend_changelog(&path, "## [core@1.0.1] - 2026-03-14\n").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Changelog\n"));
        assert!(content.ends_with("## [core@1.0.1] - 2026-03-14\n"));
    }

    #[test]
    fn test_prepend_goes_above_latest_release() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CHANGELOG_FILE);
        fs::write(&path, "# Changelog\n\nIntro.\n\n## [core@1.0.0] - 2026-01-01\n\n- first\n").unwrap();

        prepend_changelog(&path, "## [core@1.1.0] - 2026-03-14\n\n- second\n").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "# Changelog\n\nIntro.\n\n## [core@1.1.0] - 2026-03-14\n\n- second\n\n## [core@1.0.0] - 2026-01-01\n\n- first\n"
        );
    }
}
