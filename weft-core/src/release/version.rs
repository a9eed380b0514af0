//! Version arithmetic and manifest rewriting.

use std::fs;
use std::path::Path;

use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};

use super::commits::BumpType;
use crate::error::{Error, Result};

/// Applies `bump` to `current`. With a prerelease tag the result is the
/// first prerelease of the bumped version, e.g. `1.3.0-beta.1`.
///
/// # Errors
///
/// Returns [`Error::Release`] for a tag that is not a valid semver
/// prerelease identifier.
pub fn bump_version(current: &Version, bump: BumpType, prerelease: Option<&str>) -> Result<Version> {
    let mut next = match bump {
        BumpType::None => return Ok(current.clone()),
        BumpType::Major => Version::new(current.major + 1, 0, 0),
        BumpType::Minor => Version::new(current.major, current.minor + 1, 0),
        BumpType::Patch => Version::new(current.major, current.minor, current.patch + 1),
    };
    if let Some(tag) = prerelease.map(str::trim).filter(|t| !t.is_empty()) {
        next.pre = Prerelease::new(&format!("{}.1", tag))
            .map_err(|e| Error::Release(format!("invalid prerelease tag '{}': {}", tag, e)))?;
    }
    next.build = BuildMetadata::EMPTY;
    Ok(next)
}

/// # Errors
///
/// Returns [`Error::Release`] naming the package when `version` is not
/// valid semver.
pub fn parse_version(package: &str, version: &str) -> Result<Version> {
    Version::parse(version)
        .map_err(|e| Error::Release(format!("{} has invalid version '{}': {}", package, version, e)))
}

/// Rewrites the `version` key of the `[package]` table in a manifest,
/// adding it under the header when absent. Everything else in the file is
/// left untouched.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written, or has no
/// `[package]` table.
pub fn set_manifest_version(manifest: &Path, version: &str) -> Result<()> {
    let content = fs::read_to_string(manifest)?;
    let regex_error = |e: regex::Error| Error::Release(format!("failed to build version pattern: {}", e));

    let header = Regex::new(r"(?m)^[ \t]*\[package\][ \t]*$").map_err(regex_error)?;
    let Some(found) = header.find(&content) else {
        return Err(Error::Config {
            path: manifest.to_path_buf(),
            message: "no [package] table to update".to_string(),
        });
    };

    let next_table = Regex::new(r"(?m)^[ \t]*\[").map_err(regex_error)?;
    let body_start = found.end();
    let body_end = next_table
        .find_at(&content, body_start)
        .map(|m| m.start())
        .unwrap_or(content.len());
    let body = &content[body_start..body_end];

    let version_line = Regex::new(r#"(?m)^([ \t]*version[ \t]*=[ \t]*)"[^"\n]*""#).map_err(regex_error)?;
    let updated_body = if version_line.is_match(body) {
        version_line
            .replace(body, |caps: &regex::Captures<'_>| format!("{}\"{}\"", &caps[1], version))
            .into_owned()
    } else {
        format!("\nversion = \"{}\"{}", version, body)
    };

    let updated = format!("{}{}{}", &content[..body_start], updated_body, &content[body_end..]);
    fs::write(manifest, updated)?;
    Ok(())
}
