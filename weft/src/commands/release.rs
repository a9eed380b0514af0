//! Release and workspace scaffolding commands.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, ValueEnum};
use owo_colors::OwoColorize;
use weft_core::{init_workspace, BumpType, PackageRelease, ReleaseEngine, ReleaseOptions, ReleaseReporter};

use crate::formatting::{
    print_key_value, print_release_table, print_section_header, print_success, SectionStyle,
};

use super::load_workspace;

/// CLI implementation of ReleaseReporter.
pub struct CliReleaseReporter;

impl ReleaseReporter for CliReleaseReporter {
    fn report_bump(&self, release: &PackageRelease, dry_run: bool) {
        if dry_run {
            println!(
                "  {} would bump {} from {} to {}",
                "[dry run]".bright_black(),
                release.name.bold(),
                release.old_version,
                release.new_version.cyan()
            );
        } else {
            print_success(&format!(
                "Bumped {} from {} to {}",
                release.name, release.old_version, release.new_version
            ));
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BumpArg {
    Major,
    Minor,
    Patch,
}

impl From<BumpArg> for BumpType {
    fn from(arg: BumpArg) -> Self {
        match arg {
            BumpArg::Major => BumpType::Major,
            BumpArg::Minor => BumpType::Minor,
            BumpArg::Patch => BumpType::Patch,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReleaseArgs {
    /// Comma-separated name globs of packages to consider
    #[arg(long)]
    pub scope: Option<String>,

    /// Force this bump instead of reading it from commit messages
    #[arg(long, value_enum)]
    pub bump: Option<BumpArg>,

    /// Prerelease identifier, e.g. "beta" gives 1.2.0-beta.1
    #[arg(long)]
    pub prerelease: Option<String>,

    /// Show the plan without changing anything
    #[arg(long, action)]
    pub dry_run: bool,

    #[arg(long, action)]
    pub no_changelog: bool,

    #[arg(long, action)]
    pub no_commit: bool,

    #[arg(long, action)]
    pub no_git_tag: bool,

    #[arg(long, action)]
    pub json: bool,
}

impl ReleaseArgs {
    pub fn to_options(&self) -> ReleaseOptions {
        ReleaseOptions {
            scope: self.scope.clone(),
            bump: self.bump.map(Into::into),
            prerelease: self.prerelease.clone(),
            dry_run: self.dry_run,
            no_changelog: self.no_changelog,
            no_commit: self.no_commit,
            no_git_tag: self.no_git_tag,
        }
    }
}

pub fn cmd_release(config: Option<&Path>, args: &ReleaseArgs) -> Result<()> {
    let workspace = load_workspace(config)?;
    let engine = ReleaseEngine::new(&workspace, args.to_options());
    let plan = engine.plan()?;

    if args.json {
        let outcome = engine.execute(&plan)?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let title = if args.dry_run {
        "Release Plan (Dry Run)"
    } else {
        "Release Plan"
    };
    print_section_header(title, SectionStyle::Primary);

    if plan.is_empty() {
        print_success("No packages need a release");
        println!();
        return Ok(());
    }

    print_key_value("Packages to release", &plan.releases.len().to_string());
    println!();
    print_release_table(&plan.releases);
    println!();

    let outcome = engine.with_reporter(CliReleaseReporter).execute(&plan)?;

    if !outcome.dry_run {
        if let Some(commit) = &outcome.commit {
            print_key_value("Commit", &commit[..commit.len().min(7)]);
        }
        if !outcome.tags.is_empty() {
            print_key_value("Tags", &outcome.tags.join(", "));
        }
        print_success("Release completed successfully");
    }
    println!();

    Ok(())
}

pub fn cmd_init(path: Option<PathBuf>, name: Option<&str>) -> Result<()> {
    let dir = match path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let config = init_workspace(&dir, name)?;

    print_section_header("Workspace Initialized", SectionStyle::Success);
    print_key_value("Name", &config.display_name());
    print_key_value("Config", &config.path.display().to_string());
    println!();
    println!(
        "  Add packages under {} with a {} containing a [package] table.",
        "packages/".cyan(),
        "weft.toml".cyan()
    );
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_args_to_options() {
        let args = ReleaseArgs {
            scope: Some("api-*".to_string()),
            bump: Some(BumpArg::Minor),
            prerelease: Some("beta".to_string()),
            dry_run: true,
            no_git_tag: true,
            ..Default::default()
        };
        let options = args.to_options();
        assert_eq!(options.scope.as_deref(), Some("api-*"));
        assert_eq!(options.bump, Some(BumpType::Minor));
        assert_eq!(options.prerelease.as_deref(), Some("beta"));
        assert!(options.dry_run);
        assert!(options.no_git_tag);
        assert!(!options.no_commit);
        assert_eq!(ReleaseArgs::default().to_options(), ReleaseOptions::default());
    }
}
