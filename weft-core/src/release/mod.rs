//! Versioned releases driven by conventional commits.
//!
//! Each package is released on its own: commits since its latest
//! `name@version` tag decide the bump, the manifest version and changelog
//! are updated, then a single release commit and an annotated tag per
//! package record the result.

mod changelog;
mod commits;
mod git;
mod version;

use std::path::PathBuf;

use chrono::NaiveDate;
use git2::Repository;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::CONFIG_FILE;
use crate::error::{Error, Result};
use crate::filter::filter_by_scope;
use crate::workspace::Workspace;

pub use changelog::{changelog_entry, prepend_changelog, CHANGELOG_FILE};
pub use commits::{determine_bump, BumpType, ConventionalCommit};
pub use git::{commits_touching, latest_package_tag, tag_name, CommitInfo};
pub use version::{bump_version, parse_version, set_manifest_version};

/// Reports release steps without the core writing to stdout.
pub trait ReleaseReporter: Send + Sync {
    fn report_bump(&self, release: &PackageRelease, dry_run: bool);
}

struct SilentReporter;

impl ReleaseReporter for SilentReporter {
    fn report_bump(&self, _release: &PackageRelease, _dry_run: bool) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseOptions {
    /// Comma-separated name globs limiting which packages are considered.
    pub scope: Option<String>,
    /// Forces this bump instead of deriving it from commits.
    pub bump: Option<BumpType>,
    /// Prerelease identifier such as `beta`, giving `x.y.z-beta.1`.
    pub prerelease: Option<String>,
    pub dry_run: bool,
    pub no_changelog: bool,
    pub no_commit: bool,
    pub no_git_tag: bool,
}

/// One package's planned release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRelease {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub old_version: String,
    pub new_version: String,
    pub bump: BumpType,
    pub tag: String,
    /// Short hashes of the commits included.
    pub commits: Vec<String>,
    pub changelog: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleasePlan {
    pub releases: Vec<PackageRelease>,
}

impl ReleasePlan {
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// `name@version` list used in the release commit message.
    pub fn summary(&self) -> String {
        self.releases
            .iter()
            .map(|r| format!("{}@{}", r.name, r.new_version))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// What a release run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseOutcome {
    pub releases: Vec<PackageRelease>,
    pub commit: Option<String>,
    pub tags: Vec<String>,
    pub dry_run: bool,
}

/// Plans and applies releases for a workspace inside a git repository.
pub struct ReleaseEngine<'a> {
    workspace: &'a Workspace,
    options: ReleaseOptions,
    date: NaiveDate,
    reporter: Box<dyn ReleaseReporter + 'a>,
}

impl<'a> ReleaseEngine<'a> {
    pub fn new(workspace: &'a Workspace, options: ReleaseOptions) -> Self {
        Self {
            workspace,
            options,
            date: chrono::Utc::now().date_naive(),
            reporter: Box::new(SilentReporter),
        }
    }

    pub fn with_reporter<R: ReleaseReporter + 'a>(mut self, reporter: R) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Date written into changelog headers. Defaults to today, UTC.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn options(&self) -> &ReleaseOptions {
        &self.options
    }

    fn repository(&self) -> Result<(Repository, PathBuf)> {
        let repo = Repository::discover(self.workspace.root())?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| Error::Git("repository has no working directory".to_string()))?;
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
        Ok((repo, workdir))
    }

    /// Works out which packages need a release and what their new
    /// versions are. Nothing on disk changes.
    ///
    /// A package is skipped when no commit touched it since its last tag,
    /// when none of those commits calls for a bump, or when it was never
    /// tagged and has only its initial commit (unless a scope selects it).
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid scope, an invalid current version,
    /// or when git history cannot be read.
    pub fn plan(&self) -> Result<ReleasePlan> {
        let (repo, workdir) = self.repository()?;
        let mut packages = self.workspace.packages();
        if let Some(scope) = &self.options.scope {
            packages = filter_by_scope(packages, scope)?;
        }

        let mut releases = Vec::new();
        for package in packages {
            let last_tag = latest_package_tag(&repo, &package.name)?;
            let relative = package.path.strip_prefix(&workdir).map_err(|_| {
                Error::Release(format!(
                    "{} at {} is outside the git repository",
                    package.name,
                    package.path.display()
                ))
            })?;
            let commits = commits_touching(&repo, last_tag.as_ref().map(|(t, _)| t.as_str()), relative)?;

            if commits.is_empty() {
                debug!(package = %package.name, "no commits since last release");
                continue;
            }
            if last_tag.is_none() && commits.len() <= 1 && self.options.scope.is_none() {
                debug!(package = %package.name, "only the initial commit, not released");
                continue;
            }

            let parsed: Vec<ConventionalCommit> = commits
                .iter()
                .filter_map(|c| ConventionalCommit::parse(&c.message).map(|p| p.with_sha(c.sha.clone())))
                .collect();
            let bump = self.options.bump.unwrap_or_else(|| determine_bump(&parsed));
            if bump == BumpType::None {
                debug!(package = %package.name, commits = commits.len(), "no releasable commits");
                continue;
            }

            let current = parse_version(&package.name, &package.version)?;
            let next = bump_version(&current, bump, self.options.prerelease.as_deref())?;
            let new_version = next.to_string();

            releases.push(PackageRelease {
                name: package.name.clone(),
                path: package.path.clone(),
                old_version: current.to_string(),
                tag: tag_name(&package.name, &next),
                commits: commits.iter().map(|c| c.short_sha().to_string()).collect(),
                changelog: changelog_entry(&package.name, &new_version, &parsed, self.date),
                new_version,
                bump,
            });
        }

        Ok(ReleasePlan { releases })
    }

    /// Applies `plan`: manifest versions, changelogs, the release commit
    /// and tags, each step subject to the options. A dry run only reports.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be updated or a git step fails.
    pub fn execute(&self, plan: &ReleasePlan) -> Result<ReleaseOutcome> {
        let dry_run = self.options.dry_run;
        let mut outcome = ReleaseOutcome {
            releases: plan.releases.clone(),
            dry_run,
            ..Default::default()
        };
        if plan.is_empty() {
            return Ok(outcome);
        }

        if dry_run {
            for release in &plan.releases {
                self.reporter.report_bump(release, true);
            }
            return Ok(outcome);
        }

        for release in &plan.releases {
            set_manifest_version(&release.path.join(CONFIG_FILE), &release.new_version)?;
            if !self.options.no_changelog {
                prepend_changelog(&release.path.join(CHANGELOG_FILE), &release.changelog)?;
            }
            self.reporter.report_bump(release, false);
        }

        let (repo, _) = self.repository()?;
        if !self.options.no_commit {
            let oid = git::commit_all(&repo, &format!("chore(release): {}", plan.summary()))?;
            info!(commit = %oid, "release commit created");
            outcome.commit = Some(oid.to_string());
        }
        if !self.options.no_git_tag {
            for release in &plan.releases {
                git::create_tag(&repo, &release.tag, &format!("Release {}", release.tag))?;
                outcome.tags.push(release.tag.clone());
            }
        }
        Ok(outcome)
    }

    /// Plans and executes in one step.
    ///
    /// # Errors
    ///
    /// Returns the first error from planning or execution.
    pub fn release(&self) -> Result<ReleaseOutcome> {
        let plan = self.plan()?;
        self.execute(&plan)
    }
}
