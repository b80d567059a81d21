//! Release orchestration.
//!
//! Ties the pieces together: resolve the commit range, render the changelog,
//! derive the next tag and, unless told otherwise, create the release on the
//! hosting platform.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::changelog::{Changelog, EmptyReason, assemble};
use crate::commit::{ParserOptions, parse_commits};
use crate::config::ReleaseConfig;
use crate::error::ConfigError;
use crate::provider::{
    CommitHistory, ProviderError, PublishedRelease, ReleasePublisher, ReleaseRequest, RepoRef,
    TagLookup,
};
use crate::range::{RangeError, RangeStrategy, ResolvedRange, resolve_range};
use crate::version::{BumpPolicy, InitialTags, NextVersion, VersionError, resolve_next_version};

/// Errors from release operations.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Invalid or missing configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Commit range resolution failed.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// Version derivation failed.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Coarse classification of failures, used for process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad configuration or input (exit code 2).
    Configuration,
    /// A branch, tag or pull request does not exist (exit code 3).
    NotFound,
    /// The latest tag cannot be parsed or bumped (exit code 4).
    MalformedTag,
    /// The hosting platform or a tool failed (exit code 1).
    Provider,
}

impl ErrorKind {
    /// Process exit code for this kind.
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Provider => 1,
            Self::Configuration => 2,
            Self::NotFound => 3,
            Self::MalformedTag => 4,
        }
    }
}

impl ReleaseError {
    /// Classify the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Range(e) => range_kind(e),
            Self::Version(e) => version_kind(e),
            Self::Provider(e) => provider_kind(e),
        }
    }
}

const fn provider_kind(error: &ProviderError) -> ErrorKind {
    match error {
        ProviderError::BranchNotFound { .. }
        | ProviderError::NoPullRequest { .. }
        | ProviderError::TagNotFound { .. } => ErrorKind::NotFound,
        ProviderError::MissingTool { .. }
        | ProviderError::Exec { .. }
        | ProviderError::Command { .. }
        | ProviderError::GraphQl(_)
        | ProviderError::Decode(_) => ErrorKind::Provider,
    }
}

const fn range_kind(error: &RangeError) -> ErrorKind {
    match error {
        RangeError::AmbiguousStrategy => ErrorKind::Configuration,
        RangeError::EmptyPullRequest { .. } => ErrorKind::NotFound,
        RangeError::Provider(e) => provider_kind(e),
    }
}

const fn version_kind(error: &VersionError) -> ErrorKind {
    match error {
        VersionError::UnknownBranch { .. } => ErrorKind::Configuration,
        VersionError::MalformedTag { .. } | VersionError::Overflow { .. } => {
            ErrorKind::MalformedTag
        }
        VersionError::Provider(e) => provider_kind(e),
    }
}

/// Classify any error by the first tagsmith error found in its source chain.
///
/// Errors that carry no tagsmith error are treated as provider failures.
pub fn classify(error: &(dyn std::error::Error + 'static)) -> ErrorKind {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(e) = err.downcast_ref::<ReleaseError>() {
            return e.kind();
        }
        if err.downcast_ref::<ConfigError>().is_some() {
            return ErrorKind::Configuration;
        }
        if let Some(e) = err.downcast_ref::<RangeError>() {
            return range_kind(e);
        }
        if let Some(e) = err.downcast_ref::<VersionError>() {
            return version_kind(e);
        }
        if let Some(e) = err.downcast_ref::<ProviderError>() {
            return provider_kind(e);
        }
        current = err.source();
    }
    ErrorKind::Provider
}

/// What to put in a changelog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogOptions {
    /// Branch whose history is read.
    pub source_branch: String,
    /// How the commit range is chosen.
    pub strategy: RangeStrategy,
    /// Render commit bodies under each entry.
    pub with_description: bool,
    /// Commit message parser switches.
    pub parser: ParserOptions,
}

/// A changelog together with how it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogReport {
    /// Strategy used to pick commits.
    pub strategy: RangeStrategy,
    /// Number of commits in the resolved range.
    pub commits: usize,
    /// The rendered changelog or the reason it is empty.
    pub changelog: Changelog,
}

impl ChangelogReport {
    /// The Markdown text; empty when nothing was rendered.
    pub fn markdown(&self) -> &str {
        self.changelog.markdown()
    }
}

/// Resolve the commit range and render its changelog.
///
/// Empty outcomes are logged at warning level and returned as values.
#[instrument(skip(provider, options), fields(%repo, branch = %options.source_branch, strategy = %options.strategy))]
pub fn resolve_changelog<P>(
    provider: &P,
    repo: &RepoRef,
    options: &ChangelogOptions,
) -> ReleaseResult<ChangelogReport>
where
    P: TagLookup + CommitHistory + ?Sized,
{
    let range = resolve_range(provider, repo, &options.source_branch, options.strategy)?;

    let changelog = match &range {
        ResolvedRange::Empty { boundary } => {
            warn!(%boundary, "No commits found since {boundary}. Returning empty changelog!");
            Changelog::empty(EmptyReason::NoCommits)
        }
        ResolvedRange::Commits(found) => {
            let parsed = parse_commits(&found.commits, options.parser);
            let changelog = assemble(&parsed, options.with_description);
            if let Some(reason) = changelog.empty_reason() {
                warn!(%reason, "No conventional commits found. Returning empty changelog!");
            }
            changelog
        }
    };

    Ok(ChangelogReport {
        strategy: options.strategy,
        commits: range.commits().len(),
        changelog,
    })
}

/// How the next version is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionOptions {
    /// Branch the release targets.
    pub target: String,
    /// Branch to bump-level mapping.
    pub policy: BumpPolicy,
    /// First-release tags.
    pub initial: InitialTags,
}

/// Everything needed to create a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleasePlan {
    /// Repository the release belongs to.
    pub repository: RepoRef,
    /// The derived version.
    pub version: NextVersion,
    /// The changelog that becomes the release body.
    pub changelog: ChangelogReport,
    /// Release creation settings.
    #[serde(skip)]
    pub settings: ReleaseConfig,
}

/// Derive the next tag and the changelog for a release.
///
/// The target branch is checked before any commit is fetched.
#[instrument(skip_all, fields(%repo, target = %version.target))]
pub fn plan_release<P>(
    provider: &P,
    repo: &RepoRef,
    changelog: &ChangelogOptions,
    version: &VersionOptions,
    settings: &ReleaseConfig,
) -> ReleaseResult<ReleasePlan>
where
    P: TagLookup + CommitHistory + ?Sized,
{
    let next = resolve_next_version(
        provider,
        repo,
        &version.target,
        &version.policy,
        &version.initial,
    )?;
    let report = resolve_changelog(provider, repo, changelog)?;

    info!(tag = %next.next, commits = report.commits, "release planned");
    Ok(ReleasePlan {
        repository: repo.clone(),
        version: next,
        changelog: report,
        settings: settings.clone(),
    })
}

/// What happened when a plan was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseOutcome {
    /// The plan that was executed.
    #[serde(flatten)]
    pub plan: ReleasePlan,
    /// The created release, when one was created.
    pub published: Option<PublishedRelease>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl ReleasePlan {
    /// The request that creates this release.
    pub fn request(&self) -> ReleaseRequest {
        ReleaseRequest {
            tag: self.version.next.clone(),
            name: self.version.next.name.clone(),
            body: self.changelog.markdown().to_string(),
            draft: self.settings.draft,
            prerelease: self.settings.prerelease,
        }
    }

    /// Create the release, unless `dry_run` is set or creation is disabled.
    #[instrument(skip(self, publisher), fields(repo = %self.repository, tag = %self.version.next))]
    pub fn execute<R: ReleasePublisher + ?Sized>(
        self,
        publisher: &R,
        dry_run: bool,
    ) -> ReleaseResult<ReleaseOutcome> {
        let published = if dry_run {
            info!("dry run, not creating release");
            None
        } else if !self.settings.create {
            info!("release creation disabled");
            None
        } else {
            Some(publisher.create_release(&self.repository, &self.request())?)
        };

        Ok(ReleaseOutcome {
            plan: self,
            published,
            dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::PullRequestPage;
    use crate::provider::testing::{ScriptedProvider, commit, page};

    fn repo() -> RepoRef {
        RepoRef::new("acme", "widgets")
    }

    fn changelog_options() -> ChangelogOptions {
        ChangelogOptions {
            source_branch: "main".into(),
            strategy: RangeStrategy::SinceLastRelease,
            with_description: false,
            parser: ParserOptions::default(),
        }
    }

    fn version_options(target: &str) -> VersionOptions {
        VersionOptions {
            target: target.into(),
            policy: BumpPolicy::new("release", "main", "support").unwrap(),
            initial: InitialTags::default(),
        }
    }

    fn provider() -> ScriptedProvider {
        ScriptedProvider::new()
            .with_tag("v1.4.9", "2024-03-01T00:00:00Z")
            .with_history_page(
                None,
                page(
                    3,
                    vec![
                        commit("a", "feat: cursor pagination"),
                        commit("b", "fix: handle empty pages"),
                        commit("c", "update readme"),
                    ],
                    None,
                ),
            )
    }

    #[test]
    fn changelog_from_history() {
        let report = resolve_changelog(&provider(), &repo(), &changelog_options()).unwrap();
        assert_eq!(report.commits, 3);
        assert_eq!(
            report.markdown(),
            "## Features\n\n\
             * [cursor pagination](https://github.com/acme/widgets/commit/a)\n\
             \n\n\
             ## Bug Fixes\n\n\
             * [handle empty pages](https://github.com/acme/widgets/commit/b)\n\
             \n\n"
        );
    }

    #[test]
    fn empty_history_is_empty_changelog() {
        let provider = ScriptedProvider::new()
            .with_tag("v1.4.9", "2024-03-01T00:00:00Z")
            .with_history_page(None, page(0, vec![], None));
        let report = resolve_changelog(&provider, &repo(), &changelog_options()).unwrap();
        assert_eq!(report.markdown(), "");
        assert_eq!(
            report.changelog.empty_reason(),
            Some(EmptyReason::NoCommits)
        );
    }

    #[test]
    fn untyped_history_is_empty_changelog() {
        let provider = ScriptedProvider::new().with_history_page(
            None,
            page(
                2,
                vec![commit("a", "wip"), commit("b", "Merge branch 'x'")],
                None,
            ),
        );
        let report = resolve_changelog(&provider, &repo(), &changelog_options()).unwrap();
        assert_eq!(report.markdown(), "");
        assert_eq!(
            report.changelog.empty_reason(),
            Some(EmptyReason::NoConventionalCommits { excluded: 2 })
        );
    }

    #[test]
    fn pull_request_strategy_ignores_tags() {
        let provider = ScriptedProvider::new().with_pull_request_page(
            None,
            PullRequestPage {
                number: 12,
                page: page(1, vec![commit("p", "perf: faster")], None),
            },
        );
        let options = ChangelogOptions {
            strategy: RangeStrategy::PullRequest,
            ..changelog_options()
        };
        let report = resolve_changelog(&provider, &repo(), &options).unwrap();
        assert!(report.markdown().starts_with("## Performance\n\n"));
        assert!(!provider.calls().iter().any(|c| c.contains("tag")));
    }

    #[test]
    fn plan_and_execute_creates_release() {
        let provider = provider();
        let plan = plan_release(
            &provider,
            &repo(),
            &changelog_options(),
            &version_options("main"),
            &ReleaseConfig::default(),
        )
        .unwrap();
        assert_eq!(plan.version.next.name, "v1.5.0");

        let outcome = plan.execute(&provider, false).unwrap();
        let published = provider.published.borrow();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].tag.name, "v1.5.0");
        assert_eq!(published[0].name, "v1.5.0");
        assert_eq!(published[0].body, outcome.plan.changelog.markdown());
        assert!(!published[0].draft);
        assert!(outcome.published.is_some());
    }

    #[test]
    fn dry_run_does_not_publish() {
        let provider = provider();
        let plan = plan_release(
            &provider,
            &repo(),
            &changelog_options(),
            &version_options("support"),
            &ReleaseConfig::default(),
        )
        .unwrap();
        let outcome = plan.execute(&provider, true).unwrap();
        assert!(outcome.published.is_none());
        assert!(provider.published.borrow().is_empty());
        assert_eq!(outcome.plan.version.next.name, "v1.4.10");
    }

    #[test]
    fn disabled_creation_does_not_publish() {
        let provider = provider();
        let settings = ReleaseConfig {
            create: false,
            ..ReleaseConfig::default()
        };
        let plan = plan_release(
            &provider,
            &repo(),
            &changelog_options(),
            &version_options("release"),
            &settings,
        )
        .unwrap();
        plan.execute(&provider, false).unwrap();
        assert!(provider.published.borrow().is_empty());
    }

    #[test]
    fn unknown_target_fails_before_fetching() {
        let provider = provider();
        let err = plan_release(
            &provider,
            &repo(),
            &changelog_options(),
            &version_options("hotfix"),
            &ReleaseConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "unknown target branch: hotfix");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn error_kinds_map_to_exit_codes() {
        let not_found: ReleaseError = RangeError::Provider(ProviderError::BranchNotFound {
            branch: "x".into(),
        })
        .into();
        assert_eq!(not_found.kind().exit_code(), 3);

        let malformed: ReleaseError = VersionError::MalformedTag {
            tag: "nightly".into(),
            reason: "bad".into(),
        }
        .into();
        assert_eq!(malformed.kind().exit_code(), 4);

        let config: ReleaseError = ConfigError::MissingInput("repository").into();
        assert_eq!(config.kind().exit_code(), 2);

        let provider: ReleaseError = ProviderError::GraphQl("boom".into()).into();
        assert_eq!(provider.kind().exit_code(), 1);

        let ambiguous: ReleaseError = RangeError::AmbiguousStrategy.into();
        assert_eq!(ambiguous.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn classify_walks_plain_errors() {
        let err = VersionError::UnknownBranch {
            branch: "hotfix".into(),
        };
        assert_eq!(classify(&err), ErrorKind::Configuration);

        let io = std::io::Error::other("disk");
        assert_eq!(classify(&io), ErrorKind::Provider);
    }

    #[test]
    fn outcome_serializes_plan_fields() {
        let provider = provider();
        let outcome = plan_release(
            &provider,
            &repo(),
            &changelog_options(),
            &version_options("main"),
            &ReleaseConfig::default(),
        )
        .unwrap()
        .execute(&provider, true)
        .unwrap();

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["version"]["next"], "v1.5.0");
        assert_eq!(json["version"]["previous"], "v1.4.9");
        assert_eq!(json["version"]["level"], "minor");
        assert_eq!(json["repository"]["owner"], "acme");
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["changelog"]["changelog"]["status"], "rendered");
    }
}
