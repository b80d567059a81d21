//! Commit range resolution.
//!
//! Two strategies decide which commits belong to a release:
//!
//! - [`RangeStrategy::SinceLastRelease`] walks the branch history back to the
//!   commit date of the latest tag (or the repository creation date when no
//!   tag exists).
//! - [`RangeStrategy::PullRequest`] takes the commits of the pull request
//!   associated with the branch.
//!
//! Both drain a cursor-paginated listing through [`Pages`]. Pages are
//! fetched one after another; a page is only requested once the previous
//! page's cursor is known, and the first failed page aborts the resolution.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::provider::{
    CommitHistory, Paginated, ProviderError, ProviderResult, RawCommit, RepoRef, TagLookup,
};

/// Number of commits requested per page.
pub const PAGE_SIZE: usize = 100;

/// Errors from range resolution.
#[derive(Error, Debug)]
pub enum RangeError {
    /// Both strategies were requested at once.
    #[error("choose either since-last-release or pull-request, not both")]
    AmbiguousStrategy,

    /// The pull request associated with the branch has no commits.
    #[error("pull request #{number} for branch {branch} has no commits")]
    EmptyPullRequest {
        /// The branch the pull request was resolved from.
        branch: String,
        /// The pull request number.
        number: u64,
    },

    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result alias for range resolution.
pub type RangeResult<T> = Result<T, RangeError>;

/// Which commits make up a release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeStrategy {
    /// Commits on the branch since the latest tag.
    #[default]
    SinceLastRelease,
    /// Commits of the pull request associated with the branch.
    PullRequest,
}

impl RangeStrategy {
    /// Pick a strategy from a pair of mutually exclusive flags.
    ///
    /// Neither flag selects [`RangeStrategy::SinceLastRelease`].
    pub const fn from_flags(since_last_release: bool, pull_request: bool) -> RangeResult<Self> {
        match (since_last_release, pull_request) {
            (true, true) => Err(RangeError::AmbiguousStrategy),
            (_, true) => Ok(Self::PullRequest),
            _ => Ok(Self::SinceLastRelease),
        }
    }
}

impl fmt::Display for RangeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SinceLastRelease => write!(f, "since-last-release"),
            Self::PullRequest => write!(f, "pull-request"),
        }
    }
}

/// Lazy iterator over cursor-paginated pages.
///
/// `fetch` is called with `None` for the first page and with the previous
/// page's cursor afterwards. Iteration ends after the page without a cursor
/// or after the first error. A cursor that was already handed out is
/// reported as an error instead of looping.
pub struct Pages<P, F> {
    fetch: F,
    next: Option<Option<String>>,
    seen: HashSet<String>,
    _page: PhantomData<fn() -> P>,
}

impl<P, F> Pages<P, F>
where
    P: Paginated,
    F: FnMut(Option<&str>) -> ProviderResult<P>,
{
    /// Start paginating from the first page.
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            next: Some(None),
            seen: HashSet::new(),
            _page: PhantomData,
        }
    }
}

impl<P, F> Iterator for Pages<P, F>
where
    P: Paginated,
    F: FnMut(Option<&str>) -> ProviderResult<P>,
{
    type Item = ProviderResult<P>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.next.take()?;
        let page = match (self.fetch)(cursor.as_deref()) {
            Ok(page) => page,
            Err(e) => return Some(Err(e)),
        };

        if let Some(next) = page.next_cursor() {
            if !self.seen.insert(next.to_string()) {
                return Some(Err(ProviderError::Decode(format!(
                    "cursor {next} did not advance"
                ))));
            }
            self.next = Some(Some(next.to_string()));
        }
        Some(Ok(page))
    }
}

/// Commits selected for a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRange {
    /// Strategy that produced the range.
    pub strategy: RangeStrategy,
    /// De-duplicated commits in fetch order.
    pub commits: Vec<RawCommit>,
    /// Total the provider reported for the listing.
    pub reported_total: u64,
    /// Lower time bound, for [`RangeStrategy::SinceLastRelease`].
    pub boundary: Option<DateTime<Utc>>,
    /// Pull request number, for [`RangeStrategy::PullRequest`].
    pub pull_request: Option<u64>,
    /// Commits seen more than once across pages.
    pub duplicates: usize,
    /// Commits dropped for predating the boundary.
    pub before_boundary: usize,
}

impl CommitRange {
    /// Whether the provider's total disagrees with what was collected.
    pub fn count_mismatch(&self) -> bool {
        self.reported_total != self.commits.len() as u64
    }
}

/// Outcome of range resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ResolvedRange {
    /// The branch has no commits since the boundary.
    Empty {
        /// The boundary that was searched from.
        boundary: DateTime<Utc>,
    },
    /// Commits were found.
    Commits(CommitRange),
}

impl ResolvedRange {
    /// The resolved commits; empty for [`ResolvedRange::Empty`].
    pub fn commits(&self) -> &[RawCommit] {
        match self {
            Self::Empty { .. } => &[],
            Self::Commits(range) => &range.commits,
        }
    }

    /// Consume the range and return its commits.
    pub fn into_commits(self) -> Vec<RawCommit> {
        match self {
            Self::Empty { .. } => Vec::new(),
            Self::Commits(range) => range.commits,
        }
    }
}

/// Resolve the commits of a release with the given strategy.
pub fn resolve_range<P>(
    provider: &P,
    repo: &RepoRef,
    branch: &str,
    strategy: RangeStrategy,
) -> RangeResult<ResolvedRange>
where
    P: TagLookup + CommitHistory + ?Sized,
{
    match strategy {
        RangeStrategy::SinceLastRelease => resolve_since_last_release(provider, repo, branch),
        RangeStrategy::PullRequest => resolve_pull_request(provider, repo, branch),
    }
}

/// Commits on `branch` since the latest tag, or since the repository was
/// created when there is no tag yet.
#[instrument(skip(provider), fields(%repo))]
pub fn resolve_since_last_release<P>(
    provider: &P,
    repo: &RepoRef,
    branch: &str,
) -> RangeResult<ResolvedRange>
where
    P: TagLookup + CommitHistory + ?Sized,
{
    let boundary = match provider.latest_tag(repo)? {
        Some(tag) => {
            let at = provider.tag_committed_at(repo, &tag)?;
            debug!(%tag, %at, "boundary from latest tag");
            at
        }
        None => {
            let at = provider.repo_created_at(repo)?;
            debug!(%at, "no tag yet, boundary from repository creation");
            at
        }
    };

    let mut collector = Collector::new(Some(boundary));
    let mut reported_total = None;
    for page in Pages::new(|cursor| provider.commit_history(repo, branch, boundary, cursor)) {
        let page = page?;
        let total = *reported_total.get_or_insert(page.total_count);
        if total == 0 {
            debug!(%branch, %boundary, "provider reports no commits since boundary");
            return Ok(ResolvedRange::Empty { boundary });
        }
        collector.extend(page.items);
    }

    let range = collector.finish(
        RangeStrategy::SinceLastRelease,
        reported_total.unwrap_or_default(),
        None,
    );
    if range.commits.is_empty() {
        warn!(%branch, %boundary, "all listed commits predate the boundary");
        return Ok(ResolvedRange::Empty { boundary });
    }
    Ok(ResolvedRange::Commits(range))
}

/// Commits of the first pull request associated with `branch`.
#[instrument(skip(provider), fields(%repo))]
pub fn resolve_pull_request<P>(
    provider: &P,
    repo: &RepoRef,
    branch: &str,
) -> RangeResult<ResolvedRange>
where
    P: CommitHistory + ?Sized,
{
    let mut collector = Collector::new(None);
    let mut number = None;
    let mut reported_total = 0;
    for page in Pages::new(|cursor| provider.pull_request_commits(repo, branch, cursor)) {
        let page = page?;
        let first = *number.get_or_insert(page.number);
        if first != page.number {
            return Err(ProviderError::Decode(format!(
                "pull request changed from #{first} to #{} while paginating",
                page.number
            ))
            .into());
        }
        reported_total = page.page.total_count;
        collector.extend(page.page.items);
    }

    let number = number.unwrap_or_default();
    let range = collector.finish(RangeStrategy::PullRequest, reported_total, Some(number));
    if range.commits.is_empty() {
        return Err(RangeError::EmptyPullRequest {
            branch: branch.to_string(),
            number,
        });
    }
    Ok(ResolvedRange::Commits(range))
}

/// Accumulates pages, de-duplicating by identity and enforcing the boundary.
struct Collector {
    boundary: Option<DateTime<Utc>>,
    seen: HashSet<String>,
    commits: Vec<RawCommit>,
    duplicates: usize,
    before_boundary: usize,
}

impl Collector {
    fn new(boundary: Option<DateTime<Utc>>) -> Self {
        Self {
            boundary,
            seen: HashSet::new(),
            commits: Vec::new(),
            duplicates: 0,
            before_boundary: 0,
        }
    }

    fn extend(&mut self, items: Vec<RawCommit>) {
        debug!(count = items.len(), "received page");
        for commit in items {
            if let (Some(boundary), Some(at)) = (self.boundary, commit.committed_at)
                && at < boundary
            {
                self.before_boundary += 1;
                continue;
            }
            if !self.seen.insert(commit.identity().to_string()) {
                self.duplicates += 1;
                continue;
            }
            self.commits.push(commit);
        }
    }

    fn finish(
        self,
        strategy: RangeStrategy,
        reported_total: u64,
        pull_request: Option<u64>,
    ) -> CommitRange {
        let range = CommitRange {
            strategy,
            commits: self.commits,
            reported_total,
            boundary: self.boundary,
            pull_request,
            duplicates: self.duplicates,
            before_boundary: self.before_boundary,
        };
        if range.count_mismatch() {
            warn!(
                reported = range.reported_total,
                collected = range.commits.len(),
                duplicates = range.duplicates,
                before_boundary = range.before_boundary,
                "provider total does not match collected commits"
            );
        }
        info!(%strategy, commits = range.commits.len(), "resolved commit range");
        range
    }
}
