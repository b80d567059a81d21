//! Collaborator interfaces for the hosting platform.
//!
//! The core never talks to a network directly. Everything it needs from
//! the platform that hosts the repository goes through three traits:
//!
//! - [`TagLookup`] for the latest release tag
//! - [`CommitHistory`] for timestamps, branch history and pull request commits
//! - [`ReleasePublisher`] for creating the release object
//!
//! The repository is always passed explicitly as a [`RepoRef`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ConfigError;

/// Errors from hosting-platform calls.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The branch does not resolve to a commit in the repository.
    #[error("branch not found: {branch}")]
    BranchNotFound {
        /// The branch name as given.
        branch: String,
    },

    /// No pull request is associated with the branch.
    #[error("no pull request associated with branch {branch}")]
    NoPullRequest {
        /// The branch name as given.
        branch: String,
    },

    /// A tag reported by the platform could not be resolved to a commit.
    #[error("tag {tag} does not point at a commit")]
    TagNotFound {
        /// The tag name.
        tag: String,
    },

    /// A required command-line tool is not installed.
    #[error("{tool} not found on PATH")]
    MissingTool {
        /// The executable name (e.g., "gh").
        tool: String,
    },

    /// Failed to execute an external tool.
    #[error("failed to run {tool}: {source}")]
    Exec {
        /// The executable name.
        tool: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An external tool returned a non-zero exit code.
    #[error("{command} failed: {stderr}")]
    Command {
        /// The command that failed (e.g., "gh api graphql").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// The platform answered with GraphQL errors.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The platform answered with something we could not decode.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Result alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A repository on the hosting platform, identified as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    /// Account or organization that owns the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Create a repository reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(ConfigError::InvalidRepository(s.to_string())),
        }
    }
}

/// A release tag, e.g. `v1.4.9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag {
    /// The tag name as stored in the ref namespace.
    pub name: String,
}

impl Tag {
    /// Create a tag from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A commit as delivered by the history provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommit {
    /// Commit identity (object id).
    pub oid: String,
    /// Browser URL of the commit; used as the changelog link target.
    pub url: String,
    /// Full commit message.
    pub message: String,
    /// Committer timestamp, when the provider reports one.
    pub committed_at: Option<DateTime<Utc>>,
}

impl RawCommit {
    /// The key used to de-duplicate commits across pages.
    ///
    /// Falls back to the URL for providers that do not report an object id.
    pub fn identity(&self) -> &str {
        if self.oid.is_empty() {
            &self.url
        } else {
            &self.oid
        }
    }
}

/// One page of a cursor-paginated commit listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Total number of commits in the listing, across all pages.
    pub total_count: u64,
    /// Commits on this page.
    pub items: Vec<RawCommit>,
    /// Continuation token; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// One page of a pull request's commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestPage {
    /// The pull request number.
    pub number: u64,
    /// The commits page.
    pub page: Page,
}

/// Anything that carries a continuation cursor.
pub trait Paginated {
    /// The cursor for the following page, if any.
    fn next_cursor(&self) -> Option<&str>;
}

impl Paginated for Page {
    fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }
}

impl Paginated for PullRequestPage {
    fn next_cursor(&self) -> Option<&str> {
        self.page.next_cursor.as_deref()
    }
}

/// Lookup of release tags.
pub trait TagLookup {
    /// The most recently created tag in the repository, if any.
    fn latest_tag(&self, repo: &RepoRef) -> ProviderResult<Option<Tag>>;
}

/// Read access to commit history.
pub trait CommitHistory {
    /// When the repository was created; the fallback range boundary.
    fn repo_created_at(&self, repo: &RepoRef) -> ProviderResult<DateTime<Utc>>;

    /// The committer timestamp of the commit a tag points at.
    fn tag_committed_at(&self, repo: &RepoRef, tag: &Tag) -> ProviderResult<DateTime<Utc>>;

    /// One page of commits reachable from `branch` committed at or after `since`.
    ///
    /// Fails with [`ProviderError::BranchNotFound`] when the branch does not
    /// resolve.
    fn commit_history(
        &self,
        repo: &RepoRef,
        branch: &str,
        since: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> ProviderResult<Page>;

    /// One page of commits of the pull request associated with `branch`.
    ///
    /// The first associated pull request is taken unconditionally, which is
    /// not necessarily the one that triggered the pipeline. Fails with
    /// [`ProviderError::NoPullRequest`] when the branch has none.
    fn pull_request_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
        cursor: Option<&str>,
    ) -> ProviderResult<PullRequestPage>;
}

/// Parameters of a release to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRequest {
    /// Tag to create the release for.
    pub tag: Tag,
    /// Release title.
    pub name: String,
    /// Markdown body (the changelog).
    pub body: String,
    /// Create as a draft.
    pub draft: bool,
    /// Mark as a prerelease.
    pub prerelease: bool,
}

/// A release that was created on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedRelease {
    /// The release URL, when the platform reports one.
    pub url: Option<String>,
}

/// Creation of release objects.
pub trait ReleasePublisher {
    /// Create a release. Called at most once per invocation.
    fn create_release(
        &self,
        repo: &RepoRef,
        request: &ReleaseRequest,
    ) -> ProviderResult<PublishedRelease>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory provider that replays scripted pages.

    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// Cursor key used for the first page.
    const FIRST: &str = "";

    /// A provider whose answers are set up front by the test.
    #[derive(Debug, Default)]
    pub struct ScriptedProvider {
        pub tag: Option<Tag>,
        pub tag_date: Option<DateTime<Utc>>,
        pub created_at: Option<DateTime<Utc>>,
        pub known_branches: Vec<String>,
        pub history: HashMap<String, Page>,
        pub pull_requests: HashMap<String, PullRequestPage>,
        pub fail_on_cursor: Option<String>,
        pub calls: RefCell<Vec<String>>,
        pub published: RefCell<Vec<ReleaseRequest>>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self {
                known_branches: vec!["main".into()],
                created_at: Some(timestamp("2020-01-01T00:00:00Z")),
                ..Self::default()
            }
        }

        pub fn with_tag(mut self, name: &str, date: &str) -> Self {
            self.tag = Some(Tag::new(name));
            self.tag_date = Some(timestamp(date));
            self
        }

        /// Register a history page reachable under `cursor` (`None` for the first page).
        pub fn with_history_page(mut self, cursor: Option<&str>, page: Page) -> Self {
            self.history
                .insert(cursor.unwrap_or(FIRST).to_string(), page);
            self
        }

        pub fn with_pull_request_page(
            mut self,
            cursor: Option<&str>,
            page: PullRequestPage,
        ) -> Self {
            self.pull_requests
                .insert(cursor.unwrap_or(FIRST).to_string(), page);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }

        fn check_branch(&self, branch: &str) -> ProviderResult<()> {
            if self.known_branches.iter().any(|b| b == branch) {
                Ok(())
            } else {
                Err(ProviderError::BranchNotFound {
                    branch: branch.to_string(),
                })
            }
        }

        fn check_cursor(&self, cursor: Option<&str>) -> ProviderResult<()> {
            match (&self.fail_on_cursor, cursor) {
                (Some(fail), Some(c)) if fail == c => Err(ProviderError::Command {
                    command: "scripted".into(),
                    stderr: format!("page {c} unavailable"),
                }),
                _ => Ok(()),
            }
        }
    }

    impl TagLookup for ScriptedProvider {
        fn latest_tag(&self, _repo: &RepoRef) -> ProviderResult<Option<Tag>> {
            self.record("latest_tag".into());
            Ok(self.tag.clone())
        }
    }

    impl CommitHistory for ScriptedProvider {
        fn repo_created_at(&self, _repo: &RepoRef) -> ProviderResult<DateTime<Utc>> {
            self.record("repo_created_at".into());
            self.created_at
                .ok_or_else(|| ProviderError::Decode("no creation date scripted".into()))
        }

        fn tag_committed_at(&self, _repo: &RepoRef, tag: &Tag) -> ProviderResult<DateTime<Utc>> {
            self.record(format!("tag_committed_at {tag}"));
            self.tag_date.ok_or_else(|| ProviderError::TagNotFound {
                tag: tag.name.clone(),
            })
        }

        fn commit_history(
            &self,
            _repo: &RepoRef,
            branch: &str,
            since: DateTime<Utc>,
            cursor: Option<&str>,
        ) -> ProviderResult<Page> {
            self.record(format!(
                "commit_history {branch} {} {}",
                since.to_rfc3339(),
                cursor.unwrap_or("-")
            ));
            self.check_branch(branch)?;
            self.check_cursor(cursor)?;
            Ok(self
                .history
                .get(cursor.unwrap_or(FIRST))
                .cloned()
                .unwrap_or_default())
        }

        fn pull_request_commits(
            &self,
            _repo: &RepoRef,
            branch: &str,
            cursor: Option<&str>,
        ) -> ProviderResult<PullRequestPage> {
            self.record(format!(
                "pull_request_commits {branch} {}",
                cursor.unwrap_or("-")
            ));
            self.check_branch(branch)?;
            self.check_cursor(cursor)?;
            self.pull_requests
                .get(cursor.unwrap_or(FIRST))
                .cloned()
                .ok_or_else(|| ProviderError::NoPullRequest {
                    branch: branch.to_string(),
                })
        }
    }

    impl ReleasePublisher for ScriptedProvider {
        fn create_release(
            &self,
            repo: &RepoRef,
            request: &ReleaseRequest,
        ) -> ProviderResult<PublishedRelease> {
            self.record(format!("create_release {}", request.tag));
            self.published.borrow_mut().push(request.clone());
            Ok(PublishedRelease {
                url: Some(format!(
                    "https://github.com/{repo}/releases/tag/{}",
                    request.tag
                )),
            })
        }
    }

    pub fn timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid RFC 3339 timestamp")
            .with_timezone(&Utc)
    }

    pub fn commit(oid: &str, message: &str) -> RawCommit {
        RawCommit {
            oid: oid.to_string(),
            url: format!("https://github.com/acme/widgets/commit/{oid}"),
            message: message.to_string(),
            committed_at: None,
        }
    }

    /// `count` commits named `c<start>..`, each a `fix:` commit.
    pub fn commits(start: usize, count: usize) -> Vec<RawCommit> {
        (start..start + count)
            .map(|i| commit(&format!("c{i}"), &format!("fix: change {i}")))
            .collect()
    }

    pub fn page(total_count: u64, items: Vec<RawCommit>, next: Option<&str>) -> Page {
        Page {
            total_count,
            items,
            next_cursor: next.map(str::to_string),
        }
    }
}
