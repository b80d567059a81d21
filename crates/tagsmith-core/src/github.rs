//! GitHub implementation of the collaborator traits.
//!
//! Shells out to the `gh` CLI for every call. This ensures we inherit the
//! user's authentication, host configuration and proxy settings; an explicit
//! token is handed to `gh` through `GH_TOKEN`.
//!
//! Reads go through the GraphQL API (`gh api graphql`), release creation
//! through `gh release create`. The transport is a trait so the decoding
//! logic can be tested against canned responses.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::provider::{
    CommitHistory, Page, ProviderError, ProviderResult, PublishedRelease, PullRequestPage,
    RawCommit, ReleasePublisher, ReleaseRequest, RepoRef, Tag, TagLookup,
};
use crate::range::PAGE_SIZE;

const LATEST_TAG_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    refs(refPrefix: "refs/tags/", last: 1, orderBy: {field: TAG_COMMIT_DATE, direction: ASC}) {
      nodes { name }
    }
  }
}"#;

const TAG_DATE_QUERY: &str = r"
query($owner: String!, $name: String!, $expression: String!) {
  repository(owner: $owner, name: $name) {
    object(expression: $expression) {
      ... on Commit { committedDate }
      ... on Tag { target { ... on Commit { committedDate } } }
    }
  }
}";

const CREATED_AT_QUERY: &str = r"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    createdAt
  }
}";

const HISTORY_QUERY: &str = r"
query($owner: String!, $name: String!, $branch: String!, $since: GitTimestamp!, $first: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    ref(qualifiedName: $branch) {
      target {
        ... on Commit {
          history(first: $first, since: $since, after: $cursor) {
            totalCount
            pageInfo { hasNextPage endCursor }
            nodes { oid commitUrl message committedDate }
          }
        }
      }
    }
  }
}";

const PULL_REQUEST_QUERY: &str = r"
query($owner: String!, $name: String!, $branch: String!, $first: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    ref(qualifiedName: $branch) {
      associatedPullRequests(first: 1) {
        nodes {
          number
          commits(first: $first, after: $cursor) {
            totalCount
            pageInfo { hasNextPage endCursor }
            nodes { commit { oid commitUrl message committedDate } }
          }
        }
      }
    }
  }
}";

/// How requests reach GitHub.
pub trait GraphqlTransport {
    /// Run a GraphQL query and return the raw response document.
    fn graphql(&self, query: &str, variables: &Value) -> ProviderResult<Value>;

    /// Create a release and return its URL when reported.
    fn release_create(
        &self,
        repo: &RepoRef,
        request: &ReleaseRequest,
    ) -> ProviderResult<PublishedRelease>;
}

/// Transport backed by the `gh` CLI.
#[derive(Debug, Clone)]
pub struct GhCli {
    program: PathBuf,
    token: Option<String>,
}

impl GhCli {
    /// Find `gh` on `PATH`.
    pub fn locate(token: Option<String>) -> ProviderResult<Self> {
        let program = which::which("gh").map_err(|_| ProviderError::MissingTool {
            tool: "gh".to_string(),
        })?;
        debug!(program = %program.display(), "found gh");
        Ok(Self { program, token })
    }

    /// Run `gh` with `args`, feeding `input` on stdin, and return stdout.
    fn run(&self, args: &[&str], input: &str) -> ProviderResult<String> {
        let exec_err = |source| ProviderError::Exec {
            tool: "gh".to_string(),
            source,
        };

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(token) = &self.token {
            command.env("GH_TOKEN", token);
        }

        let mut child = command.spawn().map_err(exec_err)?;
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(input.as_bytes()) {
                // gh quit without reading stdin; its exit status and stderr say why.
                Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
                written => written.map_err(exec_err)?,
            }
        }
        let output = child.wait_with_output().map_err(exec_err)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(ProviderError::Command {
                command: format!("gh {}", args.iter().take(2).copied().collect::<Vec<_>>().join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl GraphqlTransport for GhCli {
    fn graphql(&self, query: &str, variables: &Value) -> ProviderResult<Value> {
        let body = json!({ "query": query, "variables": variables }).to_string();
        let stdout = self.run(&["api", "graphql", "--input", "-"], &body)?;
        serde_json::from_str(&stdout).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    fn release_create(
        &self,
        repo: &RepoRef,
        request: &ReleaseRequest,
    ) -> ProviderResult<PublishedRelease> {
        let slug = repo.to_string();
        let mut args = vec![
            "release",
            "create",
            request.tag.name.as_str(),
            "--repo",
            slug.as_str(),
            "--title",
            request.name.as_str(),
            "--notes-file",
            "-",
        ];
        if request.draft {
            args.push("--draft");
        }
        if request.prerelease {
            args.push("--prerelease");
        }

        let stdout = self.run(&args, &request.body)?;
        let url = stdout.trim();
        Ok(PublishedRelease {
            url: (!url.is_empty()).then(|| url.to_string()),
        })
    }
}

/// GitHub as tag lookup, history provider and release publisher.
#[derive(Debug, Clone)]
pub struct GitHub<T> {
    transport: T,
}

impl<T: GraphqlTransport> GitHub<T> {
    /// Wrap a transport.
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    fn query<R: DeserializeOwned>(&self, query: &str, variables: Value) -> ProviderResult<R> {
        let response = self.transport.graphql(query, &variables)?;
        let envelope: Envelope = serde_json::from_value(response)
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        if !envelope.errors.is_empty() {
            let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
            return Err(ProviderError::GraphQl(messages.join("; ")));
        }

        let data = envelope
            .data
            .ok_or_else(|| ProviderError::Decode("response has no data".to_string()))?;
        serde_json::from_value(data).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    fn repository<R: DeserializeOwned>(
        &self,
        repo: &RepoRef,
        query: &str,
        mut variables: Value,
    ) -> ProviderResult<R> {
        variables["owner"] = json!(repo.owner);
        variables["name"] = json!(repo.name);
        let data: RepositoryData<R> = self.query(query, variables)?;
        data.repository
            .ok_or_else(|| ProviderError::Decode(format!("repository {repo} not found")))
    }
}

impl<T: GraphqlTransport> TagLookup for GitHub<T> {
    #[instrument(skip(self), fields(%repo))]
    fn latest_tag(&self, repo: &RepoRef) -> ProviderResult<Option<Tag>> {
        let data: TagsRepository = self.repository(repo, LATEST_TAG_QUERY, json!({}))?;
        let tag = data.refs.nodes.into_iter().last().map(|node| Tag::new(node.name));
        debug!(?tag, "latest tag");
        Ok(tag)
    }
}

impl<T: GraphqlTransport> CommitHistory for GitHub<T> {
    #[instrument(skip(self), fields(%repo))]
    fn repo_created_at(&self, repo: &RepoRef) -> ProviderResult<DateTime<Utc>> {
        let data: CreatedRepository = self.repository(repo, CREATED_AT_QUERY, json!({}))?;
        Ok(data.created_at)
    }

    #[instrument(skip(self), fields(%repo, %tag))]
    fn tag_committed_at(&self, repo: &RepoRef, tag: &Tag) -> ProviderResult<DateTime<Utc>> {
        let data: ObjectRepository =
            self.repository(repo, TAG_DATE_QUERY, json!({ "expression": tag.name }))?;
        data.object
            .and_then(|object| {
                object
                    .committed_date
                    .or_else(|| object.target.and_then(|t| t.committed_date))
            })
            .ok_or_else(|| ProviderError::TagNotFound {
                tag: tag.name.clone(),
            })
    }

    #[instrument(skip(self), fields(%repo))]
    fn commit_history(
        &self,
        repo: &RepoRef,
        branch: &str,
        since: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> ProviderResult<Page> {
        let variables = json!({
            "branch": qualified(branch),
            "since": since.to_rfc3339(),
            "first": PAGE_SIZE,
            "cursor": cursor,
        });
        let data: RefRepository<HistoryRef> = self.repository(repo, HISTORY_QUERY, variables)?;
        let branch_not_found = || ProviderError::BranchNotFound {
            branch: branch.to_string(),
        };
        let history = data
            .git_ref
            .ok_or_else(branch_not_found)?
            .target
            .and_then(|target| target.history)
            .ok_or_else(branch_not_found)?;

        let page = history.into_page(|node| node);
        debug!(total = page.total_count, items = page.items.len(), "history page");
        Ok(page)
    }

    #[instrument(skip(self), fields(%repo))]
    fn pull_request_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
        cursor: Option<&str>,
    ) -> ProviderResult<PullRequestPage> {
        let variables = json!({
            "branch": qualified(branch),
            "first": PAGE_SIZE,
            "cursor": cursor,
        });
        let data: RefRepository<PullRequestRef> =
            self.repository(repo, PULL_REQUEST_QUERY, variables)?;
        let pull_request = data
            .git_ref
            .ok_or_else(|| ProviderError::BranchNotFound {
                branch: branch.to_string(),
            })?
            .associated_pull_requests
            .nodes
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NoPullRequest {
                branch: branch.to_string(),
            })?;

        let page = pull_request.commits.into_page(|node| node.commit);
        debug!(number = pull_request.number, items = page.items.len(), "pull request page");
        Ok(PullRequestPage {
            number: pull_request.number,
            page,
        })
    }
}

impl<T: GraphqlTransport> ReleasePublisher for GitHub<T> {
    #[instrument(skip(self, request), fields(%repo, tag = %request.tag))]
    fn create_release(
        &self,
        repo: &RepoRef,
        request: &ReleaseRequest,
    ) -> ProviderResult<PublishedRelease> {
        let release = self.transport.release_create(repo, request)?;
        info!(url = release.url.as_deref(), "release created");
        Ok(release)
    }
}

/// Fully qualify a branch name for `ref(qualifiedName:)`.
fn qualified(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{branch}")
    }
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Deserialize)]
struct Envelope {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlMessage>,
}

#[derive(Deserialize)]
struct GraphQlMessage {
    message: String,
}

#[derive(Deserialize)]
struct RepositoryData<R> {
    repository: Option<R>,
}

#[derive(Deserialize)]
struct TagsRepository {
    refs: Connection<NamedRef>,
}

#[derive(Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedRepository {
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ObjectRepository {
    object: Option<GitObject>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitObject {
    committed_date: Option<DateTime<Utc>>,
    target: Option<Box<GitObject>>,
}

#[derive(Deserialize)]
struct RefRepository<R> {
    #[serde(rename = "ref")]
    git_ref: Option<R>,
}

#[derive(Deserialize)]
struct HistoryRef {
    target: Option<HistoryTarget>,
}

#[derive(Deserialize)]
struct HistoryTarget {
    history: Option<CommitConnection<CommitNode>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestRef {
    associated_pull_requests: Connection<PullRequestNode>,
}

#[derive(Deserialize)]
struct PullRequestNode {
    number: u64,
    commits: CommitConnection<PullRequestCommitNode>,
}

#[derive(Deserialize)]
struct PullRequestCommitNode {
    commit: CommitNode,
}

#[derive(Deserialize)]
struct Connection<N> {
    nodes: Vec<N>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitConnection<N> {
    total_count: u64,
    page_info: PageInfo,
    nodes: Vec<N>,
}

impl<N> CommitConnection<N> {
    fn into_page(self, commit: impl Fn(N) -> CommitNode) -> Page {
        let next_cursor = if self.page_info.has_next_page {
            self.page_info.end_cursor
        } else {
            None
        };
        Page {
            total_count: self.total_count,
            items: self
                .nodes
                .into_iter()
                .map(|node| commit(node).into())
                .collect(),
            next_cursor,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitNode {
    #[serde(default)]
    oid: String,
    commit_url: String,
    message: String,
    committed_date: Option<DateTime<Utc>>,
}

impl From<CommitNode> for RawCommit {
    fn from(node: CommitNode) -> Self {
        Self {
            oid: node.oid,
            url: node.commit_url,
            message: node.message,
            committed_at: node.committed_date,
        }
    }
}
