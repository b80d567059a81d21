//! Conventional-commit message parsing.
//!
//! A message is split into a header line, an optional body and an optional
//! footer:
//!
//! ```text
//! feat(parser): accept scoped headers      <- header: type(scope): subject
//!
//! Scopes are free text up to the closing   <- body
//! parenthesis.
//!
//! BREAKING CHANGE: scopes are now required <- footer
//! Closes #42
//! ```
//!
//! The footer starts only at a breaking-change note or at an issue action
//! line (`closes #7`, `fixes #7`, `resolves #7`). Other `Token: value` lines
//! are body text.
//!
//! Parsing never fails. A header that does not match the grammar yields an
//! untyped commit, which the changelog assembler counts and then leaves out.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::provider::RawCommit;

/// Literal that flags a breaking change in a footer.
pub const BREAKING_CHANGE: &str = "BREAKING CHANGE";

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<type>[A-Za-z0-9_-]+)(?:\((?P<scope>[^()]*)\))?(?P<bang>!)?: +(?P<subject>.*)$")
        .expect("header pattern is a valid regex")
});

static ISSUE_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:close[sd]?|fix(?:e[sd])?|resolve[sd]?) +(?:[\w.-]+/[\w.-]+)?#\d+")
        .expect("issue action pattern is a valid regex")
});

/// Parser switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Treat a `!` before the header colon (`feat!: ...`) as a breaking change.
    ///
    /// Off by default: only the footer literal marks a breaking change.
    pub bang_breaking: bool,
}

/// Commit types with a dedicated changelog section.
///
/// Variants are declared in lexicographic order of their keys, so the
/// derived `Ord` is the section order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    /// `build`
    Build,
    /// `ci`
    Ci,
    /// `docs`
    Docs,
    /// `feat`
    Feat,
    /// `fix`
    Fix,
    /// Any type without a section of its own (`chore`, `wip`, ...).
    Other,
    /// `perf`
    Perf,
    /// `refactor`
    Refactor,
    /// `revert`
    Revert,
    /// `style`
    Style,
    /// `test`
    Test,
}

impl CommitType {
    /// Every variant, in section order.
    pub const ALL: [Self; 11] = [
        Self::Build,
        Self::Ci,
        Self::Docs,
        Self::Feat,
        Self::Fix,
        Self::Other,
        Self::Perf,
        Self::Refactor,
        Self::Revert,
        Self::Style,
        Self::Test,
    ];

    /// Classify a raw type string. Matching is exact; `Feat` is `Other`.
    pub fn classify(raw: &str) -> Self {
        match raw {
            "build" => Self::Build,
            "ci" => Self::Ci,
            "docs" => Self::Docs,
            "feat" => Self::Feat,
            "fix" => Self::Fix,
            "perf" => Self::Perf,
            "refactor" => Self::Refactor,
            "revert" => Self::Revert,
            "style" => Self::Style,
            "test" => Self::Test,
            _ => Self::Other,
        }
    }

    /// The grouping key.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Ci => "ci",
            Self::Docs => "docs",
            Self::Feat => "feat",
            Self::Fix => "fix",
            Self::Other => "other",
            Self::Perf => "perf",
            Self::Refactor => "refactor",
            Self::Revert => "revert",
            Self::Style => "style",
            Self::Test => "test",
        }
    }

    /// The changelog heading for this type.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Build => "Build",
            Self::Ci => "CI",
            Self::Docs => "Documentation",
            Self::Feat => "Features",
            Self::Fix => "Bug Fixes",
            Self::Other => "Other",
            Self::Perf => "Performance",
            Self::Refactor => "Refactoring",
            Self::Revert => "Revert",
            Self::Style => "Style",
            Self::Test => "Tests",
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured fields of one commit message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitMessage {
    /// Raw type from the header; `None` when the header is not conventional.
    #[serde(rename = "type")]
    pub commit_type: Option<String>,
    /// Header scope, without parentheses.
    pub scope: Option<String>,
    /// Header subject, or the whole first line for untyped commits.
    pub subject: String,
    /// Paragraphs between the header and the footer.
    pub body: Option<String>,
    /// Trailer block at the end of the message.
    pub footer: Option<String>,
    /// Whether the commit announces a breaking change.
    pub breaking: bool,
}

impl CommitMessage {
    /// The changelog section this commit belongs in, if it is typed.
    pub fn kind(&self) -> Option<CommitType> {
        self.commit_type.as_deref().map(CommitType::classify)
    }
}

/// A fetched commit together with its parsed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCommit {
    /// Link target for the changelog entry.
    pub url: String,
    /// Parsed message fields.
    #[serde(flatten)]
    pub message: CommitMessage,
}

impl ParsedCommit {
    /// Parse a raw commit.
    pub fn from_raw(raw: &RawCommit, options: ParserOptions) -> Self {
        Self {
            url: raw.url.clone(),
            message: parse_message(&raw.message, options),
        }
    }
}

/// Parse a batch of raw commits, preserving their order.
pub fn parse_commits(raw: &[RawCommit], options: ParserOptions) -> Vec<ParsedCommit> {
    raw.iter()
        .map(|commit| ParsedCommit::from_raw(commit, options))
        .collect()
}

/// Parse one commit message.
pub fn parse_message(message: &str, options: ParserOptions) -> CommitMessage {
    let normalized = message.replace("\r\n", "\n");
    let normalized = normalized.trim_start_matches('\n');
    let mut lines = normalized.lines();
    let header = lines.next().unwrap_or_default().trim_end();
    let rest: Vec<&str> = lines.collect();

    let (body, footer) = split_body_and_footer(&rest);
    let footer_breaking = footer
        .as_deref()
        .is_some_and(|f| f.contains(BREAKING_CHANGE));

    match HEADER.captures(header) {
        Some(caps) if !caps["subject"].trim().is_empty() => {
            let bang = caps.name("bang").is_some();
            CommitMessage {
                commit_type: Some(caps["type"].to_string()),
                scope: caps
                    .name("scope")
                    .map(|m| m.as_str().trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                subject: caps["subject"].trim().to_string(),
                body,
                footer,
                breaking: footer_breaking || (options.bang_breaking && bang),
            }
        }
        _ => CommitMessage {
            commit_type: None,
            scope: None,
            subject: header.to_string(),
            body,
            footer,
            breaking: footer_breaking,
        },
    }
}

/// Split the lines after the header into body and footer.
///
/// The footer starts at the first `BREAKING CHANGE` line or issue action
/// line, wherever it sits.
fn split_body_and_footer(lines: &[&str]) -> (Option<String>, Option<String>) {
    let footer_start = lines.iter().position(|line| {
        line.starts_with("BREAKING CHANGE")
            || line.starts_with("BREAKING-CHANGE")
            || ISSUE_ACTION.is_match(line)
    });

    let (body, footer) = match footer_start {
        Some(start) => lines.split_at(start),
        None => (lines, &[][..]),
    };
    (join_block(body), join_block(footer))
}

/// Join lines, trimming surrounding blank lines. `None` if nothing is left.
fn join_block(lines: &[&str]) -> Option<String> {
    let text = lines.join("\n");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
