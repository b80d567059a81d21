//! Changelog grouping and Markdown rendering.
//!
//! The rendered shape is consumed verbatim as a release body, so it is kept
//! stable:
//!
//! ```text
//! ## Features
//!
//! * [cursor pagination](https://github.com/acme/widgets/commit/5e6f)
//!
//!
//! ## Bug Fixes
//!
//! * [handle empty pages](https://github.com/acme/widgets/commit/1a2b)
//! * [drop v1 handlers](https://github.com/acme/widgets/commit/3c4d) - BREAKING CHANGE :bangbang:
//!
//!
//! ```
//!
//! Sections are ordered by type key (`feat` before `fix`), not by label.
//! [`assemble`] is a pure function of its inputs.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::commit::{CommitType, ParsedCommit};

/// Suffix appended to entries that announce a breaking change.
pub const BREAKING_MARKER: &str = " - BREAKING CHANGE :bangbang:";

/// Why a changelog came out empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum EmptyReason {
    /// The range held no commits at all.
    NoCommits,
    /// Commits were found but none had a conventional header.
    NoConventionalCommits {
        /// How many untyped commits were left out.
        excluded: usize,
    },
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCommits => write!(f, "no commits in range"),
            Self::NoConventionalCommits { excluded } => {
                write!(f, "none of {excluded} commits follow the convention")
            }
        }
    }
}

/// A rendered changelog and what went into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedChangelog {
    /// The Markdown document.
    pub markdown: String,
    /// Section keys in rendering order.
    pub sections: Vec<CommitType>,
    /// Commits rendered.
    pub included: usize,
    /// Untyped commits left out.
    pub excluded: usize,
    /// Rendered commits flagged as breaking.
    pub breaking: usize,
}

/// Result of assembling a changelog.
///
/// An empty changelog is a normal outcome, reported at warning level by the
/// caller rather than raised as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Changelog {
    /// At least one section was rendered.
    Rendered(RenderedChangelog),
    /// Nothing to render.
    Empty {
        /// Why nothing was rendered.
        #[serde(flatten)]
        reason: EmptyReason,
    },
}

impl Changelog {
    /// An empty changelog for the given reason.
    pub const fn empty(reason: EmptyReason) -> Self {
        Self::Empty { reason }
    }

    /// The Markdown text; empty for [`Changelog::Empty`].
    pub fn markdown(&self) -> &str {
        match self {
            Self::Rendered(rendered) => &rendered.markdown,
            Self::Empty { .. } => "",
        }
    }

    /// Whether nothing was rendered.
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    /// The reason the changelog is empty, if it is.
    pub const fn empty_reason(&self) -> Option<EmptyReason> {
        match self {
            Self::Empty { reason } => Some(*reason),
            Self::Rendered(_) => None,
        }
    }
}

/// Commits of one type, in fetch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogGroup<'a> {
    /// The section.
    pub kind: CommitType,
    /// Commits in the order they were fetched.
    pub commits: Vec<&'a ParsedCommit>,
}

/// Group typed commits by section. Untyped commits are skipped.
///
/// Groups come back sorted by section key; commits inside a group keep
/// their input order.
pub fn group(commits: &[ParsedCommit]) -> Vec<ChangelogGroup<'_>> {
    let mut groups: BTreeMap<CommitType, Vec<&ParsedCommit>> = BTreeMap::new();
    for commit in commits {
        if let Some(kind) = commit.message.kind() {
            groups.entry(kind).or_default().push(commit);
        }
    }
    groups
        .into_iter()
        .map(|(kind, commits)| ChangelogGroup { kind, commits })
        .collect()
}

/// Assemble a Markdown changelog.
///
/// With `with_description`, each commit body is rendered as a block quote
/// under its entry.
pub fn assemble(commits: &[ParsedCommit], with_description: bool) -> Changelog {
    let groups = group(commits);
    let included: usize = groups.iter().map(|g| g.commits.len()).sum();
    let excluded = commits.len() - included;

    if groups.is_empty() {
        let reason = if commits.is_empty() {
            EmptyReason::NoCommits
        } else {
            EmptyReason::NoConventionalCommits { excluded }
        };
        return Changelog::empty(reason);
    }

    let mut markdown = String::new();
    let mut breaking = 0;
    for group in &groups {
        breaking += render_group(&mut markdown, group, with_description);
    }

    Changelog::Rendered(RenderedChangelog {
        markdown,
        sections: groups.iter().map(|g| g.kind).collect(),
        included,
        excluded,
        breaking,
    })
}

/// Render one section into `out`. Returns the number of breaking entries.
fn render_group(out: &mut String, group: &ChangelogGroup<'_>, with_description: bool) -> usize {
    let mut breaking = 0;
    let _ = write!(out, "## {}\n\n", group.kind.label());

    for commit in &group.commits {
        let message = &commit.message;
        let _ = write!(out, "* [{}]({})", message.subject, commit.url);
        if message.breaking {
            out.push_str(BREAKING_MARKER);
            breaking += 1;
        }
        out.push('\n');

        if with_description && let Some(body) = message.body.as_deref() {
            for line in body.lines() {
                let _ = writeln!(out, "\t> {line}");
            }
            out.push('\n');
        }
    }

    out.push_str("\n\n");
    breaking
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{ParserOptions, parse_message};

    fn commit(n: u32, message: &str) -> ParsedCommit {
        ParsedCommit {
            url: format!("https://github.com/acme/widgets/commit/{n}"),
            message: parse_message(message, ParserOptions::default()),
        }
    }

    #[test]
    fn renders_exact_markdown_shape() {
        let commits = vec![
            commit(1, "fix: handle empty pages"),
            commit(2, "feat(range): cursor pagination"),
            commit(3, "fix: drop v1 handlers\n\nBREAKING CHANGE: v1 is gone"),
        ];

        let changelog = assemble(&commits, false);
        assert_eq!(
            changelog.markdown(),
            "## Features\n\n\
             * [cursor pagination](https://github.com/acme/widgets/commit/2)\n\
             \n\n\
             ## Bug Fixes\n\n\
             * [handle empty pages](https://github.com/acme/widgets/commit/1)\n\
             * [drop v1 handlers](https://github.com/acme/widgets/commit/3) - BREAKING CHANGE :bangbang:\n\
             \n\n"
        );
    }

    #[test]
    fn sections_sorted_by_type_key() {
        let commits = vec![
            commit(1, "test: more cases"),
            commit(2, "style: fmt"),
            commit(3, "chore: bump deps"),
            commit(4, "perf: faster"),
            commit(5, "ci: cache"),
            commit(6, "build: msrv"),
        ];

        let Changelog::Rendered(rendered) = assemble(&commits, false) else {
            panic!("expected rendered changelog");
        };
        assert_eq!(
            rendered.sections,
            vec![
                CommitType::Build,
                CommitType::Ci,
                CommitType::Other,
                CommitType::Perf,
                CommitType::Style,
                CommitType::Test,
            ]
        );

        let headings: Vec<&str> = rendered
            .markdown
            .lines()
            .filter(|l| l.starts_with("## "))
            .collect();
        assert_eq!(
            headings,
            vec![
                "## Build",
                "## CI",
                "## Other",
                "## Performance",
                "## Style",
                "## Tests"
            ]
        );
    }

    #[test]
    fn one_heading_per_distinct_type() {
        let commits = vec![
            commit(1, "feat: a"),
            commit(2, "feat: b"),
            commit(3, "chore: c"),
            commit(4, "wip: d"),
            commit(5, "feat: e"),
        ];
        let changelog = assemble(&commits, false);
        let headings = changelog
            .markdown()
            .lines()
            .filter(|l| l.starts_with("## "))
            .count();
        assert_eq!(headings, 2);
    }

    #[test]
    fn group_preserves_fetch_order() {
        let commits = vec![
            commit(1, "feat: zebra"),
            commit(2, "feat: apple\n\nBREAKING CHANGE: yes"),
            commit(3, "feat: mango"),
        ];
        let groups = group(&commits);
        assert_eq!(groups.len(), 1);
        let subjects: Vec<&str> = groups[0]
            .commits
            .iter()
            .map(|c| c.message.subject.as_str())
            .collect();
        assert_eq!(subjects, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn breaking_marker_only_on_breaking_entries() {
        let commits = vec![
            commit(1, "feat: plain"),
            commit(2, "feat: loud\n\nBREAKING CHANGE: removed flag"),
        ];
        let Changelog::Rendered(rendered) = assemble(&commits, false) else {
            panic!("expected rendered changelog");
        };
        let entries: Vec<&str> = rendered
            .markdown
            .lines()
            .filter(|l| l.starts_with("* "))
            .collect();
        assert!(!entries[0].contains("BREAKING CHANGE"));
        assert!(entries[1].ends_with(BREAKING_MARKER));
        assert_eq!(rendered.breaking, 1);
    }

    #[test]
    fn description_rendered_as_block_quote() {
        let commits = vec![
            commit(1, "feat: with body\n\nExplains the change."),
            commit(2, "feat: without body"),
        ];
        assert_eq!(
            assemble(&commits, true).markdown(),
            "## Features\n\n\
             * [with body](https://github.com/acme/widgets/commit/1)\n\
             \t> Explains the change.\n\
             \n\
             * [without body](https://github.com/acme/widgets/commit/2)\n\
             \n\n"
        );
    }

    #[test]
    fn multi_line_body_quotes_every_line() {
        let commits = vec![commit(1, "fix: x\n\nline one\nline two")];
        let markdown = assemble(&commits, true).markdown().to_string();
        assert!(markdown.contains("\t> line one\n\t> line two\n\n"));
    }

    #[test]
    fn token_style_body_is_quoted_and_issue_footer_is_not() {
        let commits = vec![commit(
            1,
            "feat: add retries\n\nRationale: the API flakes under load.\n\nCloses #7",
        )];
        assert_eq!(
            assemble(&commits, true).markdown(),
            "## Features\n\n\
             * [add retries](https://github.com/acme/widgets/commit/1)\n\
             \t> Rationale: the API flakes under load.\n\
             \n\
             \n\n"
        );
    }

    #[test]
    fn description_omitted_when_disabled() {
        let commits = vec![commit(1, "feat: with body\n\nExplains the change.")];
        assert!(!assemble(&commits, false).markdown().contains('>'));
    }

    #[test]
    fn untyped_only_is_empty_with_warning_reason() {
        let commits = vec![commit(1, "update readme"), commit(2, "Merge branch 'main'")];
        let changelog = assemble(&commits, true);
        assert_eq!(changelog.markdown(), "");
        assert_eq!(
            changelog.empty_reason(),
            Some(EmptyReason::NoConventionalCommits { excluded: 2 })
        );
    }

    #[test]
    fn no_commits_is_distinct_empty_reason() {
        let changelog = assemble(&[], false);
        assert!(changelog.is_empty());
        assert_eq!(changelog.empty_reason(), Some(EmptyReason::NoCommits));
    }

    #[test]
    fn untyped_commits_are_counted_as_excluded() {
        let commits = vec![commit(1, "feat: a"), commit(2, "random message")];
        let Changelog::Rendered(rendered) = assemble(&commits, false) else {
            panic!("expected rendered changelog");
        };
        assert_eq!(rendered.included, 1);
        assert_eq!(rendered.excluded, 1);
        assert!(!rendered.markdown.contains("random message"));
    }

    #[test]
    fn assemble_is_idempotent() {
        let commits = vec![
            commit(1, "fix: a\n\nbody"),
            commit(2, "docs: b"),
            commit(3, "feat: c\n\nBREAKING CHANGE: d"),
            commit(4, "nonsense"),
        ];
        let first = assemble(&commits, true);
        let second = assemble(&commits, true);
        assert_eq!(first.markdown().as_bytes(), second.markdown().as_bytes());
        assert_eq!(first, second);
    }

    #[test]
    fn changelog_serializes_with_status_tag() {
        let json = serde_json::to_value(Changelog::empty(EmptyReason::NoConventionalCommits {
            excluded: 3,
        }))
        .unwrap();
        assert_eq!(json["status"], "empty");
        assert_eq!(json["reason"], "no_conventional_commits");
        assert_eq!(json["excluded"], 3);
    }
}
