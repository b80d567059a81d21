//! Changelog command: thin CLI layer over `tagsmith_core::release::resolve_changelog`.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use tagsmith_core::config::Config;
use tagsmith_core::release;

use super::ChangelogFlags;

/// Arguments for the `changelog` subcommand.
#[derive(Args, Debug, Default)]
pub struct ChangelogArgs {
    #[allow(missing_docs)]
    #[command(flatten)]
    pub changelog: ChangelogFlags,
}

/// Execute the changelog command.
///
/// The Markdown goes to stdout exactly as rendered. An empty changelog is
/// not a failure; the reason is reported on stderr.
#[instrument(name = "cmd_changelog", skip_all)]
pub fn cmd_changelog(_args: ChangelogArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    let repo = config.repository()?;
    let options = super::changelog_options(config)?;
    debug!(%repo, branch = %options.source_branch, strategy = %options.strategy, "building changelog");

    let github = super::github(config)?;
    let report = release::resolve_changelog(&github, &repo, &options)
        .with_context(|| format!("failed to build changelog for {repo}"))?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(reason) = report.changelog.empty_reason() {
        eprintln!("{} {reason}", "Empty changelog:".yellow().bold());
    } else {
        print!("{}", report.markdown());
    }
    Ok(())
}
