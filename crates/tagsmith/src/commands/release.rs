//! Release command: plan and create a release via `tagsmith_core::release`.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tagsmith_core::config::{Config, ConfigLoader};
use tagsmith_core::release::{self, ReleaseOutcome};
use tracing::{debug, instrument};

use super::{BranchFlags, ChangelogFlags};

/// Arguments for the `release` subcommand.
#[derive(Args, Debug, Default)]
pub struct ReleaseArgs {
    /// Branch the release targets
    #[arg(long, value_name = "BRANCH")]
    pub target: String,

    /// Show what would be released without creating anything
    #[arg(long)]
    pub dry_run: bool,

    /// Create the release as a draft
    #[arg(long)]
    pub draft: bool,

    /// Mark the release as a prerelease
    #[arg(long)]
    pub prerelease: bool,

    #[allow(missing_docs)]
    #[command(flatten)]
    pub changelog: ChangelogFlags,

    #[allow(missing_docs)]
    #[command(flatten)]
    pub branches: BranchFlags,
}

impl ReleaseArgs {
    /// Layer the flags that were given on top of the configuration.
    pub fn apply(&self, mut loader: ConfigLoader) -> ConfigLoader {
        if self.draft {
            loader = loader.with_override("release.draft", true);
        }
        if self.prerelease {
            loader = loader.with_override("release.prerelease", true);
        }
        let loader = self.changelog.apply(loader);
        self.branches.apply(loader)
    }
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all, fields(target = %args.target, dry_run = args.dry_run))]
pub fn cmd_release(args: ReleaseArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    let repo = config.repository()?;
    let version = super::version_options(config, &args.target)?;
    let changelog = super::changelog_options(config)?;
    debug!(%repo, "planning release");

    let github = super::github(config)?;
    let plan = release::plan_release(&github, &repo, &changelog, &version, &config.release)
        .with_context(|| format!("failed to plan release for {repo}"))?;
    let outcome = plan
        .execute(&github, args.dry_run)
        .with_context(|| format!("failed to create release for {repo}"))?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &ReleaseOutcome) {
    let plan = &outcome.plan;
    let tag = &plan.version.next;

    match (&outcome.published, outcome.dry_run) {
        (Some(published), _) => {
            println!("{} {}", "Created release".green().bold(), tag.bold());
            if let Some(ref url) = published.url {
                println!("{}: {}", "URL".dimmed(), url.cyan());
            }
        }
        (None, true) => {
            println!("{} {}", "Would create release".yellow().bold(), tag.bold());
        }
        (None, false) => {
            println!(
                "{} {} {}",
                "Release".bold(),
                tag.bold(),
                "not created (release.create = false)".dimmed()
            );
        }
    }

    if let Some(ref previous) = plan.version.previous {
        println!("{}: {previous}", "Previous".dimmed());
    }
    println!(
        "{}: {} ({} commits, {})",
        "Changelog".dimmed(),
        plan.changelog.strategy,
        plan.changelog.commits,
        plan.version.level
    );

    if outcome.dry_run {
        if let Some(reason) = plan.changelog.changelog.empty_reason() {
            println!("{} {reason}", "Empty changelog:".yellow());
        } else {
            println!();
            print!("{}", plan.changelog.markdown());
        }
    }
}
