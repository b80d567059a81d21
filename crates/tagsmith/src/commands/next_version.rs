//! Next-version command: thin CLI layer over `tagsmith_core::version::resolve_next_version`.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use tagsmith_core::config::Config;
use tagsmith_core::version;

use super::BranchFlags;

/// Arguments for the `next-version` subcommand.
#[derive(Args, Debug, Default)]
pub struct NextVersionArgs {
    /// Branch the release targets
    #[arg(long, value_name = "BRANCH")]
    pub target: String,

    #[allow(missing_docs)]
    #[command(flatten)]
    pub branches: BranchFlags,
}

/// Execute the next-version command.
///
/// Prints the bare tag (e.g. `v1.5.0`) so pipelines can capture it.
#[instrument(name = "cmd_next_version", skip_all, fields(target = %args.target))]
pub fn cmd_next_version(
    args: NextVersionArgs,
    global_json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let repo = config.repository()?;
    let options = super::version_options(config, &args.target)?;
    debug!(%repo, "deriving next version");

    let github = super::github(config)?;
    let next = version::resolve_next_version(
        &github,
        &repo,
        &options.target,
        &options.policy,
        &options.initial,
    )
    .with_context(|| format!("failed to derive next version for {repo}"))?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&next)?);
        return Ok(());
    }

    println!("{}", next.next);
    match next.previous {
        Some(ref previous) => eprintln!(
            "{} {} -> {} ({} release from {})",
            "Next version:".dimmed(),
            previous,
            next.next.green(),
            next.level,
            next.target
        ),
        None => eprintln!(
            "{} {} (first {} release from {})",
            "Next version:".dimmed(),
            next.next.green(),
            next.level,
            next.target
        ),
    }
    Ok(())
}
