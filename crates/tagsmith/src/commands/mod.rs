//! Command implementations

pub mod changelog;

pub mod next_version;

pub mod release;

use anyhow::Context;
use clap::Args;
use tagsmith_core::config::{Config, ConfigLoader};
use tagsmith_core::github::{GhCli, GitHub};
use tagsmith_core::release::{ChangelogOptions, VersionOptions};

/// Changelog selection flags shared by `changelog` and `release`.
#[derive(Args, Debug, Default, Clone)]
pub struct ChangelogFlags {
    /// Branch whose history feeds the changelog
    #[arg(long, value_name = "BRANCH")]
    pub source_branch: Option<String>,

    /// Quote each commit body under its entry
    #[arg(long)]
    pub with_description: bool,

    /// Collect commits since the latest tag (default)
    #[arg(long, conflicts_with = "pull_request")]
    pub since_last_release: bool,

    /// Collect the commits of the branch's pull request
    #[arg(long)]
    pub pull_request: bool,
}

impl ChangelogFlags {
    /// Layer the flags that were given on top of the configuration.
    pub fn apply(&self, mut loader: ConfigLoader) -> ConfigLoader {
        if let Some(ref branch) = self.source_branch {
            loader = loader.with_override("changelog.source_branch", branch);
        }
        if self.with_description {
            loader = loader.with_override("changelog.with_description", true);
        }
        // The two strategy flags are exclusive on the command line; one given
        // there replaces whatever the configuration selected.
        if self.since_last_release || self.pull_request {
            loader = loader
                .with_override("changelog.since_last_release", self.since_last_release)
                .with_override("changelog.pull_request", self.pull_request);
        }
        loader
    }
}

/// Branch policy flags shared by `next-version` and `release`.
#[derive(Args, Debug, Default, Clone)]
pub struct BranchFlags {
    /// Branch that produces major releases
    #[arg(long, value_name = "BRANCH")]
    pub major_branch: Option<String>,

    /// Branch that produces minor releases
    #[arg(long, value_name = "BRANCH")]
    pub minor_branch: Option<String>,

    /// Branch that produces patch releases
    #[arg(long, value_name = "BRANCH")]
    pub patch_branch: Option<String>,
}

impl BranchFlags {
    /// Layer the flags that were given on top of the configuration.
    pub fn apply(&self, mut loader: ConfigLoader) -> ConfigLoader {
        for (key, value) in [
            ("branches.major", &self.major_branch),
            ("branches.minor", &self.minor_branch),
            ("branches.patch", &self.patch_branch),
        ] {
            if let Some(branch) = value {
                loader = loader.with_override(key, branch);
            }
        }
        loader
    }
}

/// Changelog options from the merged configuration.
pub fn changelog_options(config: &Config) -> anyhow::Result<ChangelogOptions> {
    Ok(ChangelogOptions {
        strategy: config.range_strategy()?,
        source_branch: config.source_branch()?.to_string(),
        with_description: config.changelog.with_description,
        parser: config.parser,
    })
}

/// Version options from the merged configuration.
///
/// Fails on an unknown target before anything is fetched.
pub fn version_options(config: &Config, target: &str) -> anyhow::Result<VersionOptions> {
    let policy = config.bump_policy()?;
    policy.require(target)?;
    Ok(VersionOptions {
        target: target.to_string(),
        policy,
        initial: config.initial_tags()?,
    })
}

/// GitHub client backed by the `gh` CLI.
pub fn github(config: &Config) -> anyhow::Result<GitHub<GhCli>> {
    let transport = GhCli::locate(config.token.clone()).context("cannot talk to GitHub")?;
    Ok(GitHub::new(transport))
}
