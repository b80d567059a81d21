//! Library interface for the `tagsmith` CLI.
//!
//! This crate exposes the CLI's argument parser and command structure as a library,
//! primarily for documentation generation and testing. The actual entry point is
//! in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tagsmith_core::config::ConfigLoader;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG                Log filter (e.g., debug, tagsmith_core=trace)
    TAGSMITH_LOG_PATH       Explicit log file path
    TAGSMITH_LOG_DIR        Log directory
    TAGSMITH_<KEY>          Any config key; nested keys use __ (TAGSMITH_BRANCHES__MAJOR)
    GITHUB_REPOSITORY       Repository (owner/name) when --repo is not given
    GITHUB_TOKEN            Token handed to gh when --token is not given

EXIT CODES:
    0  success (including an empty changelog)
    1  hosting platform or tool failure
    2  invalid or missing configuration
    3  branch, tag or pull request not found
    4  malformed latest tag
";

/// Command-line interface definition for tagsmith.
#[derive(Parser)]
#[command(name = "tagsmith")]
#[command(
    about = "Conventional-commit changelogs and branch-driven release tags",
    long_about = None
)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Repository as owner/name
    #[arg(long, global = true, env = "GITHUB_REPOSITORY", value_name = "OWNER/NAME")]
    pub repo: Option<String>,

    /// API token passed to gh
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl Cli {
    /// Layer command-line values on top of the discovered configuration.
    pub fn apply_overrides(&self, mut loader: ConfigLoader) -> ConfigLoader {
        if let Some(ref repo) = self.repo {
            loader = loader.with_override("repository", repo);
        }
        if let Some(ref token) = self.token {
            loader = loader.with_override("token", token);
        }
        self.command.apply_overrides(loader)
    }
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Print the changelog for the upcoming release
    Changelog(commands::changelog::ChangelogArgs),

    /// Print the next version tag for a target branch
    NextVersion(commands::next_version::NextVersionArgs),

    /// Derive changelog and next tag, then create the release
    Release(commands::release::ReleaseArgs),
}

impl Commands {
    fn apply_overrides(&self, loader: ConfigLoader) -> ConfigLoader {
        match self {
            Self::Changelog(args) => args.changelog.apply(loader),
            Self::NextVersion(args) => args.branches.apply(loader),
            Self::Release(args) => args.apply(loader),
        }
    }
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}
