//! tagsmith CLI
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use tagsmith::{Cli, Commands, commands};
use tagsmith_core::config::ConfigLoader;
use tagsmith_core::release::classify;
use tracing::debug;

mod observability;

fn main() -> ExitCode {
    // Held here so the fatal error below still reaches the file log.
    let mut guard = None;
    let code = match run(&mut guard) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = classify(&*err);
            tracing::error!(error = %err, ?kind, "fatal error");
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(kind.exit_code())
        }
    };
    drop(guard);
    code
}

fn run(guard: &mut Option<observability::ObservabilityGuard>) -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let loader = cli.apply_overrides(loader);
    let config = loader.load().context("failed to load configuration")?;

    let obs_config = observability::ObservabilityConfig::from_env_with_overrides(
        config
            .log_dir
            .as_ref()
            .map(|dir| dir.as_std_path().to_path_buf()),
    );
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    *guard = Some(
        observability::init_observability(&obs_config, env_filter)
            .context("failed to initialize logging/tracing")?,
    );

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    match cli.command {
        Commands::Changelog(args) => commands::changelog::cmd_changelog(args, cli.json, &config),
        Commands::NextVersion(args) => {
            commands::next_version::cmd_next_version(args, cli.json, &config)
        }
        Commands::Release(args) => commands::release::cmd_release(args, cli.json, &config),
    }
}
