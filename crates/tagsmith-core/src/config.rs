//! Configuration loading and discovery.
//!
//! This module provides configuration file discovery by:
//! 1. Walking up from the current directory to find project config
//! 2. Loading user config from XDG config directory
//! 3. Overlaying `TAGSMITH_*` environment variables
//! 4. Merging with sensible defaults
//!
//! # Supported formats
//!
//! The following configuration file formats are supported:
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.tagsmith.<ext>` in current directory or any parent
//! - `tagsmith.<ext>` in current directory or any parent
//! - `~/.config/tagsmith/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`
//!
//! Environment variables sit above every file. Nested keys are separated by
//! a double underscore, so `TAGSMITH_BRANCHES__MAJOR=main` sets
//! `branches.major`.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use tagsmith_core::config::{Config, ConfigLoader};
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! let policy = config.bump_policy().unwrap();
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::commit::ParserOptions;
use crate::error::{ConfigError, ConfigResult};
use crate::provider::RepoRef;
use crate::range::{RangeResult, RangeStrategy};
use crate::version::{BumpPolicy, InitialTags};

/// The configuration for tagsmith.
///
/// Deserialized from config files found during discovery (TOML, YAML, or JSON)
/// and the environment. Inputs without a sensible default (repository,
/// branches, source branch) are optional here and checked by the accessor
/// that needs them.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files. File logging is off when unset.
    pub log_dir: Option<Utf8PathBuf>,
    /// Repository slug, `owner/name`.
    pub repository: Option<String>,
    /// API token handed to the `gh` CLI. Falls back to its own login.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Which branch triggers which bump level.
    pub branches: BranchesConfig,
    /// Tags used for the first release at each level.
    pub initial_tags: InitialTagsConfig,
    /// Changelog generation.
    pub changelog: ChangelogConfig,
    /// Commit message parsing.
    pub parser: ParserOptions,
    /// Release creation.
    pub release: ReleaseConfig,
}

/// Branch to bump-level mapping.
///
/// No defaults: a release pipeline must say which branches it releases from.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BranchesConfig {
    /// Branch that produces major releases.
    pub major: Option<String>,
    /// Branch that produces minor releases.
    pub minor: Option<String>,
    /// Branch that produces patch releases.
    pub patch: Option<String>,
}

/// First-release tags per level.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct InitialTagsConfig {
    /// Default: `v1.0.0`.
    pub major: String,
    /// Default: `v0.1.0`.
    pub minor: String,
    /// Default: `v0.0.1`.
    pub patch: String,
}

impl Default for InitialTagsConfig {
    fn default() -> Self {
        Self {
            major: "v1.0.0".to_string(),
            minor: "v0.1.0".to_string(),
            patch: "v0.0.1".to_string(),
        }
    }
}

/// Changelog generation settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChangelogConfig {
    /// Branch whose history feeds the changelog.
    pub source_branch: Option<String>,
    /// Render commit bodies as block quotes under each entry.
    pub with_description: bool,
    /// Collect commits since the latest tag (the default strategy).
    pub since_last_release: bool,
    /// Collect the commits of the branch's pull request instead.
    pub pull_request: bool,
}

/// Release creation settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Create the release on the hosting platform (default: `true`).
    pub create: bool,
    /// Create the release as a draft.
    pub draft: bool,
    /// Mark the release as a prerelease.
    pub prerelease: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            create: true,
            draft: false,
            prerelease: false,
        }
    }
}

impl Config {
    /// The configured repository.
    pub fn repository(&self) -> ConfigResult<RepoRef> {
        self.repository
            .as_deref()
            .ok_or(ConfigError::MissingInput("repository"))?
            .parse()
    }

    /// The bump policy built from the `branches` section.
    pub fn bump_policy(&self) -> ConfigResult<BumpPolicy> {
        let BranchesConfig {
            major,
            minor,
            patch,
        } = &self.branches;
        BumpPolicy::new(
            major.as_deref().ok_or(ConfigError::MissingInput("branches.major"))?,
            minor.as_deref().ok_or(ConfigError::MissingInput("branches.minor"))?,
            patch.as_deref().ok_or(ConfigError::MissingInput("branches.patch"))?,
        )
    }

    /// The validated first-release tags.
    pub fn initial_tags(&self) -> ConfigResult<InitialTags> {
        let tags = &self.initial_tags;
        InitialTags::new(&tags.major, &tags.minor, &tags.patch)
    }

    /// The commit range strategy selected by the `changelog` flags.
    pub const fn range_strategy(&self) -> RangeResult<RangeStrategy> {
        RangeStrategy::from_flags(
            self.changelog.since_last_release,
            self.changelog.pull_request,
        )
    }

    /// The branch whose history feeds the changelog.
    pub fn source_branch(&self) -> ConfigResult<&str> {
        self.changelog
            .source_branch
            .as_deref()
            .ok_or(ConfigError::MissingInput("changelog.source_branch"))
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "tagsmith";

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "TAGSMITH_";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Whether to overlay `TAGSMITH_*` environment variables.
    include_env: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
    /// In-memory overrides merged last (CLI flags).
    overrides: Vec<Figment>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            include_env: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
            overrides: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    ///
    /// The loader will walk up from this directory looking for config files.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/tagsmith/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set whether to read `TAGSMITH_*` environment variables.
    pub const fn with_env(mut self, include: bool) -> Self {
        self.include_env = include;
        self
    }

    /// Set a boundary marker to stop directory traversal.
    ///
    /// When walking up directories, stop if we find a directory containing
    /// this file or directory name. Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Set a single value by dotted key, above every other source.
    ///
    /// Used for command-line flags, e.g. `("branches.major", "main")`.
    pub fn with_override<V: Serialize>(mut self, key: &str, value: V) -> Self {
        self.overrides
            .push(Figment::from(Serialized::default(key, value)));
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. Overrides (in order added via `with_override`)
    /// 2. `TAGSMITH_*` environment variables
    /// 3. Explicit files (in order added via `with_file`)
    /// 4. Project config (closest to search root)
    /// 5. User config (`~/.config/tagsmith/config.<ext>`)
    /// 6. Default values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Start with user config (lowest precedence of file sources)
        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            tracing::debug!(path = %user_config, "merging user config");
            figment = Self::merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            tracing::debug!(path = %project_config, "merging project config");
            figment = Self::merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        if self.include_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        for overlay in self.overrides {
            figment = figment.merge(overlay);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            repository = config.repository.as_deref(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration, returning an error if no config file is found.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self
            .project_search_root
            .as_ref()
            .and_then(|root| self.find_project_config(root))
            .is_some();
        let has_explicit = !self.explicit_files.is_empty();

        if !has_user && !has_project && !has_explicit {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            // The directory holding the marker is the repository root: search
            // it, then stop.
            if let Some(ref marker) = self.boundary_marker
                && dir.join(marker).exists()
            {
                break;
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("toml") => figment.merge(Toml::file_exact(path.as_str())),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Get the user config directory path.
///
/// Returns `~/.config/tagsmith/` on Linux, `~/Library/Application Support/tagsmith/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}
