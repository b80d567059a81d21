//! Core library for tagsmith.
//!
//! tagsmith turns a repository's commit history into a Markdown changelog and
//! derives the next `vMAJOR.MINOR.PATCH` tag from the branch a release targets.
//!
//! # Modules
//!
//! - [`commit`] - Conventional-commit message parsing
//! - [`range`] - Commit range resolution and cursor pagination
//! - [`changelog`] - Grouping and Markdown rendering
//! - [`version`] - Tag parsing, bump policy and next-tag derivation
//! - [`provider`] - Collaborator traits the hosting platform implements
//! - [`github`] - GitHub implementation of the collaborator traits
//! - [`release`] - Orchestration of changelog, version and release creation
//! - [`config`] - Configuration loading and management
//! - [`error`] - Configuration error types
//!
//! # Quick Start
//!
//! ```no_run
//! use tagsmith_core::{Config, ConfigLoader};
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! println!("Log level: {:?}", config.log_level);
//! ```
#![deny(unsafe_code)]

pub mod changelog;

pub mod commit;

pub mod config;

pub mod error;

pub mod github;

pub mod provider;

pub mod range;

pub mod release;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
