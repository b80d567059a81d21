//! Error types for tagsmith-core configuration.
//!
//! Domain modules carry their own error enums (`RangeError`, `VersionError`,
//! `ProviderError`, `ReleaseError`); this module holds the configuration
//! errors that every entry point can raise before touching the network.

use thiserror::Error;

use crate::version::{BumpLevel, VersionError};

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,

    /// A required input was not provided by any configuration source.
    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    /// The repository slug is not of the form `owner/name`.
    #[error("invalid repository {0:?}: expected owner/name")]
    InvalidRepository(String),

    /// One branch is configured for more than one bump level.
    #[error("branch {branch:?} is configured for both {first} and {second} releases")]
    PolicyConflict {
        /// The branch name that appears twice.
        branch: String,
        /// The first level it maps to.
        first: BumpLevel,
        /// The second level it maps to.
        second: BumpLevel,
    },

    /// A configured initial tag is not a valid version tag.
    #[error("invalid initial {level} tag: {source}")]
    InitialTag {
        /// Which initial tag failed to parse.
        level: BumpLevel,
        /// The parse failure.
        source: VersionError,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
