//! Version tag parsing and next-tag derivation.
//!
//! A release tag has the form `v<major>.<minor>.<patch>`. The next tag is
//! computed from the latest tag and the bump level that the target branch
//! maps to in a [`BumpPolicy`]. Without a prior tag, the configured
//! [`InitialTags`] entry for that level is used as-is.

mod policy;

pub use policy::{BumpPolicy, InitialTags};

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::provider::{ProviderError, RepoRef, Tag, TagLookup};

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The target branch is not part of the bump policy.
    #[error("unknown target branch: {branch}")]
    UnknownBranch {
        /// The branch that matched no policy entry.
        branch: String,
    },

    /// A tag is not of the form `v<major>.<minor>.<patch>`.
    #[error("malformed tag {tag:?}: {reason}")]
    MalformedTag {
        /// The tag as found.
        tag: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Bumping would overflow a version component.
    #[error("cannot apply a {level} bump to {tag}: component overflow")]
    Overflow {
        /// The tag being bumped.
        tag: String,
        /// The requested bump.
        level: BumpLevel,
    },

    /// The tag lookup failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Semver bump level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// Patch release (x.y.Z).
    Patch,
    /// Minor release (x.Y.0).
    Minor,
    /// Major release (X.0.0).
    Major,
}

impl BumpLevel {
    /// All levels, largest first.
    pub const ALL: [Self; 3] = [Self::Major, Self::Minor, Self::Patch];
}

impl std::fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// Compute the next version by applying a bump level.
///
/// Returns `None` when a component would overflow.
pub fn next_version(current: &Version, level: BumpLevel) -> Option<Version> {
    Some(match level {
        BumpLevel::Patch => Version::new(current.major, current.minor, current.patch.checked_add(1)?),
        BumpLevel::Minor => Version::new(current.major, current.minor.checked_add(1)?, 0),
        BumpLevel::Major => Version::new(current.major.checked_add(1)?, 0, 0),
    })
}

/// Parse a tag name, stripping an optional `v` prefix.
///
/// Exactly three dot-separated decimal components are required. Leading
/// zeros are accepted (`v01.2.3` is `1.2.3`); pre-release and build
/// suffixes are not.
pub fn parse_tag(tag: &str) -> VersionResult<Version> {
    let malformed = |reason: &str| VersionError::MalformedTag {
        tag: tag.to_string(),
        reason: reason.to_string(),
    };

    let bare = tag.strip_prefix('v').unwrap_or(tag);
    let parts: Vec<&str> = bare.split('.').collect();
    let &[major, minor, patch] = parts.as_slice() else {
        return Err(malformed("expected three dot-separated components"));
    };

    let component = |part: &str, name: &str| -> VersionResult<u64> {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(&format!("{name} component {part:?} is not a number")));
        }
        part.parse()
            .map_err(|_| malformed(&format!("{name} component {part:?} is out of range")))
    };

    Ok(Version::new(
        component(major, "major")?,
        component(minor, "minor")?,
        component(patch, "patch")?,
    ))
}

/// Render a version as a `v`-prefixed tag.
pub fn format_tag(version: &Version) -> Tag {
    Tag::new(format!(
        "v{}.{}.{}",
        version.major, version.minor, version.patch
    ))
}

/// Compute the tag that follows `latest` for a release targeting `target`.
pub fn next_tag(
    latest: Option<&Tag>,
    target: &str,
    policy: &BumpPolicy,
    initial: &InitialTags,
) -> VersionResult<Tag> {
    let level = policy.require(target)?;
    bump_tag(latest, level, initial)
}

fn bump_tag(latest: Option<&Tag>, level: BumpLevel, initial: &InitialTags) -> VersionResult<Tag> {
    let Some(latest) = latest else {
        let tag = initial.for_level(level).clone();
        debug!(%tag, %level, "no prior tag, using initial tag");
        return Ok(tag);
    };

    let current = parse_tag(&latest.name)?;
    let next = next_version(&current, level).ok_or_else(|| VersionError::Overflow {
        tag: latest.name.clone(),
        level,
    })?;
    Ok(format_tag(&next))
}

/// The result of deriving the next version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextVersion {
    /// The branch the release targets.
    pub target: String,
    /// The level the branch maps to.
    pub level: BumpLevel,
    /// The latest existing tag, if any.
    pub previous: Option<Tag>,
    /// The derived tag.
    pub next: Tag,
}

/// Look up the latest tag and derive the next one, with context.
///
/// The target is checked against the policy before the lookup, so an
/// unknown branch never reaches the provider.
#[instrument(skip(lookup, policy, initial), fields(%repo))]
pub fn resolve_next_version<L: TagLookup + ?Sized>(
    lookup: &L,
    repo: &RepoRef,
    target: &str,
    policy: &BumpPolicy,
    initial: &InitialTags,
) -> VersionResult<NextVersion> {
    let level = policy.require(target)?;
    let previous = lookup.latest_tag(repo)?;
    let next = bump_tag(previous.as_ref(), level, initial)?;
    info!(previous = ?previous.as_ref().map(|t| t.name.as_str()), %next, %level, "derived next version");
    Ok(NextVersion {
        target: target.to_string(),
        level,
        previous,
        next,
    })
}

/// Look up the latest tag and derive the next one.
pub fn derive_next_version<L: TagLookup + ?Sized>(
    lookup: &L,
    repo: &RepoRef,
    target: &str,
    policy: &BumpPolicy,
    initial: &InitialTags,
) -> VersionResult<Tag> {
    resolve_next_version(lookup, repo, target, policy, initial).map(|n| n.next)
}
