//! Branch to bump-level policy and first-release tags.

use serde::Serialize;

use super::{BumpLevel, VersionError, VersionResult, parse_tag};
use crate::error::{ConfigError, ConfigResult};
use crate::provider::Tag;

/// Which branch triggers which kind of release.
///
/// Branch names are unique across levels; a target matches at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BumpPolicy {
    major: String,
    minor: String,
    patch: String,
}

impl BumpPolicy {
    /// Build a policy, rejecting a branch mapped to more than one level.
    pub fn new(
        major: impl Into<String>,
        minor: impl Into<String>,
        patch: impl Into<String>,
    ) -> ConfigResult<Self> {
        let policy = Self {
            major: major.into(),
            minor: minor.into(),
            patch: patch.into(),
        };

        for (i, first) in BumpLevel::ALL.iter().enumerate() {
            for second in &BumpLevel::ALL[i + 1..] {
                if policy.branch(*first) == policy.branch(*second) {
                    return Err(ConfigError::PolicyConflict {
                        branch: policy.branch(*first).to_string(),
                        first: *first,
                        second: *second,
                    });
                }
            }
        }
        Ok(policy)
    }

    /// The branch configured for a level.
    pub fn branch(&self, level: BumpLevel) -> &str {
        match level {
            BumpLevel::Major => &self.major,
            BumpLevel::Minor => &self.minor,
            BumpLevel::Patch => &self.patch,
        }
    }

    /// The level a branch maps to, if any.
    pub fn level_for(&self, branch: &str) -> Option<BumpLevel> {
        BumpLevel::ALL
            .into_iter()
            .find(|level| self.branch(*level) == branch)
    }

    /// The level a branch maps to, or [`VersionError::UnknownBranch`].
    pub fn require(&self, branch: &str) -> VersionResult<BumpLevel> {
        self.level_for(branch)
            .ok_or_else(|| VersionError::UnknownBranch {
                branch: branch.to_string(),
            })
    }
}

/// Tags used for the very first release at each level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitialTags {
    major: Tag,
    minor: Tag,
    patch: Tag,
}

impl Default for InitialTags {
    fn default() -> Self {
        Self {
            major: Tag::new("v1.0.0"),
            minor: Tag::new("v0.1.0"),
            patch: Tag::new("v0.0.1"),
        }
    }
}

impl InitialTags {
    /// Build initial tags, checking that each one is well formed.
    pub fn new(
        major: impl Into<String>,
        minor: impl Into<String>,
        patch: impl Into<String>,
    ) -> ConfigResult<Self> {
        let tags = Self {
            major: Tag::new(major),
            minor: Tag::new(minor),
            patch: Tag::new(patch),
        };
        for level in BumpLevel::ALL {
            parse_tag(&tags.for_level(level).name)
                .map_err(|source| ConfigError::InitialTag { level, source })?;
        }
        Ok(tags)
    }

    /// The initial tag for a level.
    pub fn for_level(&self, level: BumpLevel) -> &Tag {
        match level {
            BumpLevel::Major => &self.major,
            BumpLevel::Minor => &self.minor,
            BumpLevel::Patch => &self.patch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_lookup() {
        let policy = BumpPolicy::new("main", "next", "maint").unwrap();
        assert_eq!(policy.level_for("main"), Some(BumpLevel::Major));
        assert_eq!(policy.level_for("next"), Some(BumpLevel::Minor));
        assert_eq!(policy.level_for("maint"), Some(BumpLevel::Patch));
        assert_eq!(policy.level_for("Main"), None);
    }

    #[test]
    fn duplicate_branch_is_a_conflict() {
        let err = BumpPolicy::new("main", "next", "main").unwrap_err();
        match err {
            ConfigError::PolicyConflict {
                branch,
                first,
                second,
            } => {
                assert_eq!(branch, "main");
                assert_eq!(first, BumpLevel::Major);
                assert_eq!(second, BumpLevel::Patch);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_target_names_the_branch() {
        let policy = BumpPolicy::new("release", "develop", "support").unwrap();
        let err = policy.require("hotfix").unwrap_err();
        assert!(err.to_string().contains("hotfix"));
    }

    #[test]
    fn initial_tags_default() {
        let tags = InitialTags::default();
        assert_eq!(tags.for_level(BumpLevel::Major).name, "v1.0.0");
        assert_eq!(tags.for_level(BumpLevel::Minor).name, "v0.1.0");
        assert_eq!(tags.for_level(BumpLevel::Patch).name, "v0.0.1");
    }

    #[test]
    fn initial_tags_are_validated() {
        assert!(InitialTags::new("v2.0.0", "v0.2.0", "v0.0.2").is_ok());
        let err = InitialTags::new("v2.0.0", "zero", "v0.0.2").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InitialTag {
                level: BumpLevel::Minor,
                ..
            }
        ));
    }
}
