//! Cache versioning and logical-to-physical name mapping

use crate::error::{ReadThroughError, ReadThroughResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Logical name of the cache that serves requests
pub const READ_THROUGH: &str = "read-through";

/// Operator-controlled cache generation.
///
/// Bumping the version changes every physical cache name, so the next
/// activation purges all caches of the previous generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheVersion(pub u32);

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mapping from logical cache name to versioned physical cache name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRegistry {
    version: CacheVersion,
    bases: BTreeMap<String, String>,
}

impl CacheRegistry {
    /// Create a registry from logical name -> base name pairs
    pub fn new(version: CacheVersion, bases: BTreeMap<String, String>) -> Self {
        Self { version, bases }
    }

    /// Physical cache name for a base name at a version (`{base}-v{version}`)
    pub fn physical_name(base: &str, version: CacheVersion) -> String {
        format!("{}-v{}", base, version)
    }

    /// The version this registry was built for
    pub fn version(&self) -> CacheVersion {
        self.version
    }

    /// Resolve a logical name to its current physical cache name
    pub fn resolve(&self, logical: &str) -> ReadThroughResult<String> {
        self.bases
            .get(logical)
            .map(|base| Self::physical_name(base, self.version))
            .ok_or_else(|| ReadThroughError::UnknownLogicalCache(logical.to_string()))
    }

    /// Every physical cache name that is current under this registry
    pub fn expected_names(&self) -> BTreeSet<String> {
        self.bases
            .values()
            .map(|base| Self::physical_name(base, self.version))
            .collect()
    }

    /// Iterate (logical, physical) pairs
    pub fn entries(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.bases
            .iter()
            .map(|(logical, base)| (logical.as_str(), Self::physical_name(base, self.version)))
    }
}
