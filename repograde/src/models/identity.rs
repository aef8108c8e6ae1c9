//! Repository identity
//!
//! The (owner, name) pair canonically derived from a repository URL. It is
//! the deduplication key for a run and names every artifact on disk.

use std::fmt;

/// Canonical GitHub repository identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoIdentity {
    owner: String,
    name: String,
}

impl RepoIdentity {
    /// Returns `None` when either part is empty
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Option<Self> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self { owner, name })
    }

    /// Recover an identity from an item key (`owner.name`)
    ///
    /// GitHub owners cannot contain dots, so the first dot separates owner
    /// from name.
    pub fn from_key(key: &str) -> Option<Self> {
        let (owner, name) = key.split_once('.')?;
        Self::new(owner, name)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem-safe item key used for artifact file names
    pub fn key(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }

    /// Canonical source URL handed to the snapshot tool
    pub fn url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
