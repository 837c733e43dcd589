//! Repository reference domain type

use serde::{Deserialize, Serialize};

/// Identifies the source of a push event
///
/// `(url, branch)` deterministically identifies the deployment target;
/// `commit` pins the exact revision when the trigger supplied one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub url: String,
    pub branch: String,
    #[serde(default)]
    pub commit: Option<String>,
}

impl RepositoryRef {
    pub fn new(url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: branch.into(),
            commit: None,
        }
    }

    /// Pins the reference to a specific commit
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.commit {
            Some(commit) => write!(f, "{}@{} ({})", self.url, self.branch, commit),
            None => write!(f, "{}@{}", self.url, self.branch),
        }
    }
}
