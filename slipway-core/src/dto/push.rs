//! Push trigger DTOs

use serde::{Deserialize, Serialize};

use crate::domain::repository::RepositoryRef;
use crate::domain::run::PipelineRun;

/// Request body for `POST /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub repo: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl From<PushRequest> for RepositoryRef {
    fn from(req: PushRequest) -> Self {
        RepositoryRef {
            url: req.repo,
            branch: req.branch,
            commit: req.commit,
        }
    }
}

/// Subset of a GitHub `push` webhook payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubPushEvent {
    #[serde(rename = "ref", default)]
    pub git_ref: Option<String>,
    /// Commit SHA the ref points to after the push
    #[serde(default)]
    pub after: Option<String>,
    /// Set when the push deleted the ref
    #[serde(default)]
    pub deleted: bool,
    pub repository: GithubRepository,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubRepository {
    pub clone_url: String,
}

impl GithubPushEvent {
    /// Extracts the branch name from a `refs/heads/<branch>` ref
    ///
    /// Tags, pull request refs and branch names containing `/` are not treated
    /// as branch updates.
    pub fn branch(&self) -> Option<&str> {
        let git_ref = self.git_ref.as_deref()?;
        let parts: Vec<&str> = git_ref.split('/').collect();
        match parts.as_slice() {
            ["refs", "heads", branch] if !branch.is_empty() => Some(branch),
            _ => None,
        }
    }

    /// Converts the event into a repository reference if it updates a branch
    ///
    /// Branch deletions have nothing to build and yield `None`.
    pub fn repository_ref(&self) -> Option<RepositoryRef> {
        if self.deleted {
            return None;
        }
        let branch = self.branch()?;
        let mut repo = RepositoryRef::new(self.repository.clone_url.clone(), branch);
        repo.commit = self.after.clone();
        Some(repo)
    }
}

/// Response body for `POST /github`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubTriggerResponse {
    pub queued: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<PipelineRun>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
