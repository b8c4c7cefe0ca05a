//! Git data port: refs, commits, trees and blobs of a hosted repository.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// `owner/name` of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Errors from the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A non-forced ref update was rejected because the ref moved.
    #[error("ref {reference} is no longer at {expected}")]
    Conflict { reference: String, expected: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule pointer.
    Commit,
}

/// One entry of a (recursive) tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub sha: String,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644".to_string(),
            kind: EntryKind::Blob,
            sha: sha.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitTree {
    pub sha: String,
    pub entries: Vec<TreeEntry>,
    /// The listing hit the platform's size limit and is incomplete.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCommit {
    pub sha: String,
    pub tree_sha: String,
    pub parents: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommit {
    pub message: String,
    pub tree_sha: String,
    pub parents: Vec<String>,
}

/// Low-level git object operations. `reference` is always of the form
/// `heads/<branch>`.
#[async_trait]
pub trait GitDatabase: Send + Sync {
    /// Commit sha the ref points at.
    async fn get_ref(&self, repo: &RepoId, reference: &str) -> Result<String, HostError>;

    async fn get_commit(&self, repo: &RepoId, sha: &str) -> Result<GitCommit, HostError>;

    async fn get_tree(&self, repo: &RepoId, tree_sha: &str, recursive: bool)
        -> Result<GitTree, HostError>;

    /// Store UTF-8 content, returning its blob sha.
    async fn create_blob(&self, repo: &RepoId, content: &str) -> Result<String, HostError>;

    /// Create a tree from full-path entries, returning its sha.
    async fn create_tree(&self, repo: &RepoId, entries: &[TreeEntry]) -> Result<String, HostError>;

    async fn create_commit(&self, repo: &RepoId, commit: &NewCommit) -> Result<String, HostError>;

    /// Move `reference` to `sha` without forcing. Fails with
    /// [`HostError::Conflict`] when the ref is no longer at `expected`.
    async fn update_ref(
        &self,
        repo: &RepoId,
        reference: &str,
        sha: &str,
        expected: &str,
    ) -> Result<(), HostError>;
}
