//! Repository host port: the REST surface the pipelines need beyond raw git
//! objects.

use async_trait::async_trait;
use orgs_as_code_core::{HostError, RepoId};
use serde::{Deserialize, Serialize};

/// Context and check-run name under which results are reported.
pub const STATUS_CONTEXT: &str = "orgs-as-code";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    Copied,
    Changed,
    Unchanged,
}

/// A file touched by a commit or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: FileStatus,
    /// Browse URL of the file at the change's commit.
    #[serde(default)]
    pub blob_url: Option<String>,
}

impl ChangedFile {
    pub fn is_removed(&self) -> bool {
        self.status == FileStatus::Removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Success,
    Error,
    Failure,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub state: StatusState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub context: String,
}

impl CommitStatus {
    pub fn new(state: StatusState, description: impl Into<String>) -> Self {
        Self {
            state,
            description: Some(description.into()),
            context: STATUS_CONTEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckConclusion {
    Success,
    Failure,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutput {
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A completed check run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub head_sha: String,
    pub conclusion: CheckConclusion,
    pub output: CheckOutput,
}

impl CheckRun {
    pub fn completed(
        head_sha: impl Into<String>,
        conclusion: CheckConclusion,
        title: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            name: STATUS_CONTEXT.to_string(),
            head_sha: head_sha.into(),
            conclusion,
            output: CheckOutput {
                title: title.into(),
                summary: summary.into(),
                text: None,
            },
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.output.text = Some(text.into());
        self
    }
}

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Files changed by a single commit.
    async fn commit_files(&self, repo: &RepoId, sha: &str) -> Result<Vec<ChangedFile>, HostError>;

    /// Every file changed by a pull request, across all pages.
    async fn pull_request_files(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<ChangedFile>, HostError>;

    /// Raw content of `path` at `reference` (branch name or sha).
    async fn file_content(
        &self,
        repo: &RepoId,
        path: &str,
        reference: &str,
    ) -> Result<String, HostError>;

    async fn create_commit_status(
        &self,
        repo: &RepoId,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<(), HostError>;

    async fn create_check_run(&self, repo: &RepoId, run: &CheckRun) -> Result<(), HostError>;

    /// Content of an optional file; `None` when it does not exist.
    async fn optional_file(
        &self,
        repo: &RepoId,
        path: &str,
        reference: &str,
    ) -> Result<Option<String>, HostError> {
        match self.file_content(repo, path, reference).await {
            Ok(content) => Ok(Some(content)),
            Err(HostError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_file_decodes_github_shape() {
        let file: ChangedFile = serde_json::from_value(serde_json::json!({
            "sha": "abc",
            "filename": "organizations/acme/new-orgfile.json",
            "status": "added",
            "additions": 5,
            "blob_url": "https://ghe.example.com/acme/ops/blob/abc/organizations/acme/new-orgfile.json",
            "raw_url": "https://ghe.example.com/acme/ops/raw/abc/organizations/acme/new-orgfile.json"
        }))
        .unwrap();
        assert_eq!(file.status, FileStatus::Added);
        assert!(!file.is_removed());
        assert!(file.blob_url.is_some());
    }

    #[test]
    fn check_run_uses_the_bot_name() {
        let run = CheckRun::completed("abc", CheckConclusion::Skipped, "t", "s").with_text("x");
        assert_eq!(run.name, "orgs-as-code");
        assert_eq!(run.output.text.as_deref(), Some("x"));
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["conclusion"], "skipped");
    }
}
