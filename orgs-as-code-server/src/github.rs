//! REST client for the hosting platform.
//!
//! One [`GitHubClient`] implements both ports: [`RepositoryHost`] for change
//! listings, contents, statuses and check runs, and [`GitDatabase`] for the
//! low-level object writes of the tree-rewrite protocol.

use std::time::Duration;

use async_trait::async_trait;
use orgs_as_code_core::git::{GitCommit, GitDatabase, GitTree, NewCommit, TreeEntry};
use orgs_as_code_core::{HostError, RepoId};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::host::{ChangedFile, CheckRun, CommitStatus, RepositoryHost};

const PER_PAGE: usize = 100;
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

pub struct GitHubClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl GitHubClient {
    /// `base_url` is the REST root, e.g. `https://ghe.example.com/api/v3`.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, HostError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("orgs-as-code/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HostError::Transport(e.to_string()))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| HostError::Decode(format!("invalid base url {}: {}", base_url, e)))?;

        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    /// `/repos/{owner}/{repo}/...` with every `/`-separated part percent-encoded.
    fn repo_url(&self, repo: &RepoId, tail: &[&str]) -> Result<Url, HostError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| HostError::Decode("base url cannot carry a path".to_string()))?;
            segments.pop_if_empty();
            segments.extend(["repos", repo.owner.as_str(), repo.name.as_str()]);
            for part in tail {
                segments.extend(part.split('/'));
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.request_accepting(method, url, JSON_MEDIA_TYPE)
    }

    fn request_accepting(&self, method: Method, url: Url, accept: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", accept)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, HostError> {
        let response = request
            .send()
            .await
            .map_err(|e| HostError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(HostError::NotFound(url));
        }
        Err(HostError::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HostError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))
    }
}

// ── Response shapes ────────────────────────────────────────────

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: ShaOnly,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
    tree: ShaOnly,
    #[serde(default)]
    parents: Vec<ShaOnly>,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    sha: String,
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct CommitFilesResponse {
    #[serde(default)]
    files: Vec<ChangedFile>,
}

// ── RepositoryHost ─────────────────────────────────────────────

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn commit_files(&self, repo: &RepoId, sha: &str) -> Result<Vec<ChangedFile>, HostError> {
        let url = self.repo_url(repo, &["commits", sha])?;
        let response: CommitFilesResponse = self.json(self.request(Method::GET, url)).await?;
        Ok(response.files)
    }

    async fn pull_request_files(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<ChangedFile>, HostError> {
        let number = number.to_string();
        let mut files = Vec::new();
        let mut page = 1usize;
        loop {
            let mut url = self.repo_url(repo, &["pulls", &number, "files"])?;
            url.query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());
            let batch: Vec<ChangedFile> = self.json(self.request(Method::GET, url)).await?;
            let last = batch.len() < PER_PAGE;
            files.extend(batch);
            if last {
                break;
            }
            page += 1;
        }
        tracing::debug!(repo = %repo, number = %number, files = files.len(), "listed pull request files");
        Ok(files)
    }

    async fn file_content(
        &self,
        repo: &RepoId,
        path: &str,
        reference: &str,
    ) -> Result<String, HostError> {
        let mut url = self.repo_url(repo, &["contents", path])?;
        url.query_pairs_mut().append_pair("ref", reference);
        let request = self.request_accepting(Method::GET, url, RAW_MEDIA_TYPE);
        self.send(request)
            .await?
            .text()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))
    }

    async fn create_commit_status(
        &self,
        repo: &RepoId,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<(), HostError> {
        let url = self.repo_url(repo, &["statuses", sha])?;
        self.send(self.request(Method::POST, url).json(status)).await?;
        Ok(())
    }

    async fn create_check_run(&self, repo: &RepoId, run: &CheckRun) -> Result<(), HostError> {
        let url = self.repo_url(repo, &["check-runs"])?;
        let body = json!({
            "name": run.name,
            "head_sha": run.head_sha,
            "status": "completed",
            "conclusion": run.conclusion,
            "output": run.output,
        });
        self.send(self.request(Method::POST, url).json(&body)).await?;
        Ok(())
    }
}

// ── GitDatabase ────────────────────────────────────────────────

#[async_trait]
impl GitDatabase for GitHubClient {
    async fn get_ref(&self, repo: &RepoId, reference: &str) -> Result<String, HostError> {
        let url = self.repo_url(repo, &["git", "ref", reference])?;
        let response: RefResponse = self.json(self.request(Method::GET, url)).await?;
        Ok(response.object.sha)
    }

    async fn get_commit(&self, repo: &RepoId, sha: &str) -> Result<GitCommit, HostError> {
        let url = self.repo_url(repo, &["git", "commits", sha])?;
        let response: CommitResponse = self.json(self.request(Method::GET, url)).await?;
        Ok(GitCommit {
            sha: response.sha,
            tree_sha: response.tree.sha,
            parents: response.parents.into_iter().map(|p| p.sha).collect(),
            message: response.message,
        })
    }

    async fn get_tree(
        &self,
        repo: &RepoId,
        tree_sha: &str,
        recursive: bool,
    ) -> Result<GitTree, HostError> {
        let mut url = self.repo_url(repo, &["git", "trees", tree_sha])?;
        if recursive {
            url.query_pairs_mut().append_pair("recursive", "1");
        }
        let response: TreeResponse = self.json(self.request(Method::GET, url)).await?;
        Ok(GitTree {
            sha: response.sha,
            entries: response.tree,
            truncated: response.truncated,
        })
    }

    async fn create_blob(&self, repo: &RepoId, content: &str) -> Result<String, HostError> {
        let url = self.repo_url(repo, &["git", "blobs"])?;
        let body = json!({ "content": content, "encoding": "utf-8" });
        let response: ShaOnly = self.json(self.request(Method::POST, url).json(&body)).await?;
        Ok(response.sha)
    }

    async fn create_tree(&self, repo: &RepoId, entries: &[TreeEntry]) -> Result<String, HostError> {
        let url = self.repo_url(repo, &["git", "trees"])?;
        let body = json!({ "tree": entries });
        let response: ShaOnly = self.json(self.request(Method::POST, url).json(&body)).await?;
        Ok(response.sha)
    }

    async fn create_commit(&self, repo: &RepoId, commit: &NewCommit) -> Result<String, HostError> {
        let url = self.repo_url(repo, &["git", "commits"])?;
        let body = json!({
            "message": commit.message,
            "tree": commit.tree_sha,
            "parents": commit.parents,
        });
        let response: ShaOnly = self.json(self.request(Method::POST, url).json(&body)).await?;
        Ok(response.sha)
    }

    /// Non-forced update. The new commit's parent is `expected`, so the
    /// platform rejects it as "not a fast forward" (422) once the ref has
    /// moved; that rejection is reported as a conflict.
    async fn update_ref(
        &self,
        repo: &RepoId,
        reference: &str,
        sha: &str,
        expected: &str,
    ) -> Result<(), HostError> {
        let url = self.repo_url(repo, &["git", "refs", reference])?;
        let body = json!({ "sha": sha, "force": false });
        match self.send(self.request(Method::PATCH, url).json(&body)).await {
            Ok(_) => Ok(()),
            Err(e) => Err(ref_update_error(e, reference, expected)),
        }
    }
}

/// Only a "not a fast forward" 422 means the ref moved. Other 422s (missing
/// ref, unknown object) stay as status errors.
fn ref_update_error(error: HostError, reference: &str, expected: &str) -> HostError {
    match error {
        HostError::Status { status: 422, body }
            if body.to_ascii_lowercase().contains("not a fast forward") =>
        {
            tracing::warn!(reference, expected, body = %body, "ref moved during update");
            HostError::Conflict {
                reference: reference.to_string(),
                expected: expected.to_string(),
            }
        }
        HostError::Status { status: 422, body } => {
            tracing::warn!(reference, expected, body = %body, "ref update rejected");
            HostError::Status { status: 422, body }
        }
        other => other,
    }
}
