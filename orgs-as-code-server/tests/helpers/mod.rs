//! In-memory collaborators for pipeline and router tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orgs_as_code_core::directory::{NameAvailability, NewOrganization, OrgDirectory};
use orgs_as_code_core::{Failure, HostError, MemoryGitDatabase, RepoId, Response, SchemaValidator};
use orgs_as_code_server::config::AppConfig;
use orgs_as_code_server::host::{ChangedFile, CheckRun, CommitStatus, FileStatus, RepositoryHost};
use orgs_as_code_server::pipeline::AppContext;
use serde_json::{json, Value};

pub const OWNER: &str = "acme";
pub const REPO: &str = "orgs-as-code-operations";
pub const FULL_NAME: &str = "acme/orgs-as-code-operations";
pub const SETTINGS_PATH: &str = ".github/orgs-as-code.yml";

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ── Repository host ────────────────────────────────────────────

#[derive(Default)]
pub struct FakeHost {
    contents: Mutex<HashMap<String, String>>,
    commit_files: Mutex<HashMap<String, Vec<ChangedFile>>>,
    pr_files: Mutex<HashMap<u64, Vec<ChangedFile>>>,
    pub statuses: Mutex<Vec<(String, CommitStatus)>>,
    pub check_runs: Mutex<Vec<CheckRun>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(self, yaml: &str) -> Self {
        self.put_file(SETTINGS_PATH, yaml);
        self
    }

    pub fn put_file(&self, path: &str, content: &str) {
        lock(&self.contents).insert(path.to_string(), content.to_string());
    }

    pub fn set_commit_files(&self, sha: &str, files: Vec<ChangedFile>) {
        lock(&self.commit_files).insert(sha.to_string(), files);
    }

    pub fn set_pr_files(&self, number: u64, files: Vec<ChangedFile>) {
        lock(&self.pr_files).insert(number, files);
    }

    pub fn statuses(&self) -> Vec<(String, CommitStatus)> {
        lock(&self.statuses).clone()
    }

    pub fn check_runs(&self) -> Vec<CheckRun> {
        lock(&self.check_runs).clone()
    }
}

#[async_trait]
impl RepositoryHost for FakeHost {
    async fn commit_files(&self, _repo: &RepoId, sha: &str) -> Result<Vec<ChangedFile>, HostError> {
        Ok(lock(&self.commit_files).get(sha).cloned().unwrap_or_default())
    }

    async fn pull_request_files(
        &self,
        _repo: &RepoId,
        number: u64,
    ) -> Result<Vec<ChangedFile>, HostError> {
        Ok(lock(&self.pr_files).get(&number).cloned().unwrap_or_default())
    }

    async fn file_content(
        &self,
        _repo: &RepoId,
        path: &str,
        _reference: &str,
    ) -> Result<String, HostError> {
        lock(&self.contents)
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::NotFound(path.to_string()))
    }

    async fn create_commit_status(
        &self,
        _repo: &RepoId,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<(), HostError> {
        lock(&self.statuses).push((sha.to_string(), status.clone()));
        Ok(())
    }

    async fn create_check_run(&self, _repo: &RepoId, run: &CheckRun) -> Result<(), HostError> {
        lock(&self.check_runs).push(run.clone());
        Ok(())
    }
}

pub fn added(path: &str) -> ChangedFile {
    changed(path, FileStatus::Added)
}

pub fn changed(path: &str, status: FileStatus) -> ChangedFile {
    ChangedFile {
        filename: path.to_string(),
        status,
        blob_url: Some(format!("https://ghe.example.com/{}/blob/head/{}", FULL_NAME, path)),
    }
}

// ── Directory ──────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeDirectory {
    taken: Mutex<HashSet<String>>,
    pub created: Mutex<Vec<NewOrganization>>,
    fail_create: bool,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn take(&self, name: &str) {
        lock(&self.taken).insert(name.to_string());
    }

    pub fn created(&self) -> Vec<NewOrganization> {
        lock(&self.created).clone()
    }
}

#[async_trait]
impl OrgDirectory for FakeDirectory {
    async fn name_exists(&self, name: &str) -> Response<NameAvailability> {
        Ok(NameAvailability {
            taken: lock(&self.taken).contains(name),
        })
    }

    async fn create(&self, org: &NewOrganization) -> Response<String> {
        if self.fail_create {
            return Err(Failure::new("Failed to create new Organization")
                .with_detail("FORBIDDEN: must be an enterprise owner"));
        }
        let mut created = lock(&self.created);
        created.push(org.clone());
        lock(&self.taken).insert(org.login.clone());
        Ok(format!("O_{}", created.len()))
    }
}

// ── Context ────────────────────────────────────────────────────

pub fn config(secret: Option<&str>) -> AppConfig {
    let mut vars: HashMap<&str, String> = HashMap::from([
        ("CONFIGURATION_ORGANIZATION", OWNER.to_string()),
        ("GHE_HOST", "ghe.example.com".to_string()),
        ("REPOSITORY_TOKEN", "repo-token".to_string()),
        ("ENTERPRISE_ADMIN_TOKEN", "admin-token".to_string()),
    ]);
    if let Some(secret) = secret {
        vars.insert("WEBHOOK_SECRET", secret.to_string());
    }
    AppConfig::from_lookup(|key| vars.get(key).cloned()).expect("test configuration")
}

pub struct Harness {
    pub host: Arc<FakeHost>,
    pub git: Arc<MemoryGitDatabase>,
    pub directory: Arc<FakeDirectory>,
    pub ctx: Arc<AppContext>,
}

impl Harness {
    pub fn new(host: FakeHost, git: MemoryGitDatabase, directory: FakeDirectory) -> Self {
        Self::with_config(config(None), host, git, directory)
    }

    pub fn with_config(
        config: AppConfig,
        host: FakeHost,
        git: MemoryGitDatabase,
        directory: FakeDirectory,
    ) -> Self {
        let host = Arc::new(host);
        let git = Arc::new(git);
        let directory = Arc::new(directory);
        let schema = Arc::new(SchemaValidator::new().expect("embedded schema compiles"));
        let ctx = Arc::new(AppContext::new(
            config,
            host.clone(),
            git.clone(),
            directory.clone(),
            schema,
        ));
        Self {
            host,
            git,
            directory,
            ctx,
        }
    }
}

// ── Payloads ───────────────────────────────────────────────────

pub fn repository(full_name: &str) -> Value {
    let (owner, name) = full_name.split_once('/').unwrap_or((OWNER, full_name));
    json!({
        "name": name,
        "full_name": full_name,
        "owner": { "login": owner }
    })
}

pub fn push_payload(full_name: &str, git_ref: &str, after: &str, sender_type: &str) -> Value {
    json!({
        "ref": git_ref,
        "before": "0000000000000000000000000000000000000000",
        "after": after,
        "repository": repository(full_name),
        "sender": {
            "login": if sender_type == "Bot" { "orgs-as-code[bot]" } else { "alice" },
            "type": sender_type
        },
        "enterprise": { "id": 1, "slug": "acme", "node_id": "E_kgDOAA" }
    })
}

pub fn pull_request_payload(full_name: &str, action: &str, number: u64, head_sha: &str) -> Value {
    json!({
        "action": action,
        "number": number,
        "pull_request": { "number": number, "head": { "sha": head_sha } },
        "repository": repository(full_name)
    })
}

pub fn orgfile_json(name: &str, owners: &[&str]) -> String {
    let owners: Vec<Value> = owners.iter().map(|o| json!({ "identityName": o })).collect();
    serde_json::to_string_pretty(&json!({
        "name": name,
        "owners": owners,
        "sponsor": { "billingEmail": "sponsor@acme.example.com" }
    }))
    .expect("serializable")
}
