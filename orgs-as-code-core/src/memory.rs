//! In-memory [`GitDatabase`] for tests and local runs.
//!
//! Models a single repository: the `repo` argument of every call is ignored.
//! Objects are content-addressed with SHA-256 (truncated to 40 hex chars) and
//! ref updates are compare-and-swap against the expected prior commit.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::git::{EntryKind, GitCommit, GitDatabase, GitTree, HostError, NewCommit, RepoId, TreeEntry};

/// Operations that can be made to fail once, to exercise error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    GetRef,
    GetCommit,
    GetTree,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateRef,
}

#[derive(Default)]
struct State {
    refs: HashMap<String, String>,
    commits: HashMap<String, GitCommit>,
    /// Tree sha → full-path non-directory entries.
    trees: HashMap<String, BTreeMap<String, TreeEntry>>,
    blobs: HashMap<String, String>,
    fail_once: BTreeSet<Operation>,
    truncate_trees: bool,
    /// Files committed by "someone else" right before the next ref update.
    concurrent_push: Option<Vec<(String, String)>>,
}

#[derive(Default)]
pub struct MemoryGitDatabase {
    state: Mutex<State>,
}

impl MemoryGitDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository with one root commit on `heads/<branch>` containing `files`.
    pub fn with_files(branch: &str, files: &[(&str, &str)]) -> Self {
        let db = Self::new();
        {
            let mut state = db.lock();
            let tree = state.write_files(BTreeMap::new(), files);
            let commit = state.write_commit(NewCommit {
                message: "Initial commit".to_string(),
                tree_sha: tree,
                parents: Vec::new(),
            });
            state.refs.insert(format!("heads/{}", branch), commit);
        }
        db
    }

    /// Fail the next call of `op` with a 500.
    pub fn fail_once(&self, op: Operation) {
        self.lock().fail_once.insert(op);
    }

    /// Report every tree listing as truncated.
    pub fn truncate_trees(&self) {
        self.lock().truncate_trees = true;
    }

    /// Commit `files` on top of the ref right before the next `update_ref`,
    /// as a concurrent writer would.
    pub fn simulate_concurrent_push(&self, files: &[(&str, &str)]) {
        self.lock().concurrent_push = Some(
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        );
    }

    pub fn head(&self, reference: &str) -> Option<String> {
        self.lock().refs.get(reference).cloned()
    }

    pub fn commit(&self, sha: &str) -> Option<GitCommit> {
        self.lock().commits.get(sha).cloned()
    }

    /// Every file path at the tip of `reference`.
    pub fn paths(&self, reference: &str) -> Vec<String> {
        let state = self.lock();
        state
            .tip_entries(reference)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Content of `path` at the tip of `reference`.
    pub fn read_file(&self, reference: &str, path: &str) -> Option<String> {
        let state = self.lock();
        let entries = state.tip_entries(reference)?;
        let entry = entries.get(path)?;
        state.blobs.get(&entry.sha).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(state: &mut State, op: Operation) -> Result<(), HostError> {
        if state.fail_once.remove(&op) {
            return Err(HostError::Status {
                status: 500,
                body: format!("injected failure in {:?}", op),
            });
        }
        Ok(())
    }
}

impl State {
    fn tip_entries(&self, reference: &str) -> Option<&BTreeMap<String, TreeEntry>> {
        let head = self.refs.get(reference)?;
        let commit = self.commits.get(head)?;
        self.trees.get(&commit.tree_sha)
    }

    fn write_blob(&mut self, content: &str) -> String {
        let sha = object_id("blob", content.as_bytes());
        self.blobs.insert(sha.clone(), content.to_string());
        sha
    }

    fn write_tree(&mut self, entries: BTreeMap<String, TreeEntry>) -> String {
        let mut hasher = Sha256::new();
        for entry in entries.values() {
            hasher.update(entry.path.as_bytes());
            hasher.update(entry.mode.as_bytes());
            hasher.update(entry.sha.as_bytes());
        }
        let sha = truncate(hex::encode(hasher.finalize()));
        self.trees.insert(sha.clone(), entries);
        sha
    }

    fn write_files(&mut self, mut entries: BTreeMap<String, TreeEntry>, files: &[(&str, &str)]) -> String {
        for (path, content) in files {
            let sha = self.write_blob(content);
            entries.insert(path.to_string(), TreeEntry::blob(*path, sha));
        }
        self.write_tree(entries)
    }

    fn write_commit(&mut self, commit: NewCommit) -> String {
        let payload = format!(
            "{}\n{}\n{}",
            commit.tree_sha,
            commit.parents.join(","),
            commit.message
        );
        let sha = object_id("commit", payload.as_bytes());
        self.commits.insert(
            sha.clone(),
            GitCommit {
                sha: sha.clone(),
                tree_sha: commit.tree_sha,
                parents: commit.parents,
                message: commit.message,
            },
        );
        sha
    }
}

fn object_id(kind: &str, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(content);
    truncate(hex::encode(hasher.finalize()))
}

fn truncate(mut hex: String) -> String {
    hex.truncate(40);
    hex
}

/// Directory entries implied by a set of file paths.
fn directory_entries(files: &BTreeMap<String, TreeEntry>) -> Vec<TreeEntry> {
    let mut dirs = BTreeSet::new();
    for path in files.keys() {
        let mut prefix = path.as_str();
        while let Some((parent, _)) = prefix.rsplit_once('/') {
            dirs.insert(parent.to_string());
            prefix = parent;
        }
    }
    dirs.into_iter()
        .map(|path| TreeEntry {
            sha: object_id("tree", path.as_bytes()),
            path,
            mode: "040000".to_string(),
            kind: EntryKind::Tree,
        })
        .collect()
}

#[async_trait]
impl GitDatabase for MemoryGitDatabase {
    async fn get_ref(&self, _repo: &RepoId, reference: &str) -> Result<String, HostError> {
        let mut state = self.lock();
        Self::check(&mut state, Operation::GetRef)?;
        state
            .refs
            .get(reference)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("ref {}", reference)))
    }

    async fn get_commit(&self, _repo: &RepoId, sha: &str) -> Result<GitCommit, HostError> {
        let mut state = self.lock();
        Self::check(&mut state, Operation::GetCommit)?;
        state
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("commit {}", sha)))
    }

    async fn get_tree(
        &self,
        _repo: &RepoId,
        tree_sha: &str,
        recursive: bool,
    ) -> Result<GitTree, HostError> {
        let mut state = self.lock();
        Self::check(&mut state, Operation::GetTree)?;
        let files = state
            .trees
            .get(tree_sha)
            .ok_or_else(|| HostError::NotFound(format!("tree {}", tree_sha)))?;

        let mut entries = directory_entries(files);
        entries.extend(files.values().cloned());
        if !recursive {
            entries.retain(|e| !e.path.contains('/'));
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(GitTree {
            sha: tree_sha.to_string(),
            entries,
            truncated: state.truncate_trees,
        })
    }

    async fn create_blob(&self, _repo: &RepoId, content: &str) -> Result<String, HostError> {
        let mut state = self.lock();
        Self::check(&mut state, Operation::CreateBlob)?;
        Ok(state.write_blob(content))
    }

    async fn create_tree(&self, _repo: &RepoId, entries: &[TreeEntry]) -> Result<String, HostError> {
        let mut state = self.lock();
        Self::check(&mut state, Operation::CreateTree)?;
        let mut files = BTreeMap::new();
        for entry in entries {
            match entry.kind {
                EntryKind::Tree => {
                    return Err(HostError::Status {
                        status: 422,
                        body: format!("tree entry {} not supported", entry.path),
                    })
                }
                EntryKind::Blob if !state.blobs.contains_key(&entry.sha) => {
                    return Err(HostError::Status {
                        status: 422,
                        body: format!("unknown blob {}", entry.sha),
                    })
                }
                _ => {
                    files.insert(entry.path.clone(), entry.clone());
                }
            }
        }
        Ok(state.write_tree(files))
    }

    async fn create_commit(&self, _repo: &RepoId, commit: &NewCommit) -> Result<String, HostError> {
        let mut state = self.lock();
        Self::check(&mut state, Operation::CreateCommit)?;
        if !state.trees.contains_key(&commit.tree_sha) {
            return Err(HostError::Status {
                status: 422,
                body: format!("unknown tree {}", commit.tree_sha),
            });
        }
        Ok(state.write_commit(commit.clone()))
    }

    async fn update_ref(
        &self,
        _repo: &RepoId,
        reference: &str,
        sha: &str,
        expected: &str,
    ) -> Result<(), HostError> {
        let mut state = self.lock();
        Self::check(&mut state, Operation::UpdateRef)?;

        if let Some(files) = state.concurrent_push.take() {
            let head = state
                .refs
                .get(reference)
                .cloned()
                .ok_or_else(|| HostError::NotFound(format!("ref {}", reference)))?;
            let base = state
                .tip_entries(reference)
                .cloned()
                .unwrap_or_default();
            let borrowed: Vec<(&str, &str)> =
                files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
            let tree = state.write_files(base, &borrowed);
            let commit = state.write_commit(NewCommit {
                message: "Concurrent push".to_string(),
                tree_sha: tree,
                parents: vec![head],
            });
            state.refs.insert(reference.to_string(), commit);
        }

        let current = state
            .refs
            .get(reference)
            .ok_or_else(|| HostError::NotFound(format!("ref {}", reference)))?;
        if current != expected {
            return Err(HostError::Conflict {
                reference: reference.to_string(),
                expected: expected.to_string(),
            });
        }
        if !state.commits.contains_key(sha) {
            return Err(HostError::Status {
                status: 422,
                body: format!("unknown commit {}", sha),
            });
        }
        state.refs.insert(reference.to_string(), sha.to_string());
        Ok(())
    }
}
