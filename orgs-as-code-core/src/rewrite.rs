//! Tree-rewrite protocol.
//!
//! Replaces `<folder>/new-orgfile.*` with `<folder>/orgfile.<ext>` in a single
//! commit composed from git objects:
//!
//! ```text
//! RefResolved → CommitResolved → TreeFetched → BlobWritten
//!             → TreeComposed → CommitCreated → RefUpdated
//! ```
//!
//! Only the final step mutates a ref, so a failure at any earlier stage leaves
//! the branch untouched. The ref update is not forced: if another writer moved
//! the branch since it was resolved, the result is [`RewriteError::Conflict`].

use crate::declaration::DeclarationPath;
use crate::git::{EntryKind, GitDatabase, GitTree, HostError, NewCommit, RepoId, TreeEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteStage {
    ResolveRef,
    ResolveCommit,
    FetchTree,
    WriteBlob,
    ComposeTree,
    CreateCommit,
    UpdateRef,
}

impl std::fmt::Display for RewriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RewriteStage::ResolveRef => "resolve ref",
            RewriteStage::ResolveCommit => "resolve commit",
            RewriteStage::FetchTree => "fetch tree",
            RewriteStage::WriteBlob => "write blob",
            RewriteStage::ComposeTree => "compose tree",
            RewriteStage::CreateCommit => "create commit",
            RewriteStage::UpdateRef => "update ref",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error("{stage} failed: {source}")]
    Step {
        stage: RewriteStage,
        #[source]
        source: HostError,
    },

    #[error("{reference} moved while rewriting (expected {expected})")]
    Conflict { reference: String, expected: String },

    #[error("tree {sha} listing is truncated; refusing to compose from it")]
    TruncatedTree { sha: String },
}

impl RewriteError {
    fn at(stage: RewriteStage) -> impl FnOnce(HostError) -> RewriteError {
        move |source| match source {
            HostError::Conflict {
                reference,
                expected,
            } => RewriteError::Conflict {
                reference,
                expected,
            },
            source => RewriteError::Step { stage, source },
        }
    }
}

/// Replace a "new" declaration with its confirmed file.
#[derive(Debug, Clone)]
pub struct RewriteRequest<'a> {
    pub repo: &'a RepoId,
    /// `heads/<branch>`.
    pub reference: &'a str,
    pub declaration: &'a DeclarationPath,
    /// Rendered content of the confirmed file.
    pub contents: &'a str,
    /// Identifier of the created organization, recorded in the commit message.
    pub org_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub previous_sha: String,
    pub commit_sha: String,
    pub confirmed_path: String,
    pub removed_paths: Vec<String>,
}

pub fn commit_message(org_id: &str) -> String {
    format!(
        "Replace new-orgfile with orgfile\n* orgfile contains id of newly created org `{}`",
        org_id
    )
}

/// New tree entries: every blob-like entry except the "new" files under
/// `new_prefix` (case-insensitive), plus the confirmed file.
pub fn compose_entries(
    tree: &GitTree,
    new_prefix: &str,
    confirmed: TreeEntry,
) -> (Vec<TreeEntry>, Vec<String>) {
    let prefix = new_prefix.to_ascii_lowercase();
    let mut removed = Vec::new();
    let mut entries: Vec<TreeEntry> = tree
        .entries
        .iter()
        .filter(|e| e.kind != EntryKind::Tree)
        .filter(|e| {
            let drop = e.path.to_ascii_lowercase().starts_with(&prefix)
                || e.path.eq_ignore_ascii_case(&confirmed.path);
            if drop && !e.path.eq_ignore_ascii_case(&confirmed.path) {
                removed.push(e.path.clone());
            }
            !drop
        })
        .cloned()
        .collect();
    entries.push(confirmed);
    (entries, removed)
}

pub async fn replace_new_declaration<G>(
    git: &G,
    request: RewriteRequest<'_>,
) -> Result<RewriteOutcome, RewriteError>
where
    G: GitDatabase + ?Sized,
{
    let RewriteRequest {
        repo,
        reference,
        declaration,
        contents,
        org_id,
    } = request;

    let head = git
        .get_ref(repo, reference)
        .await
        .map_err(RewriteError::at(RewriteStage::ResolveRef))?;
    tracing::debug!(repo = %repo, reference, sha = %head, "ref resolved");

    let commit = git
        .get_commit(repo, &head)
        .await
        .map_err(RewriteError::at(RewriteStage::ResolveCommit))?;
    tracing::debug!(tree = %commit.tree_sha, "commit resolved");

    let tree = git
        .get_tree(repo, &commit.tree_sha, true)
        .await
        .map_err(RewriteError::at(RewriteStage::FetchTree))?;
    if tree.truncated {
        tracing::warn!(tree = %tree.sha, "refusing truncated tree listing");
        return Err(RewriteError::TruncatedTree { sha: tree.sha });
    }
    tracing::debug!(entries = tree.entries.len(), "tree fetched");

    let blob = git
        .create_blob(repo, contents)
        .await
        .map_err(RewriteError::at(RewriteStage::WriteBlob))?;
    tracing::debug!(blob = %blob, "blob written");

    let confirmed_path = declaration.confirmed_path();
    let (entries, removed_paths) = compose_entries(
        &tree,
        &declaration.new_prefix(),
        TreeEntry::blob(confirmed_path.clone(), blob),
    );
    let tree_sha = git
        .create_tree(repo, &entries)
        .await
        .map_err(RewriteError::at(RewriteStage::ComposeTree))?;
    tracing::debug!(tree = %tree_sha, removed = ?removed_paths, "tree composed");

    let commit_sha = git
        .create_commit(
            repo,
            &NewCommit {
                message: commit_message(org_id),
                tree_sha,
                parents: vec![head.clone()],
            },
        )
        .await
        .map_err(RewriteError::at(RewriteStage::CreateCommit))?;
    tracing::debug!(commit = %commit_sha, "commit created");

    git.update_ref(repo, reference, &commit_sha, &head)
        .await
        .map_err(RewriteError::at(RewriteStage::UpdateRef))?;
    tracing::info!(
        repo = %repo,
        reference,
        from = %head,
        to = %commit_sha,
        path = %confirmed_path,
        "declaration confirmed"
    );

    Ok(RewriteOutcome {
        previous_sha: head,
        commit_sha,
        confirmed_path,
        removed_paths,
    })
}
