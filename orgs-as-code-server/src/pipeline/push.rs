//! Push pipeline: provision organizations for merged `new-orgfile.*` files.
//!
//! Each new declaration in the pushed commit is fetched, parsed, created in
//! the directory, stamped with the new organization's id and written back as
//! `orgfile.*` through the tree-rewrite protocol. Files are processed one at a
//! time; a failure on one file does not stop the others. A single commit
//! status summarizing every file is posted for the pushed sha.

use orgs_as_code_core::codec::{self, CodecError};
use orgs_as_code_core::declaration::is_new_declaration;
use orgs_as_code_core::rewrite::{replace_new_declaration, RewriteError, RewriteOutcome, RewriteRequest};
use orgs_as_code_core::settings::OrgsAsCodeSettings;
use orgs_as_code_core::{Declaration, DeclarationPath, Failure, HostError, NewOrganization, RepoId};

use super::{AppContext, PipelineError, NOTHING_TO_DO, UNABLE_TO_LOAD_CONFIGURATION};
use crate::events::{Enterprise, PushEvent};
use crate::host::{ChangedFile, CommitStatus, StatusState};

/// GitHub truncates longer status descriptions.
const MAX_DESCRIPTION: usize = 140;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Failed to fetch new org file.")]
    Fetch(#[source] HostError),

    #[error("Failed to parse new org file.")]
    Parse(#[source] CodecError),

    #[error("New org file is not valid.")]
    Invalid(Vec<String>),

    #[error("Failed to create new Organization")]
    Create(#[source] Failure),

    #[error("Failed to render orgfile.")]
    Render(#[source] CodecError),

    #[error("Failed to replace new-orgfile with orgfile.")]
    Rewrite(#[source] RewriteError),
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: String,
    pub result: Result<ProvisionedOrg, ProvisionError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedOrg {
    pub login: String,
    pub org_id: String,
    pub rewrite: RewriteOutcome,
}

#[derive(Debug)]
pub enum PushOutcome {
    /// Not a push to the main branch; nothing posted.
    Ignored,
    /// A no-op success status was posted.
    NothingToDo,
    /// Settings could not be loaded; an error status was posted.
    ConfigurationUnavailable,
    /// The delivery carried no enterprise; an error status was posted.
    MissingEnterprise,
    Processed {
        state: StatusState,
        files: Vec<FileOutcome>,
    },
}

pub async fn handle_push(ctx: &AppContext, event: &PushEvent) -> Result<PushOutcome, PipelineError> {
    if event.git_ref != ctx.config.main_ref() {
        tracing::debug!(git_ref = %event.git_ref, "push not to main branch");
        return Ok(PushOutcome::Ignored);
    }

    let repo = event.repository.repo_id();
    let sha = event.after.as_str();

    if !ctx.is_configuration_repo(&event.repository) {
        tracing::info!(repo = %repo, "event not from configured configuration repository");
        post_status(ctx, &repo, sha, CommitStatus::new(StatusState::Success, NOTHING_TO_DO)).await?;
        return Ok(PushOutcome::NothingToDo);
    }

    if event.is_from_bot() {
        tracing::info!(repo = %repo, sha, "push by bot actor");
        post_status(ctx, &repo, sha, CommitStatus::new(StatusState::Success, NOTHING_TO_DO)).await?;
        return Ok(PushOutcome::NothingToDo);
    }

    let settings = match ctx.load_settings(&repo).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(repo = %repo, error = %e, "settings unavailable");
            let status = CommitStatus::new(StatusState::Error, UNABLE_TO_LOAD_CONFIGURATION);
            post_status(ctx, &repo, sha, status).await?;
            return Ok(PushOutcome::ConfigurationUnavailable);
        }
    };

    let Some(enterprise) = event.enterprise.as_ref() else {
        tracing::error!(repo = %repo, "event not from an enterprise instance");
        let status = CommitStatus::new(StatusState::Error, "Event is not from an enterprise instance");
        post_status(ctx, &repo, sha, status).await?;
        return Ok(PushOutcome::MissingEnterprise);
    };

    let changed = ctx
        .host
        .commit_files(&repo, sha)
        .await
        .map_err(PipelineError::ListFiles)?;
    let new_files: Vec<ChangedFile> = changed
        .into_iter()
        .filter(|f| !f.is_removed() && is_new_declaration(&f.filename))
        .collect();

    if new_files.is_empty() {
        post_status(ctx, &repo, sha, CommitStatus::new(StatusState::Success, NOTHING_TO_DO)).await?;
        return Ok(PushOutcome::NothingToDo);
    }

    tracing::info!(repo = %repo, sha, files = new_files.len(), "provisioning new declarations");

    let files = {
        let _guard = ctx.push_lock.lock().await;
        let mut files = Vec::with_capacity(new_files.len());
        for file in &new_files {
            let result = provision(ctx, &repo, sha, &settings, enterprise, file).await;
            match &result {
                Ok(org) => tracing::info!(
                    path = %file.filename,
                    login = %org.login,
                    org_id = %org.org_id,
                    commit = %org.rewrite.commit_sha,
                    "organization provisioned"
                ),
                Err(e) => tracing::error!(path = %file.filename, error = %e, cause = ?e, "provisioning failed"),
            }
            files.push(FileOutcome {
                path: file.filename.clone(),
                result,
            });
        }
        files
    };

    let status = summarize(&files);
    let state = status.state;
    post_status(ctx, &repo, sha, status).await?;
    Ok(PushOutcome::Processed { state, files })
}

async fn provision(
    ctx: &AppContext,
    repo: &RepoId,
    sha: &str,
    settings: &OrgsAsCodeSettings,
    enterprise: &Enterprise,
    file: &ChangedFile,
) -> Result<ProvisionedOrg, ProvisionError> {
    let path = file.filename.as_str();
    let declaration_path = DeclarationPath::parse(path).ok_or_else(|| {
        ProvisionError::Parse(CodecError::UnsupportedExtension {
            path: path.to_string(),
        })
    })?;

    let contents = ctx
        .host
        .file_content(repo, path, sha)
        .await
        .map_err(ProvisionError::Fetch)?;
    let mut declaration = Declaration::parse(path, &contents).map_err(ProvisionError::Parse)?;

    let schema = ctx.schema.validate(&declaration.document);
    if !schema.valid {
        return Err(ProvisionError::Invalid(schema.messages));
    }
    let org = declaration.to_org().map_err(ProvisionError::Parse)?;

    let request = NewOrganization {
        login: org.name.clone(),
        profile_name: org.name.clone(),
        billing_email: org.sponsor.billing_email.clone(),
        admin_logins: org.admin_logins(&settings.always_added_owners),
        enterprise_id: enterprise.node_id.clone(),
    };
    tracing::debug!(login = %request.login, admins = ?request.admin_logins, "creating organization");
    // Never retried: a failed request may still have created the organization.
    let org_id = ctx
        .directory
        .create(&request)
        .await
        .map_err(ProvisionError::Create)?;

    declaration
        .stamp_existing_org(&org_id)
        .map_err(ProvisionError::Render)?;
    let rendered =
        codec::render(declaration_path.format, &declaration.document).map_err(ProvisionError::Render)?;

    let reference = ctx.config.main_head();
    let rewrite = replace_new_declaration(
        ctx.git.as_ref(),
        RewriteRequest {
            repo,
            reference: &reference,
            declaration: &declaration_path,
            contents: &rendered,
            org_id: &org_id,
        },
    )
    .await
    .map_err(ProvisionError::Rewrite)?;

    Ok(ProvisionedOrg {
        login: org.name,
        org_id,
        rewrite,
    })
}

/// `error` if any file failed, `success` otherwise.
fn summarize(files: &[FileOutcome]) -> CommitStatus {
    let failures: Vec<String> = files
        .iter()
        .filter_map(|f| f.result.as_ref().err().map(|e| format!("{}: {}", f.path, e)))
        .collect();

    if failures.is_empty() {
        let created = files.len();
        return CommitStatus::new(
            StatusState::Success,
            format!("Created {} organization(s).", created),
        );
    }

    let mut description = failures.join("; ");
    if description.chars().count() > MAX_DESCRIPTION {
        description = description.chars().take(MAX_DESCRIPTION - 3).collect::<String>() + "...";
    }
    CommitStatus::new(StatusState::Error, description)
}

async fn post_status(
    ctx: &AppContext,
    repo: &RepoId,
    sha: &str,
    status: CommitStatus,
) -> Result<(), PipelineError> {
    tracing::debug!(repo = %repo, sha, state = ?status.state, description = ?status.description, "posting commit status");
    ctx.host
        .create_commit_status(repo, sha, &status)
        .await
        .map_err(PipelineError::Report)
}
