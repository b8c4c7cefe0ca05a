//! Pull-request pipeline: validate touched declarations and report a check run.

use std::sync::Arc;

use futures::future::join_all;
use orgs_as_code_core::declaration::is_declaration;
use orgs_as_code_core::report::{to_report, ValidationReport};
use orgs_as_code_core::validator::{ConfigurationValidator, StaticPrefixes};
use orgs_as_code_core::{Declaration, RepoId};

use super::{AppContext, PipelineError, UNABLE_TO_LOAD_CONFIGURATION};
use crate::events::PullRequestEvent;
use crate::host::{ChangedFile, CheckConclusion, CheckRun};

const NO_ORGFILES_TITLE: &str = "No orgfiles found!";
const NO_ORGFILES_SUMMARY: &str = "This bot only runs checks for specific files.";
const NO_ORGFILES_TEXT: &str = "This check was skipped as there were no **modified** `orgfile.yml` or `orgfile.json` files found under the `organizations` folder.";
const FETCH_FAILED_TITLE: &str = "Failed to fetch org file(s)";
const RESULTS_SUMMARY: &str = "Scan results are as follows:";
/// GitHub rejects check-run `output.text` longer than this (characters).
const MAX_CHECK_TEXT: usize = 65_535;
const TRUNCATED_NOTE: &str = "\n\n---\n_Report truncated: too many org files to show in full._\n";

#[derive(Debug)]
pub enum PullRequestOutcome {
    /// Wrong repository or action; nothing posted.
    Ignored,
    /// Settings could not be loaded; a skipped check run was posted.
    ConfigurationUnavailable,
    /// No declaration was touched; a skipped check run was posted.
    NoDeclarations,
    Validated {
        conclusion: CheckConclusion,
        report: ValidationReport,
        /// Paths that could not be fetched or parsed.
        fetch_failures: Vec<String>,
    },
}

pub async fn handle_pull_request(
    ctx: &AppContext,
    event: &PullRequestEvent,
) -> Result<PullRequestOutcome, PipelineError> {
    let repo = event.repository.repo_id();

    if !ctx.is_configuration_repo(&event.repository) {
        tracing::info!(repo = %repo, "event not from configured configuration repository");
        return Ok(PullRequestOutcome::Ignored);
    }
    if !event.needs_validation() {
        tracing::debug!(action = %event.action, "pull request action not validated");
        return Ok(PullRequestOutcome::Ignored);
    }

    let number = event.pull_request.number;
    let head_sha = event.pull_request.head.sha.as_str();

    let settings = match ctx.load_settings(&repo).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(repo = %repo, error = %e, "settings unavailable");
            let run = CheckRun::completed(
                head_sha,
                CheckConclusion::Skipped,
                UNABLE_TO_LOAD_CONFIGURATION,
                UNABLE_TO_LOAD_CONFIGURATION,
            );
            post_check(ctx, &repo, &run).await?;
            return Ok(PullRequestOutcome::ConfigurationUnavailable);
        }
    };

    let changed = ctx
        .host
        .pull_request_files(&repo, number)
        .await
        .map_err(PipelineError::ListFiles)?;
    let candidates: Vec<ChangedFile> = changed
        .into_iter()
        .filter(|f| !f.is_removed() && is_declaration(&f.filename))
        .collect();

    if candidates.is_empty() {
        let run = CheckRun::completed(
            head_sha,
            CheckConclusion::Skipped,
            NO_ORGFILES_TITLE,
            NO_ORGFILES_SUMMARY,
        )
        .with_text(NO_ORGFILES_TEXT);
        post_check(ctx, &repo, &run).await?;
        return Ok(PullRequestOutcome::NoDeclarations);
    }

    tracing::info!(repo = %repo, number, files = candidates.len(), "validating pull request");

    let fetched = join_all(
        candidates
            .iter()
            .map(|file| fetch_declaration(ctx, &repo, head_sha, file)),
    )
    .await;

    let mut declarations = Vec::with_capacity(fetched.len());
    let mut fetch_failures = Vec::new();
    for (file, result) in candidates.iter().zip(fetched) {
        match result {
            Ok(declaration) => declarations.push(declaration),
            Err(reason) => {
                tracing::warn!(path = %file.filename, reason = %reason, "org file unavailable");
                fetch_failures.push(file.filename.clone());
            }
        }
    }

    if !fetch_failures.is_empty() {
        let summary = fetch_failures
            .iter()
            .map(|p| format!("* {}", p))
            .collect::<Vec<_>>()
            .join("\n");
        let run = CheckRun::completed(head_sha, CheckConclusion::Failure, FETCH_FAILED_TITLE, summary);
        post_check(ctx, &repo, &run).await?;
    }

    let mut validator = ConfigurationValidator::new(
        ctx.schema.clone(),
        ctx.directory.clone(),
        Arc::new(StaticPrefixes(settings.required_organization_prefixes)),
    );
    if let Some(check) = &ctx.custom_check {
        validator = validator.with_custom_check(check.clone());
    }

    let batch = validator.validate_configurations(&declarations).await;
    tracing::debug!("done validating");

    let report = to_report(&batch);
    let conclusion = if report.overall_passed {
        CheckConclusion::Success
    } else {
        CheckConclusion::Failure
    };
    let title = match conclusion {
        CheckConclusion::Success => "success",
        _ => "failure",
    };
    let run = CheckRun::completed(head_sha, conclusion, title, RESULTS_SUMMARY)
        .with_text(check_text(&report.text));
    post_check(ctx, &repo, &run).await?;

    tracing::info!(repo = %repo, number, conclusion = title, "pull request validated");
    Ok(PullRequestOutcome::Validated {
        conclusion,
        report,
        fetch_failures,
    })
}

/// Fetch and parse one file; the error is the reason, for logging.
async fn fetch_declaration(
    ctx: &AppContext,
    repo: &RepoId,
    head_sha: &str,
    file: &ChangedFile,
) -> Result<Declaration, String> {
    let contents = ctx
        .host
        .file_content(repo, &file.filename, head_sha)
        .await
        .map_err(|e| e.to_string())?;
    let declaration = Declaration::parse(&file.filename, &contents).map_err(|e| e.to_string())?;
    Ok(match &file.blob_url {
        Some(url) => declaration.with_source_url(url.clone()),
        None => declaration,
    })
}

/// Report text cut to the check-run limit, with a note when shortened.
fn check_text(text: &str) -> String {
    if text.chars().count() <= MAX_CHECK_TEXT {
        return text.to_string();
    }
    let keep = MAX_CHECK_TEXT - TRUNCATED_NOTE.chars().count();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATED_NOTE);
    truncated
}

async fn post_check(ctx: &AppContext, repo: &RepoId, run: &CheckRun) -> Result<(), PipelineError> {
    tracing::debug!(repo = %repo, title = %run.output.title, conclusion = ?run.conclusion, "posting check run");
    ctx.host
        .create_check_run(repo, run)
        .await
        .map_err(PipelineError::Report)
}
