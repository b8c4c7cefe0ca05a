//! Event pipelines and the context they share.

pub mod pull_request;
pub mod push;

use std::sync::Arc;

use orgs_as_code_core::settings::{OrgsAsCodeSettings, SettingsError};
use orgs_as_code_core::validator::CustomCheck;
use orgs_as_code_core::{GitDatabase, HostError, OrgDirectory, RepoId, SchemaValidator};
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::events::Repository;
use crate::host::RepositoryHost;

pub use pull_request::{handle_pull_request, PullRequestOutcome};
pub use push::{handle_push, FileOutcome, ProvisionError, PushOutcome};

pub const UNABLE_TO_LOAD_CONFIGURATION: &str = "Unable to load configuration";
pub const NOTHING_TO_DO: &str = "Nothing for this bot to check or do.";

/// Infrastructure failures that could not be reported back to the host.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("listing changed files failed: {0}")]
    ListFiles(#[source] HostError),

    #[error("reporting the result failed: {0}")]
    Report(#[source] HostError),
}

/// Everything a pipeline run needs, constructed once at startup.
pub struct AppContext {
    pub config: AppConfig,
    pub host: Arc<dyn RepositoryHost>,
    pub git: Arc<dyn GitDatabase>,
    pub directory: Arc<dyn OrgDirectory>,
    pub schema: Arc<SchemaValidator>,
    pub custom_check: Option<Arc<dyn CustomCheck>>,
    /// Serializes push processing so ref updates of two deliveries never interleave.
    push_lock: Mutex<()>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        host: Arc<dyn RepositoryHost>,
        git: Arc<dyn GitDatabase>,
        directory: Arc<dyn OrgDirectory>,
        schema: Arc<SchemaValidator>,
    ) -> Self {
        Self {
            config,
            host,
            git,
            directory,
            schema,
            custom_check: None,
            push_lock: Mutex::new(()),
        }
    }

    pub fn with_custom_check(mut self, check: Arc<dyn CustomCheck>) -> Self {
        self.custom_check = Some(check);
        self
    }

    pub fn is_configuration_repo(&self, repository: &Repository) -> bool {
        repository.full_name == self.config.configuration_repo().full_name()
    }

    /// Read `orgs-as-code.yml` from the main branch of `repo`.
    pub async fn load_settings(&self, repo: &RepoId) -> Result<OrgsAsCodeSettings, SettingsError> {
        let path = &self.config.settings_path;
        let text = self
            .host
            .optional_file(repo, path, &self.config.main_branch)
            .await
            .map_err(|e| SettingsError::Fetch(e.to_string()))?
            .ok_or_else(|| SettingsError::Missing { path: path.clone() })?;
        let settings = OrgsAsCodeSettings::from_yaml(&text)?;
        tracing::debug!(repo = %repo, settings = ?settings, "loaded settings");
        Ok(settings)
    }
}
