//! Process configuration from environment variables.
//!
//! | Variable                     | Default                        |
//! |------------------------------|--------------------------------|
//! | `CONFIGURATION_ORGANIZATION` | required                       |
//! | `CONFIGURATION_REPOSITORY`   | `orgs-as-code-operations`      |
//! | `GHE_HOST`                   | required                       |
//! | `REPOSITORY_TOKEN`           | required                       |
//! | `ENTERPRISE_ADMIN_TOKEN`     | required                       |
//! | `DIRECTORY_KIND`             | `EnterpriseServer`             |
//! | `MAIN_BRANCH`                | `main`                         |
//! | `SETTINGS_PATH`              | `.github/orgs-as-code.yml`     |
//! | `WEBHOOK_SECRET`             | unset (signatures not checked) |
//! | `ORGS_AS_CODE_BIND_ADDR`     | `0.0.0.0:3000`                 |

use orgs_as_code_core::directory::{DirectoryKind, UnknownDirectoryKind};
use orgs_as_code_core::settings::DEFAULT_SETTINGS_PATH;
use orgs_as_code_core::RepoId;

pub const DEFAULT_CONFIGURATION_REPOSITORY: &str = "orgs-as-code-operations";
pub const DEFAULT_MAIN_BRANCH: &str = "main";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("DIRECTORY_KIND: {0}")]
    DirectoryKind(#[from] UnknownDirectoryKind),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub configuration_organization: String,
    pub configuration_repository: String,
    pub ghe_host: String,
    pub repository_token: String,
    pub enterprise_admin_token: String,
    pub directory_kind: DirectoryKind,
    pub main_branch: String,
    pub settings_path: String,
    pub webhook_secret: Option<String>,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let directory_kind = match get("DIRECTORY_KIND") {
            Some(kind) => kind.parse()?,
            None => DirectoryKind::EnterpriseServer,
        };

        Ok(Self {
            configuration_organization: required("CONFIGURATION_ORGANIZATION")?,
            configuration_repository: get("CONFIGURATION_REPOSITORY")
                .unwrap_or_else(|| DEFAULT_CONFIGURATION_REPOSITORY.to_string()),
            ghe_host: required("GHE_HOST")?,
            repository_token: required("REPOSITORY_TOKEN")?,
            enterprise_admin_token: required("ENTERPRISE_ADMIN_TOKEN")?,
            directory_kind,
            main_branch: get("MAIN_BRANCH").unwrap_or_else(|| DEFAULT_MAIN_BRANCH.to_string()),
            settings_path: get("SETTINGS_PATH")
                .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string()),
            webhook_secret: get("WEBHOOK_SECRET"),
            bind_addr: get("ORGS_AS_CODE_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }

    /// The governance repository.
    pub fn configuration_repo(&self) -> RepoId {
        RepoId::new(&self.configuration_organization, &self.configuration_repository)
    }

    pub fn rest_base_url(&self) -> String {
        format!("https://{}/api/v3", self.ghe_host)
    }

    pub fn graphql_url(&self) -> String {
        format!("https://{}/api/graphql", self.ghe_host)
    }

    /// Fully qualified ref pushes to the main branch arrive on.
    pub fn main_ref(&self) -> String {
        format!("refs/heads/{}", self.main_branch)
    }

    /// Ref name in the form the git data API expects.
    pub fn main_head(&self) -> String {
        format!("heads/{}", self.main_branch)
    }
}
