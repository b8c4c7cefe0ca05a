//! Per-repository `orgs-as-code.yml` settings.

use serde::{Deserialize, Serialize};

/// Conventional location of the settings file in the governance repository.
pub const DEFAULT_SETTINGS_PATH: &str = ".github/orgs-as-code.yml";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings file {path} not found")]
    Missing { path: String },

    #[error("settings file could not be fetched: {0}")]
    Fetch(String),

    #[error("settings file is not valid: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Options recognised in `orgs-as-code.yml`. Absent keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrgsAsCodeSettings {
    /// Appended to every new organization's owner list.
    pub always_added_owners: Vec<String>,
    /// Reserved.
    #[serde(rename = "alwaysInstalledGitHubApps")]
    pub always_installed_github_apps: Vec<String>,
    /// Reserved. Minutes.
    pub organization_sync_check_interval: u64,
    /// Reserved.
    pub excluded_organizations: Vec<String>,
    /// Accepted name prefixes; empty means unrestricted.
    pub required_organization_prefixes: Vec<String>,
}

impl Default for OrgsAsCodeSettings {
    fn default() -> Self {
        Self {
            always_added_owners: Vec::new(),
            always_installed_github_apps: Vec::new(),
            organization_sync_check_interval: 60,
            excluded_organizations: Vec::new(),
            required_organization_prefixes: Vec::new(),
        }
    }
}

impl OrgsAsCodeSettings {
    pub fn from_yaml(text: &str) -> Result<Self, SettingsError> {
        // An empty document is an explicit "all defaults".
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}
