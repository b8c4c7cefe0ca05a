//! Organization directory client.
//!
//! The directory service is the system of record for which organizations
//! exist. The pipeline only needs two capabilities from it: checking whether a
//! login is taken and creating a new organization. The concrete variant is
//! chosen once at startup from [`DirectoryKind`].

pub mod enterprise_cloud;
pub mod enterprise_server;
pub mod graphql;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::response::Response;

pub use enterprise_cloud::EnterpriseCloudDirectory;
pub use enterprise_server::EnterpriseServerDirectory;
pub use graphql::{GraphqlClient, GraphqlError, GraphqlErrorEntry, HttpGraphqlClient};

/// Whether a login is already in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAvailability {
    pub taken: bool,
}

/// Input for creating an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrganization {
    pub login: String,
    pub profile_name: String,
    pub billing_email: String,
    pub admin_logins: Vec<String>,
    pub enterprise_id: String,
}

#[async_trait]
pub trait OrgDirectory: Send + Sync {
    /// "Not found" from the backing service is `taken: false`, not a failure.
    async fn name_exists(&self, name: &str) -> Response<NameAvailability>;

    /// Create an organization and return its opaque identifier.
    ///
    /// Not idempotent. Callers must not retry on failure: a request that
    /// failed in transit may still have created the organization.
    async fn create(&self, org: &NewOrganization) -> Response<String>;
}

/// Deployment target of the directory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryKind {
    /// Self-hosted instance, administered over GraphQL.
    EnterpriseServer,
    /// Multi-tenant hosted instance.
    EnterpriseCloud,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("directory kind `{0}` is not supported (expected EnterpriseServer or EnterpriseCloud)")]
pub struct UnknownDirectoryKind(pub String);

impl FromStr for DirectoryKind {
    type Err = UnknownDirectoryKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EnterpriseServer" => Ok(DirectoryKind::EnterpriseServer),
            "EnterpriseCloud" => Ok(DirectoryKind::EnterpriseCloud),
            other => Err(UnknownDirectoryKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for DirectoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryKind::EnterpriseServer => write!(f, "EnterpriseServer"),
            DirectoryKind::EnterpriseCloud => write!(f, "EnterpriseCloud"),
        }
    }
}

/// Build the directory client for `kind`. This is the only place the variant
/// is selected.
pub fn build_directory(kind: DirectoryKind, graphql: Arc<dyn GraphqlClient>) -> Arc<dyn OrgDirectory> {
    match kind {
        DirectoryKind::EnterpriseServer => Arc::new(EnterpriseServerDirectory::new(graphql)),
        DirectoryKind::EnterpriseCloud => Arc::new(EnterpriseCloudDirectory),
    }
}
