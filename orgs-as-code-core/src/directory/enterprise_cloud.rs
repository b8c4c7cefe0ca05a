//! Multi-tenant hosted directory. Fails closed until implemented.

use async_trait::async_trait;

use super::{NameAvailability, NewOrganization, OrgDirectory};
use crate::response::{Failure, Response};

const NOT_SUPPORTED: &str = "OrgAdministrator of type EnterpriseCloud is not yet supported.";

pub struct EnterpriseCloudDirectory;

#[async_trait]
impl OrgDirectory for EnterpriseCloudDirectory {
    async fn name_exists(&self, _name: &str) -> Response<NameAvailability> {
        Err(Failure::new(NOT_SUPPORTED))
    }

    async fn create(&self, _org: &NewOrganization) -> Response<String> {
        Err(Failure::new(NOT_SUPPORTED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_call_fails_closed() {
        let directory = EnterpriseCloudDirectory;
        assert!(directory.name_exists("acme").await.is_err());
        let created = directory
            .create(&NewOrganization {
                login: "acme".into(),
                profile_name: "acme".into(),
                billing_email: "x@y.com".into(),
                admin_logins: vec![],
                enterprise_id: "E_1".into(),
            })
            .await;
        assert_eq!(created.unwrap_err().message, NOT_SUPPORTED);
    }
}
