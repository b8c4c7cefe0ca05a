//! Self-hosted directory over the enterprise GraphQL API.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{GraphqlClient, NameAvailability, NewOrganization, OrgDirectory};
use crate::response::{Failure, Response};

const FIND_ORGANIZATION: &str = r#"
query findOrganization($login: String!) {
  organization(login: $login) {
    login,
    id
  }
}
"#;

const CREATE_ORGANIZATION: &str = r#"
mutation organization($adminLogins: [String!]!, $billingEmail: String!, $login: String!, $profileName: String!, $enterpriseId: String!) {
  createEnterpriseOrganization(input: {adminLogins: $adminLogins, billingEmail: $billingEmail, login: $login, profileName: $profileName, enterpriseId: $enterpriseId}) {
    organization {
      id
    }
  }
}
"#;

pub struct EnterpriseServerDirectory {
    graphql: Arc<dyn GraphqlClient>,
}

impl EnterpriseServerDirectory {
    pub fn new(graphql: Arc<dyn GraphqlClient>) -> Self {
        Self { graphql }
    }
}

#[async_trait]
impl OrgDirectory for EnterpriseServerDirectory {
    async fn name_exists(&self, name: &str) -> Response<NameAvailability> {
        tracing::debug!(login = %name, "querying directory for login");

        match self
            .graphql
            .execute(FIND_ORGANIZATION, json!({ "login": name }))
            .await
        {
            Ok(data) => {
                let taken = data
                    .get("organization")
                    .is_some_and(|org| !org.is_null());
                Ok(NameAvailability { taken })
            }
            Err(e) if e.is_not_found() => Ok(NameAvailability { taken: false }),
            Err(e) => {
                tracing::warn!(login = %name, error = %e, "organization lookup failed");
                Err(Failure::new("Unable to query organization login.").with_detail(e))
            }
        }
    }

    async fn create(&self, org: &NewOrganization) -> Response<String> {
        tracing::info!(
            login = %org.login,
            admins = org.admin_logins.len(),
            "creating organization"
        );

        let variables = json!({
            "adminLogins": org.admin_logins,
            "billingEmail": org.billing_email,
            "login": org.login,
            "profileName": org.profile_name,
            "enterpriseId": org.enterprise_id,
        });

        let data = self
            .graphql
            .execute(CREATE_ORGANIZATION, variables)
            .await
            .map_err(|e| Failure::new("Failed to create new Organization").with_detail(e))?;

        data.pointer("/createEnterpriseOrganization/organization/id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                Failure::new("Failed to create new Organization")
                    .with_detail(format!("unexpected mutation response: {}", data))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{GraphqlError, GraphqlErrorEntry};
    use serde_json::Value;
    use std::sync::Mutex;

    /// Replays canned results and records the variables it was called with.
    struct Scripted {
        results: Mutex<Vec<Result<Value, GraphqlError>>>,
        calls: Mutex<Vec<Value>>,
    }

    impl Scripted {
        fn new(results: Vec<Result<Value, GraphqlError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GraphqlClient for Scripted {
        async fn execute(&self, _query: &str, variables: Value) -> Result<Value, GraphqlError> {
            self.calls.lock().unwrap().push(variables);
            self.results.lock().unwrap().remove(0)
        }
    }

    fn not_found() -> GraphqlError {
        GraphqlError::Response(vec![GraphqlErrorEntry {
            kind: Some("NOT_FOUND".into()),
            message: "Could not resolve to an Organization with the login of 'acme'.".into(),
        }])
    }

    #[tokio::test]
    async fn existing_organization_is_taken() {
        let client = Scripted::new(vec![Ok(
            json!({ "organization": { "login": "acme", "id": "O_1" } }),
        )]);
        let directory = EnterpriseServerDirectory::new(client.clone());
        let result = directory.name_exists("acme").await.unwrap();
        assert!(result.taken);
        assert_eq!(client.calls.lock().unwrap()[0], json!({ "login": "acme" }));
    }

    #[tokio::test]
    async fn not_found_is_a_success_path() {
        let directory = EnterpriseServerDirectory::new(Scripted::new(vec![Err(not_found())]));
        let result = directory.name_exists("acme").await;
        assert_eq!(result, Ok(NameAvailability { taken: false }));
    }

    #[tokio::test]
    async fn null_organization_is_free() {
        let directory =
            EnterpriseServerDirectory::new(Scripted::new(vec![Ok(json!({ "organization": null }))]));
        assert!(!directory.name_exists("acme").await.unwrap().taken);
    }

    #[tokio::test]
    async fn other_errors_are_failures_with_detail() {
        let directory = EnterpriseServerDirectory::new(Scripted::new(vec![Err(
            GraphqlError::Status {
                status: 502,
                body: "bad gateway".into(),
            },
        )]));
        let failure = directory.name_exists("acme").await.unwrap_err();
        assert!(failure.detail.unwrap().contains("502"));
    }

    #[tokio::test]
    async fn create_returns_organization_id() {
        let client = Scripted::new(vec![Ok(json!({
            "createEnterpriseOrganization": { "organization": { "id": "O_kgDOB" } }
        }))]);
        let directory = EnterpriseServerDirectory::new(client.clone());
        let id = directory
            .create(&NewOrganization {
                login: "acme-sandbox".into(),
                profile_name: "acme-sandbox".into(),
                billing_email: "x@y.com".into(),
                admin_logins: vec!["alice".into()],
                enterprise_id: "E_1".into(),
            })
            .await
            .unwrap();
        assert_eq!(id, "O_kgDOB");

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls[0]["adminLogins"], json!(["alice"]));
        assert_eq!(calls[0]["enterpriseId"], "E_1");
    }

    #[tokio::test]
    async fn create_with_malformed_response_fails() {
        let directory = EnterpriseServerDirectory::new(Scripted::new(vec![Ok(json!({}))]));
        let failure = directory
            .create(&NewOrganization {
                login: "acme".into(),
                profile_name: "acme".into(),
                billing_email: "x@y.com".into(),
                admin_logins: vec![],
                enterprise_id: "E_1".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(failure.message, "Failed to create new Organization");
    }
}
