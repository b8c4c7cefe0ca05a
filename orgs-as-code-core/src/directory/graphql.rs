//! Minimal GraphQL transport for the directory service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorEntry {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphqlError {
    /// The server answered with a non-empty `errors` array.
    #[error("GraphQL errors: {}", summarize(.0))]
    Response(Vec<GraphqlErrorEntry>),

    #[error("GraphQL HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GraphQL transport error: {0}")]
    Transport(String),

    #[error("GraphQL response could not be decoded: {0}")]
    Decode(String),
}

impl GraphqlError {
    /// Exactly one error, of type `NOT_FOUND`.
    pub fn is_not_found(&self) -> bool {
        match self {
            GraphqlError::Response(errors) => {
                errors.len() == 1 && errors[0].kind.as_deref() == Some("NOT_FOUND")
            }
            _ => false,
        }
    }
}

fn summarize(errors: &[GraphqlErrorEntry]) -> String {
    serde_json::to_string(errors).unwrap_or_else(|_| format!("{} error(s)", errors.len()))
}

#[async_trait]
pub trait GraphqlClient: Send + Sync {
    /// Execute a query and return its `data` object.
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, GraphqlError>;
}

/// GraphQL over HTTPS with a bearer token.
pub struct HttpGraphqlClient {
    http: Client,
    endpoint: String,
    token: String,
}

impl HttpGraphqlClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self, GraphqlError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("orgs-as-code/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GraphqlError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[async_trait]
impl GraphqlClient for HttpGraphqlClient {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, GraphqlError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| GraphqlError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphqlError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| GraphqlError::Decode(e.to_string()))?;

        if !envelope.errors.is_empty() {
            return Err(GraphqlError::Response(envelope.errors));
        }

        Ok(envelope.data.unwrap_or(Value::Null))
    }
}
