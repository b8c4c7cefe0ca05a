//! Webhook payloads, decoded at the boundary into [`WebhookEvent`].
//!
//! Only the fields the pipelines read are modelled; everything else in the
//! delivery is ignored.

use orgs_as_code_core::RepoId;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("malformed {event} payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Owner {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
}

impl Repository {
    pub fn repo_id(&self) -> RepoId {
        RepoId::new(&self.owner.login, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sender {
    pub login: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl Sender {
    pub fn is_bot(&self) -> bool {
        self.kind == "Bot" || self.login.ends_with("[bot]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Enterprise {
    pub node_id: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Sha of the pushed head commit.
    pub after: String,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub enterprise: Option<Enterprise>,
}

impl PushEvent {
    pub fn is_from_bot(&self) -> bool {
        self.sender.as_ref().is_some_and(Sender::is_bot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Head {
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head: Head,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Repository,
    #[serde(default)]
    pub enterprise: Option<Enterprise>,
}

impl PullRequestEvent {
    /// Only newly opened or updated pull requests are validated.
    pub fn needs_validation(&self) -> bool {
        matches!(self.action.as_str(), "opened" | "synchronize")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Push(PushEvent),
    PullRequest(PullRequestEvent),
    Ping,
    /// Any other event type; acknowledged without work.
    Ignored { event: String },
}

impl WebhookEvent {
    /// Decode a delivery from its `X-GitHub-Event` name and raw body.
    pub fn decode(event_name: &str, body: &[u8]) -> Result<Self, EventDecodeError> {
        match event_name {
            "push" => serde_json::from_slice(body)
                .map(WebhookEvent::Push)
                .map_err(|source| EventDecodeError::Payload {
                    event: "push",
                    source,
                }),
            "pull_request" => serde_json::from_slice(body)
                .map(WebhookEvent::PullRequest)
                .map_err(|source| EventDecodeError::Payload {
                    event: "pull_request",
                    source,
                }),
            "ping" => Ok(WebhookEvent::Ping),
            other => Ok(WebhookEvent::Ignored {
                event: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            WebhookEvent::Push(_) => "push",
            WebhookEvent::PullRequest(_) => "pull_request",
            WebhookEvent::Ping => "ping",
            WebhookEvent::Ignored { event } => event,
        }
    }
}
