//! Router construction for the webhook server.
//!
//! POST /api/github/webhooks   webhook deliveries
//! GET  /health                liveness

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::events::WebhookEvent;
use crate::pipeline::{handle_pull_request, handle_push, AppContext, PullRequestOutcome, PushOutcome};
use crate::signature::{self, SIGNATURE_HEADER};

const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/github/webhooks", post(webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn webhook(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(secret) = &ctx.config.webhook_secret {
        if !signature::verify(secret, &body, header(SIGNATURE_HEADER)) {
            return Err(AppError::Signature);
        }
    }

    let event_name = header(EVENT_HEADER).ok_or(AppError::MissingEvent)?;
    let delivery = header(DELIVERY_HEADER).unwrap_or("-");
    let event = WebhookEvent::decode(event_name, &body)?;
    tracing::info!(event = event.name(), delivery, "webhook received");

    let outcome = match &event {
        WebhookEvent::Push(push) => push_summary(handle_push(&ctx, push).await?),
        WebhookEvent::PullRequest(pr) => pull_request_summary(handle_pull_request(&ctx, pr).await?),
        WebhookEvent::Ping => "pong".to_string(),
        WebhookEvent::Ignored { .. } => "ignored".to_string(),
    };
    tracing::info!(event = event.name(), delivery, outcome = %outcome, "webhook handled");

    Ok(Json(json!({ "event": event.name(), "outcome": outcome })))
}

fn push_summary(outcome: PushOutcome) -> String {
    match outcome {
        PushOutcome::Ignored => "ignored".to_string(),
        PushOutcome::NothingToDo => "nothing_to_do".to_string(),
        PushOutcome::ConfigurationUnavailable => "configuration_unavailable".to_string(),
        PushOutcome::MissingEnterprise => "missing_enterprise".to_string(),
        PushOutcome::Processed { state, files } => {
            let failed = files.iter().filter(|f| f.result.is_err()).count();
            format!("processed {} file(s), {} failed, status {:?}", files.len(), failed, state)
        }
    }
}

fn pull_request_summary(outcome: PullRequestOutcome) -> String {
    match outcome {
        PullRequestOutcome::Ignored => "ignored".to_string(),
        PullRequestOutcome::ConfigurationUnavailable => "configuration_unavailable".to_string(),
        PullRequestOutcome::NoDeclarations => "no_declarations".to_string(),
        PullRequestOutcome::Validated { conclusion, .. } => format!("validated: {:?}", conclusion),
    }
}
