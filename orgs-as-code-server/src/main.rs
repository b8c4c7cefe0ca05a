//! orgs-as-code webhook server binary.
//!
//! Configuration comes from the environment (see `config`), optionally seeded
//! from a `.env` file.

use std::sync::Arc;

use anyhow::Context;
use orgs_as_code_core::directory::{build_directory, HttpGraphqlClient};
use orgs_as_code_core::SchemaValidator;
use orgs_as_code_server::config::AppConfig;
use orgs_as_code_server::github::GitHubClient;
use orgs_as_code_server::pipeline::AppContext;
use orgs_as_code_server::router::build_router;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,orgs_as_code_server=debug,orgs_as_code_core=debug".into()
            }),
        )
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::info!(
        repository = %config.configuration_repo(),
        host = %config.ghe_host,
        directory = %config.directory_kind,
        "configuration loaded"
    );

    let github = Arc::new(
        GitHubClient::new(&config.rest_base_url(), config.repository_token.clone())
            .context("building REST client")?,
    );
    let graphql = Arc::new(
        HttpGraphqlClient::new(config.graphql_url(), config.enterprise_admin_token.clone())
            .context("building GraphQL client")?,
    );
    let directory = build_directory(config.directory_kind, graphql);
    let schema = Arc::new(SchemaValidator::new().context("compiling declaration schema")?);

    let bind_addr = config.bind_addr.clone();
    let ctx = Arc::new(AppContext::new(
        config,
        github.clone(),
        github,
        directory,
        schema,
    ));

    let app = build_router(ctx);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", bind_addr))?;
    tracing::info!("orgs-as-code listening on {}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
