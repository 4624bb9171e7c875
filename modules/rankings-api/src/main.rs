use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rankings_common::{Config, RankingError, SharedSecret};
use rankings_referee::{ApprovalGate, Referee};
use rankings_store::{PgRankStore, RankStore};

mod error;
mod rest;

pub struct AppState {
    pub store: Arc<dyn RankStore>,
    pub secret: SharedSecret,
    pub referee: Referee,
    pub gate: ApprovalGate,
}

impl AppState {
    pub fn new(store: Arc<dyn RankStore>, secret: SharedSecret) -> Self {
        Self {
            referee: Referee::new(store.clone()),
            gate: ApprovalGate::new(store.clone(), secret.clone()),
            store,
            secret,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Read side
        .route("/rankings", get(rest::api_rankings))
        .route("/weeks", get(rest::api_weeks))
        .route("/teams", get(rest::api_teams))
        .route("/sources", get(rest::api_sources))
        // Operator writes
        .route("/login", post(rest::api_login))
        .route("/submit-rankings", post(rest::api_submit_rankings))
        .route("/approve-outlier", post(rest::api_approve_outlier))
        .route("/referee/run", post(rest::api_run_referee))
        .with_state(Arc::new(state))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Method + path + status + latency only; bodies carry the password
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rankings=info".parse()?))
        .init();

    let config = Config::api_from_env()?;
    config.log_redacted();

    let secret = config
        .admin_secret
        .clone()
        .ok_or_else(|| RankingError::Config("ADMIN_PASSWORD is required".into()))?;

    let store = PgRankStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let app = app(AppState::new(Arc::new(store), secret));

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("Rankings API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
