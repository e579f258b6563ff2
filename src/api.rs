use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use snafu::ResultExt as _;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod error;
mod state;

pub mod prompts;
pub mod stats;
pub mod user;
pub mod views;

pub use error::*;
pub use state::*;

use crate::error::{ApplicationError, BindAddressSnafu, WebServerSnafu};

pub fn create_router(app: App) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats::owner))
        .route("/github/stats", get(stats::github))
        .route("/prompts", post(prompts::create))
        .route("/prompts/:id", get(prompts::show))
        .route("/prompts/:id/view", get(views::show).post(views::increment))
        .route("/prompts/:id/like", post(prompts::like).delete(prompts::unlike))
        .route("/user", post(user::register))
        .route("/user/settings", get(user::settings).put(user::update_settings))
        .route("/user/privacy", get(user::privacy).put(user::update_privacy))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serve the application until ctrl-c is received.
pub async fn serve(address: SocketAddr, app: App) -> Result<(), ApplicationError> {
    let listener = TcpListener::bind(address)
        .await
        .context(BindAddressSnafu { address })?;

    tracing::info!(%address, "listening for requests");

    axum::serve(listener, create_router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(WebServerSnafu)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
