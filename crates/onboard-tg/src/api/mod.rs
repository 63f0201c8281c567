//! HTTP API for the Telegram Mini App

mod error;
mod handlers;
mod middleware;

#[cfg(test)]
mod tests;

use crate::auth::{InitDataValidator, TokenIssuer};
use crate::prelude::*;
use crate::referral::ReferralService;
use crate::user::Database;
use crate::Result;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub(crate) const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

#[derive(Deserialize)]
pub(crate) struct Config {
    #[serde(default = "default_listen_addr")]
    pub(crate) listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

pub(crate) struct ApiState {
    pub(crate) db: Arc<dyn Database>,
    pub(crate) tokens: TokenIssuer,
    pub(crate) init_data: InitDataValidator,
    pub(crate) referrals: Arc<ReferralService>,
    pub(crate) bot_username: String,
}

pub(crate) fn router(state: Arc<ApiState>) -> Router {
    let authenticated = Router::new()
        .route("/users/profile", get(handlers::profile))
        .route("/referral", get(handlers::referral))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_user,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth", post(handlers::authenticate))
        .merge(authenticated)
        .route_layer(axum::middleware::from_fn(middleware::track_duration))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) async fn serve(cfg: &Config, state: Arc<ApiState>) -> Result {
    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;

    info!(addr = %cfg.listen_addr, "Starting HTTP API");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP API stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            err = tracing_err(&err),
            "Couldn't listen for Ctrl+C, the HTTP API will run until killed"
        );
        std::future::pending::<()>().await;
    }
}
