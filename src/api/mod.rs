//! Status API: the optional web surface of a run. `--headless` (or
//! `server.enabled = false`) turns it off entirely.

pub mod health;
pub mod status;

use axum::{routing::get, Router};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, runner::AppState};

pub fn router(state: AppState, cfg: &Config) -> Router {
    Router::new()
        .route("/api/v1/health", get(health::health))
        .route("/api/v1/status", get(status::status))
        .with_state(state)
        .layer(
            ServiceBuilder::new().layer(TimeoutLayer::new(Duration::from_secs(
                cfg.server.request_timeout_secs,
            ))),
        )
        .layer(TraceLayer::new_for_http())
}
